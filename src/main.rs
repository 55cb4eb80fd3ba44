use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use expense_gate::config::{GateConfig, workers_from_env};
use expense_gate::dataset;
use expense_gate::pipeline::types::RawMessage;
use expense_gate::report::{self, EvaluationSummary, RuleCheck, RunSummary};

/// Decide whether informal expense messages can be recorded.
#[derive(Parser)]
#[command(name = "expense-gate", version, about = "Expense message decision pipeline")]
struct Cli {
    /// Rule table JSON (overrides EXPENSE_GATE_RULES; default: shipped table)
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more messages and print a JSON decision per line
    Classify {
        /// Message text
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Run the pipeline over an `id,text` CSV and write a result CSV
    Run {
        /// Input CSV with `id` and `text` columns
        #[arg(long)]
        input: PathBuf,
        /// Result CSV path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Worker tasks (overrides EXPENSE_GATE_WORKERS)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Evaluate labeled conditions against the rule table
    Evaluate {
        /// Labeled dataset JSON (overrides EXPENSE_GATE_DATASET)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },

    /// Validate the rule table and report coverage gaps
    CheckRules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = GateConfig::from_env();
    if let Some(rules) = cli.rules {
        config.rules_path = Some(rules);
    }

    let processor = config
        .build_processor()
        .context("Failed to load rule table")?;

    match cli.command {
        Commands::Classify { texts } => {
            for (i, text) in texts.into_iter().enumerate() {
                let message = RawMessage::new((i + 1).to_string(), text);
                let record = processor.process(&message)?;
                println!("{}", serde_json::to_string(&record)?);
            }
        }

        Commands::Run {
            input,
            output,
            workers,
        } => {
            let messages = dataset::read_messages(&input)
                .with_context(|| format!("Failed to read messages from {}", input.display()))?;
            let workers = match workers {
                Some(n) => n,
                None => workers_from_env()?,
            };
            let run = processor.process_concurrent(messages, workers).await?;
            if let Some(output) = output {
                dataset::write_results(&output, &run.records)
                    .with_context(|| format!("Failed to write results to {}", output.display()))?;
                eprintln!("Saved results to {}", output.display());
            }
            print!("{}", RunSummary(&run));
        }

        Commands::Evaluate { dataset: path } => {
            let path = path.unwrap_or(config.dataset_path);
            let records = dataset::load_labeled(&path)
                .with_context(|| format!("Failed to load dataset {}", path.display()))?;
            let batch = processor
                .rules()
                .evaluate_batch(records.iter().map(|r| (r.id, &r.condition)));
            print!(
                "{}",
                EvaluationSummary {
                    total: records.len(),
                    batch: &batch,
                }
            );
            print!("{}", report::compare_labels(&records));
        }

        Commands::CheckRules => {
            print!("{}", RuleCheck(processor.rules()));
        }
    }

    Ok(())
}
