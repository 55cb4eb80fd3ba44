//! Message processor: runs the flagger and normalizer on each message and
//! feeds the flagger's condition to the rules engine.
//!
//! Flow per message:
//! 1. Edge flagger → (status, flags)
//! 2. Amount normalizer → amount, independent of step 1
//! 3. Rules engine on the condition from step 1
//! 4. Merge into a [`DecisionRecord`]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::pipeline::rules::{Evaluation, RulesEngine, rank_frequency};
use crate::pipeline::types::{AmountResult, DecisionRecord, FlagSet, RawMessage, Status};
use crate::pipeline::{amount, flagger};

/// A message whose condition no rule resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedRecord {
    pub id: String,
    pub text: String,
    pub status: Status,
    #[serde(serialize_with = "FlagSet::serialize_joined")]
    pub flags: FlagSet,
    #[serde(flatten)]
    pub amount: AmountResult,
    pub error: String,
}

/// Per-message outcome. Neither variant is an error at batch level.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Decided(DecisionRecord),
    Unmatched(UnmatchedRecord),
}

/// Result of running the pipeline over many messages, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRun {
    pub records: Vec<DecisionRecord>,
    pub unmatched: Vec<UnmatchedRecord>,
    pub frequency: BTreeMap<String, usize>,
    pub completed_at: DateTime<Utc>,
}

impl BatchRun {
    fn from_outcomes(outcomes: impl IntoIterator<Item = RowOutcome>) -> Self {
        let mut records = Vec::new();
        let mut unmatched = Vec::new();
        let mut frequency = BTreeMap::new();
        for outcome in outcomes {
            match outcome {
                RowOutcome::Decided(record) => {
                    *frequency.entry(record.decision.rule_id.clone()).or_default() += 1;
                    records.push(record);
                }
                RowOutcome::Unmatched(row) => unmatched.push(row),
            }
        }
        Self {
            records,
            unmatched,
            frequency,
            completed_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.records.len() + self.unmatched.len()
    }

    /// Rule ids by match count, most common first.
    pub fn ranked_frequency(&self) -> Vec<(&str, usize)> {
        rank_frequency(&self.frequency)
    }
}

/// Pipeline driver over a shared, read-only rule table.
#[derive(Debug, Clone)]
pub struct MessageProcessor {
    rules: Arc<RulesEngine>,
}

impl MessageProcessor {
    pub fn new(rules: Arc<RulesEngine>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    /// Run one message through the pipeline. Never fails.
    pub fn classify(&self, message: &RawMessage) -> RowOutcome {
        let condition = flagger::flag(&message.text);
        let amount = amount::normalize(&message.text);

        debug!(
            id = %message.id,
            status = %condition.status,
            flags = %condition.flags,
            amount = ?amount.amount(),
            source = amount.source_label(),
            "Message classified"
        );

        match self.rules.try_evaluate(condition.status, &condition.flags) {
            Evaluation::Matched { decision } => RowOutcome::Decided(DecisionRecord {
                id: message.id.clone(),
                text: message.text.clone(),
                status: condition.status,
                flags: condition.flags,
                decision,
                amount,
            }),
            Evaluation::Unmatched { status, flags } => {
                let error = PipelineError::NoRuleMatched {
                    status,
                    flags: flags.clone(),
                }
                .to_string();
                RowOutcome::Unmatched(UnmatchedRecord {
                    id: message.id.clone(),
                    text: message.text.clone(),
                    status,
                    flags,
                    amount,
                    error,
                })
            }
        }
    }

    /// Process a single message. A condition with no rule is a hard failure:
    /// it means the deployed rule table is incomplete.
    pub fn process(&self, message: &RawMessage) -> Result<DecisionRecord, PipelineError> {
        match self.classify(message) {
            RowOutcome::Decided(record) => Ok(record),
            RowOutcome::Unmatched(row) => {
                error!(id = %row.id, status = %row.status, flags = %row.flags, "No rule for message");
                Err(PipelineError::NoRuleMatched {
                    status: row.status,
                    flags: row.flags,
                })
            }
        }
    }

    /// Process messages one after another on the calling thread.
    pub fn process_batch(&self, messages: &[RawMessage]) -> BatchRun {
        info!(count = messages.len(), "Processing message batch");
        let run = BatchRun::from_outcomes(messages.iter().map(|m| self.classify(m)));
        log_run(&run);
        run
    }

    /// Fan messages out over `workers` blocking tasks.
    ///
    /// Output order matches input order regardless of completion order.
    pub async fn process_concurrent(
        &self,
        messages: Vec<RawMessage>,
        workers: usize,
    ) -> Result<BatchRun, PipelineError> {
        let count = messages.len();
        let workers = workers.max(1);
        let chunk_size = count.div_ceil(workers).max(1);
        info!(count, workers, chunk_size, "Processing message batch concurrently");

        let mut indexed: Vec<(usize, RawMessage)> = messages.into_iter().enumerate().collect();
        let mut tasks = JoinSet::new();
        while !indexed.is_empty() {
            let rest = indexed.split_off(chunk_size.min(indexed.len()));
            let chunk = std::mem::replace(&mut indexed, rest);
            let processor = self.clone();
            tasks.spawn_blocking(move || {
                chunk
                    .into_iter()
                    .map(|(index, message)| (index, processor.classify(&message)))
                    .collect::<Vec<_>>()
            });
        }

        let mut outcomes = Vec::with_capacity(count);
        while let Some(joined) = tasks.join_next().await {
            let chunk = joined.map_err(|e| PipelineError::Worker(e.to_string()))?;
            outcomes.extend(chunk);
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let run = BatchRun::from_outcomes(outcomes.into_iter().map(|(_, outcome)| outcome));
        log_run(&run);
        Ok(run)
    }
}

fn log_run(run: &BatchRun) {
    info!(
        decided = run.records.len(),
        unmatched = run.unmatched.len(),
        total = run.total(),
        "Batch processing complete"
    );
}
