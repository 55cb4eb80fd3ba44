//! Error types for the expense gate.

use std::path::PathBuf;

use crate::pipeline::types::{FlagSet, Status};

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule table error: {0}")]
    RuleTable(#[from] RuleTableError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Rule table loading and validation errors.
///
/// A table that fails any of these checks is never handed to the evaluator.
#[derive(Debug, thiserror::Error)]
pub enum RuleTableError {
    #[error("Failed to read rule table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rule table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("Rule id {0} appears more than once in evaluation_order")]
    DuplicateInOrder(String),

    #[error("evaluation_order references unknown rule id: {0}")]
    UnknownInOrder(String),

    #[error("Rule {0} is missing from evaluation_order")]
    MissingFromOrder(String),
}

/// Labeled dataset and raw input errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid condition on row {id}: status '{status}' with flags [{flags}]: {reason}")]
    InvalidCondition {
        id: u64,
        status: Status,
        flags: FlagSet,
        reason: &'static str,
    },
}

/// Pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("No rule matched for status='{status}', flags=[{flags}]")]
    NoRuleMatched { status: Status, flags: FlagSet },

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
