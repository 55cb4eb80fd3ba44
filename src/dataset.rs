//! Dataset I/O: labeled conditions, raw message CSVs, and result CSVs.
//!
//! Labeled rows are validated as they load. A single bad row fails the whole
//! load; there is no partially valid dataset.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DatasetError;
use crate::pipeline::types::{Condition, DecisionRecord, RawMessage, Status};

/// Hand-parsed fields of a labeled message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLabel {
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// One row of the labeled regression dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub parsed: ParsedLabel,
    pub condition: Condition,
}

/// `ok` must carry no flags; every other status must carry at least one.
pub fn validate_condition(id: u64, condition: &Condition) -> Result<(), DatasetError> {
    let reason = match (condition.status, condition.flags.is_empty()) {
        (Status::Ok, false) => "status 'ok' must have an empty flag list",
        (Status::Ambiguous | Status::Rejected, true) => "non-ok status must have at least one flag",
        _ => return Ok(()),
    };
    Err(DatasetError::InvalidCondition {
        id,
        status: condition.status,
        flags: condition.flags.clone(),
        reason,
    })
}

/// Parse and validate a labeled dataset from JSON.
pub fn parse_labeled(json: &str) -> Result<Vec<LabeledRecord>, DatasetError> {
    let records: Vec<LabeledRecord> = serde_json::from_str(json)?;
    for record in &records {
        validate_condition(record.id, &record.condition)?;
    }
    Ok(records)
}

/// Load and validate a labeled dataset file.
pub fn load_labeled<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledRecord>, DatasetError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_labeled(&content)?;
    info!(path = %path.display(), records = records.len(), "Labeled dataset loaded");
    Ok(records)
}

/// Read `id,text` rows from a CSV file.
pub fn read_messages<P: AsRef<Path>>(path: P) -> Result<Vec<RawMessage>, DatasetError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let messages = reader
        .deserialize()
        .collect::<Result<Vec<RawMessage>, csv::Error>>()?;
    info!(path = %path.display(), messages = messages.len(), "Messages loaded");
    Ok(messages)
}

/// Flat CSV shape of a decision record.
#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    id: &'a str,
    text: &'a str,
    status: &'static str,
    flags: String,
    rule: &'a str,
    amount: Option<u64>,
    currency: &'static str,
    normalized: Option<u64>,
}

impl<'a> From<&'a DecisionRecord> for ResultRow<'a> {
    fn from(record: &'a DecisionRecord) -> Self {
        Self {
            id: &record.id,
            text: &record.text,
            status: record.status.as_str(),
            flags: record.flags.joined(),
            rule: &record.decision.rule_id,
            amount: record.amount.amount(),
            currency: record.amount.currency(),
            normalized: record.amount.normalized(),
        }
    }
}

/// Write decision records as CSV to any writer. The header is always written.
pub fn write_results_to<W: Write>(writer: W, records: &[DecisionRecord]) -> Result<(), DatasetError> {
    let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    out.write_record([
        "id", "text", "status", "flags", "rule", "amount", "currency", "normalized",
    ])?;
    for record in records {
        out.serialize(ResultRow::from(record))?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write decision records to a CSV file.
pub fn write_results<P: AsRef<Path>>(path: P, records: &[DecisionRecord]) -> Result<(), DatasetError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_results_to(file, records)?;
    info!(path = %path.display(), rows = records.len(), "Results written");
    Ok(())
}
