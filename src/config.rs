//! Configuration types.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ConfigError, Result, RuleTableError};
use crate::pipeline::processor::MessageProcessor;
use crate::pipeline::rules::RulesEngine;

/// Default labeled dataset location, relative to the working directory.
pub const DEFAULT_DATASET_PATH: &str = "data/manual_label.json";

const RULES_VAR: &str = "EXPENSE_GATE_RULES";
const DATASET_VAR: &str = "EXPENSE_GATE_DATASET";
const WORKERS_VAR: &str = "EXPENSE_GATE_WORKERS";

/// Runtime configuration.
///
/// Worker count is not part of it: only batch runs need one, so it is read
/// on demand with [`workers_from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Rule table JSON. `None` uses the table shipped with the crate.
    pub rules_path: Option<PathBuf>,
    /// Labeled dataset JSON for `evaluate`.
    pub dataset_path: PathBuf,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
        }
    }
}

impl GateConfig {
    /// Build from `EXPENSE_GATE_RULES` and `EXPENSE_GATE_DATASET`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let rules_path = lookup(RULES_VAR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let dataset_path = lookup(DATASET_VAR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH));

        Self {
            rules_path,
            dataset_path,
        }
    }

    /// Load the configured rule table.
    pub fn load_rules(&self) -> std::result::Result<RulesEngine, RuleTableError> {
        match &self.rules_path {
            Some(path) => RulesEngine::from_file(path),
            None => RulesEngine::default_rules(),
        }
    }

    /// Processor over the configured rule table.
    pub fn build_processor(&self) -> Result<MessageProcessor> {
        let rules = self.load_rules()?;
        Ok(MessageProcessor::new(Arc::new(rules)))
    }
}

/// Worker count from `EXPENSE_GATE_WORKERS`, or the available parallelism.
pub fn workers_from_env() -> Result<usize> {
    workers_from_lookup(|key| std::env::var(key).ok())
}

fn workers_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<usize> {
    match lookup(WORKERS_VAR) {
        Some(raw) => Ok(parse_workers(&raw)?),
        None => Ok(default_workers()),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_workers(raw: &str) -> std::result::Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: WORKERS_VAR.into(),
            message: "must be at least 1".into(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidValue {
            key: WORKERS_VAR.into(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::Error;
    use crate::pipeline::types::RawMessage;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = GateConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, GateConfig::default());
        assert_eq!(config.dataset_path, PathBuf::from(DEFAULT_DATASET_PATH));
        assert!(workers_from_lookup(lookup_from(&[])).unwrap() >= 1);
    }

    #[test]
    fn reads_overrides() {
        let lookup = lookup_from(&[
            ("EXPENSE_GATE_RULES", "/etc/gate/rules.json"),
            ("EXPENSE_GATE_DATASET", "labels.json"),
            ("EXPENSE_GATE_WORKERS", " 3 "),
        ]);
        let config = GateConfig::from_lookup(&lookup);
        assert_eq!(config.rules_path, Some(PathBuf::from("/etc/gate/rules.json")));
        assert_eq!(config.dataset_path, PathBuf::from("labels.json"));
        assert_eq!(workers_from_lookup(&lookup).unwrap(), 3);
    }

    #[test]
    fn blank_rules_path_uses_shipped_table() {
        let config = GateConfig::from_lookup(lookup_from(&[("EXPENSE_GATE_RULES", "  ")]));
        assert_eq!(config.rules_path, None);
        assert_eq!(config.load_rules().unwrap().rule_count(), 8);
    }

    #[test]
    fn rejects_bad_worker_counts() {
        for raw in ["0", "many", "-2"] {
            let err = workers_from_lookup(lookup_from(&[("EXPENSE_GATE_WORKERS", raw)])).unwrap_err();
            assert!(
                matches!(&err, Error::Config(ConfigError::InvalidValue { key, .. }) if key == "EXPENSE_GATE_WORKERS"),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn bad_worker_count_does_not_block_config() {
        let config = GateConfig::from_lookup(lookup_from(&[("EXPENSE_GATE_WORKERS", "many")]));
        let processor = config.build_processor().unwrap();
        assert!(processor.process(&RawMessage::new("1", "makan siang 25rb")).is_ok());
    }

    #[test]
    fn missing_rule_file_surfaces_as_rule_table_error() {
        let config = GateConfig {
            rules_path: Some(PathBuf::from("/nonexistent/rules.json")),
            ..GateConfig::default()
        };
        let err = config.build_processor().unwrap_err();
        assert!(matches!(err, Error::RuleTable(RuleTableError::Io { .. })));
    }
}
