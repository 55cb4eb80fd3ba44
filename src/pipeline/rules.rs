//! Rule evaluator: (status, flags) → decision.
//!
//! The rule table is loaded once, validated, and read-only afterwards. Rules
//! are tried in the table's `evaluation_order`; the first match wins.
//!
//! Matching, after the decorative flags (`typo`, `round_trip`) are stripped
//! from the input:
//! - status must be equal
//! - a rule with flags matches when it shares at least one with the input
//! - a rule with no flags matches only an empty input set

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, RuleTableError};
use crate::pipeline::types::{Condition, Decision, FlagSet, Status};

/// Rule table shipped with the crate.
const DEFAULT_RULES_JSON: &str = include_str!("../../data/decision_rules.json");

/// Rule ids by count, most common first. Ties sort by id.
pub fn rank_frequency(frequency: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut ranked: Vec<_> = frequency
        .iter()
        .map(|(id, count)| (id.as_str(), *count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

/// A single decision rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    pub condition: Condition,
    pub action: String,
    pub final_status: String,
    pub bot_response: String,
    /// Free text for table authors. Not used for matching.
    #[serde(default)]
    pub notes: String,
}

impl Rule {
    /// Check the rule against an already-stripped flag set.
    pub fn matches(&self, status: Status, effective_flags: &FlagSet) -> bool {
        if self.condition.status != status {
            return false;
        }
        if self.condition.flags.is_empty() {
            effective_flags.is_empty()
        } else {
            self.condition.flags.intersects(effective_flags)
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.condition.flags.is_empty()
    }

    fn decision(&self) -> Decision {
        Decision {
            rule_id: self.rule_id.clone(),
            action: self.action.clone(),
            final_status: self.final_status.clone(),
            bot_response: self.bot_response.clone(),
        }
    }
}

/// On-disk rule table: rules plus the order they are tried in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<Rule>,
    pub evaluation_order: Vec<String>,
}

/// Outcome of evaluating one condition. Unmatched is an expected result here,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Evaluation {
    Matched { decision: Decision },
    Unmatched { status: Status, flags: FlagSet },
}

impl Evaluation {
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            Self::Matched { decision } => Some(&decision.rule_id),
            Self::Unmatched { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<Decision, PipelineError> {
        match self {
            Self::Matched { decision } => Ok(decision),
            Self::Unmatched { status, flags } => Err(PipelineError::NoRuleMatched { status, flags }),
        }
    }
}

/// A rule table weakness found at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageGap {
    /// No rule at all for this status.
    NoRuleForStatus(Status),
    /// `ok` carries no flags, so it needs an empty-flags rule.
    MissingCatchAll(Status),
    /// `ambiguous` raised only by decorative flags reaches the evaluator with
    /// an empty flag set, and no empty-flags `ambiguous` rule takes it.
    DecorativeOnlyUnresolved,
    /// Every flag the rule requires is stripped before matching.
    UnreachableRule(String),
}

impl fmt::Display for CoverageGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleForStatus(status) => write!(f, "no rule for status '{status}'"),
            Self::MissingCatchAll(status) => {
                write!(f, "no empty-flags catch-all rule for status '{status}'")
            }
            Self::DecorativeOnlyUnresolved => write!(
                f,
                "no empty-flags rule for status 'ambiguous'; typo/round_trip-only messages will not match"
            ),
            Self::UnreachableRule(id) => {
                write!(f, "rule {id} only requires decorative flags and can never match")
            }
        }
    }
}

/// Per-row result of a batch evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowEvaluation {
    pub id: u64,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Summary of evaluating many conditions against one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchEvaluation {
    pub matched: usize,
    pub unmatched: usize,
    pub details: Vec<RowEvaluation>,
    pub frequency: BTreeMap<String, usize>,
}

impl BatchEvaluation {
    /// Rule ids by match count, most common first. Ties sort by id.
    pub fn ranked_frequency(&self) -> Vec<(&str, usize)> {
        rank_frequency(&self.frequency)
    }

    pub fn unmatched_ids(&self) -> Vec<u64> {
        self.details
            .iter()
            .filter(|row| matches!(row.evaluation, Evaluation::Unmatched { .. }))
            .map(|row| row.id)
            .collect()
    }
}

/// Validated rule table, held in evaluation order.
#[derive(Debug, Clone)]
pub struct RulesEngine {
    rules: Vec<Rule>,
}

impl RulesEngine {
    /// Load the rule table shipped with the crate.
    pub fn default_rules() -> Result<Self, RuleTableError> {
        Self::from_json(DEFAULT_RULES_JSON)
    }

    /// Load and validate a rule table from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RuleTableError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RuleTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loading rule table");
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, RuleTableError> {
        let table: RuleTable = serde_json::from_str(json)?;
        Self::from_table(table)
    }

    /// Validate a table and fix its evaluation order.
    ///
    /// `evaluation_order` must be a permutation of the rule ids: no
    /// duplicates, no unknown ids, no rule left out.
    pub fn from_table(table: RuleTable) -> Result<Self, RuleTableError> {
        let mut index: HashMap<&str, &Rule> = HashMap::with_capacity(table.rules.len());
        for rule in &table.rules {
            if index.insert(rule.rule_id.as_str(), rule).is_some() {
                return Err(RuleTableError::DuplicateRule(rule.rule_id.clone()));
            }
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(table.evaluation_order.len());
        let mut rules = Vec::with_capacity(table.evaluation_order.len());
        for id in &table.evaluation_order {
            if !seen.insert(id.as_str()) {
                return Err(RuleTableError::DuplicateInOrder(id.clone()));
            }
            let rule = index
                .get(id.as_str())
                .ok_or_else(|| RuleTableError::UnknownInOrder(id.clone()))?;
            rules.push((*rule).clone());
        }

        if let Some(missing) = table
            .rules
            .iter()
            .find(|rule| !seen.contains(rule.rule_id.as_str()))
        {
            return Err(RuleTableError::MissingFromOrder(missing.rule_id.clone()));
        }

        let engine = Self { rules };
        for gap in engine.coverage_gaps() {
            warn!(gap = %gap, "Rule table coverage gap");
        }
        info!(rules = engine.rules.len(), "Rule table loaded");
        Ok(engine)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// First rule matching the condition, if any.
    pub fn find(&self, status: Status, flags: &FlagSet) -> Option<&Rule> {
        let effective = flags.without_decorative();
        self.rules.iter().find(|rule| rule.matches(status, &effective))
    }

    /// Evaluate a condition without treating "no match" as an error.
    pub fn try_evaluate(&self, status: Status, flags: &FlagSet) -> Evaluation {
        match self.find(status, flags) {
            Some(rule) => {
                debug!(
                    status = %status,
                    flags = %flags,
                    rule = %rule.rule_id,
                    action = %rule.action,
                    "Condition matched rule"
                );
                Evaluation::Matched {
                    decision: rule.decision(),
                }
            }
            None => {
                warn!(status = %status, flags = %flags, "No rule matched condition");
                Evaluation::Unmatched {
                    status,
                    flags: flags.clone(),
                }
            }
        }
    }

    /// Evaluate a condition. An exhausted table is a hard failure.
    pub fn evaluate(&self, status: Status, flags: &FlagSet) -> Result<Decision, PipelineError> {
        self.try_evaluate(status, flags).into_result()
    }

    /// Evaluate many `(id, condition)` rows. Never fails; unmatched rows are
    /// counted and kept in the details.
    pub fn evaluate_batch<'a, I>(&self, rows: I) -> BatchEvaluation
    where
        I: IntoIterator<Item = (u64, &'a Condition)>,
    {
        let mut batch = BatchEvaluation::default();
        for (id, condition) in rows {
            let evaluation = self.try_evaluate(condition.status, &condition.flags);
            match evaluation.rule_id() {
                Some(rule_id) => {
                    batch.matched += 1;
                    *batch.frequency.entry(rule_id.to_string()).or_default() += 1;
                }
                None => batch.unmatched += 1,
            }
            batch.details.push(RowEvaluation { id, evaluation });
        }
        info!(
            matched = batch.matched,
            unmatched = batch.unmatched,
            "Batch evaluation complete"
        );
        batch
    }

    /// Statuses the table cannot resolve and rules that can never fire.
    pub fn coverage_gaps(&self) -> Vec<CoverageGap> {
        let mut gaps = Vec::new();
        for status in Status::ALL {
            let for_status: Vec<&Rule> = self
                .rules
                .iter()
                .filter(|rule| rule.condition.status == status)
                .collect();
            if for_status.is_empty() {
                gaps.push(CoverageGap::NoRuleForStatus(status));
                continue;
            }
            if for_status.iter().any(|rule| rule.is_catch_all()) {
                continue;
            }
            match status {
                Status::Ok => gaps.push(CoverageGap::MissingCatchAll(status)),
                Status::Ambiguous => gaps.push(CoverageGap::DecorativeOnlyUnresolved),
                // Rejected always carries missing_amount.
                Status::Rejected => {}
            }
        }
        for rule in &self.rules {
            if !rule.is_catch_all() && rule.condition.flags.iter().all(|f| f.is_decorative()) {
                gaps.push(CoverageGap::UnreachableRule(rule.rule_id.clone()));
            }
        }
        gaps
    }
}
