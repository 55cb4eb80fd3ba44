//! Console summaries for batch runs and labeled-dataset checks.

use std::fmt;

use serde::Serialize;

use crate::dataset::LabeledRecord;
use crate::pipeline::processor::BatchRun;
use crate::pipeline::rules::{BatchEvaluation, CoverageGap, RulesEngine};
use crate::pipeline::{amount, flagger};

fn write_frequency(f: &mut fmt::Formatter<'_>, ranked: &[(&str, usize)]) -> fmt::Result {
    writeln!(f, "Rule match frequency:")?;
    for (rule_id, count) in ranked {
        writeln!(f, "  {rule_id}: {count}x")?;
    }
    Ok(())
}

// ── Labeled agreement ───────────────────────────────────────────────

/// How often the flagger and normalizer agree with hand labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelAgreement {
    pub total: usize,
    pub status_agree: usize,
    pub flags_agree: usize,
    /// Rows whose label carries an amount.
    pub amount_labeled: usize,
    pub amount_agree: usize,
    /// Rows where status or flags disagree.
    pub condition_mismatches: Vec<u64>,
}

/// Re-run the flagger and normalizer over labeled rows and count agreement.
pub fn compare_labels(records: &[LabeledRecord]) -> LabelAgreement {
    let mut agreement = LabelAgreement {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        let condition = flagger::flag(&record.text);
        let status_ok = condition.status == record.condition.status;
        let flags_ok = condition.flags == record.condition.flags;
        agreement.status_agree += usize::from(status_ok);
        agreement.flags_agree += usize::from(flags_ok);
        if !(status_ok && flags_ok) {
            agreement.condition_mismatches.push(record.id);
        }

        if let Some(expected) = record.parsed.amount {
            agreement.amount_labeled += 1;
            if amount::normalize(&record.text).amount() == Some(expected) {
                agreement.amount_agree += 1;
            }
        }
    }
    agreement
}

impl fmt::Display for LabelAgreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flagger status agreement: {}/{}", self.status_agree, self.total)?;
        writeln!(f, "Flagger flags agreement: {}/{}", self.flags_agree, self.total)?;
        writeln!(
            f,
            "Amount agreement: {}/{}",
            self.amount_agree, self.amount_labeled
        )?;
        if !self.condition_mismatches.is_empty() {
            writeln!(f, "Condition mismatches: {:?}", self.condition_mismatches)?;
        }
        Ok(())
    }
}

// ── Summaries ───────────────────────────────────────────────────────

/// Summary of a labeled-condition batch evaluation.
pub struct EvaluationSummary<'a> {
    pub total: usize,
    pub batch: &'a BatchEvaluation,
}

impl fmt::Display for EvaluationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total records: {}", self.total)?;
        writeln!(
            f,
            "Matched: {}, Unmatched: {}",
            self.batch.matched, self.batch.unmatched
        )?;
        write_frequency(f, &self.batch.ranked_frequency())?;
        let unmatched = self.batch.unmatched_ids();
        if !unmatched.is_empty() {
            writeln!(f, "Records with no matching rule: {unmatched:?}")?;
        }
        Ok(())
    }
}

/// Summary of a pipeline run over raw messages.
pub struct RunSummary<'a>(pub &'a BatchRun);

impl fmt::Display for RunSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let run = self.0;
        writeln!(f, "Total messages: {}", run.total())?;
        writeln!(
            f,
            "Decided: {}, Unmatched: {}",
            run.records.len(),
            run.unmatched.len()
        )?;
        write_frequency(f, &run.ranked_frequency())?;
        for row in &run.unmatched {
            writeln!(f, "  unmatched {}: {:?} ({})", row.id, row.text, row.error)?;
        }
        writeln!(f, "Completed at {}", run.completed_at.to_rfc3339())
    }
}

/// Summary of a rule table check.
pub struct RuleCheck<'a>(pub &'a RulesEngine);

impl fmt::Display for RuleCheck<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.0;
        writeln!(f, "Rules: {}", engine.rule_count())?;
        for rule in engine.rules() {
            writeln!(
                f,
                "  {} [{}] {{{}}} -> {}",
                rule.rule_id, rule.condition.status, rule.condition.flags, rule.action
            )?;
        }
        let gaps: Vec<CoverageGap> = engine.coverage_gaps();
        if gaps.is_empty() {
            writeln!(f, "No coverage gaps")
        } else {
            for gap in gaps {
                writeln!(f, "Gap: {gap}")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ParsedLabel;
    use crate::pipeline::types::{Condition, Flag, FlagSet, Status};

    fn labeled(id: u64, text: &str, condition: Condition, amount: Option<u64>) -> LabeledRecord {
        LabeledRecord {
            id,
            text: text.into(),
            parsed: ParsedLabel {
                amount,
                ..Default::default()
            },
            condition,
        }
    }

    #[test]
    fn agreement_counts() {
        let records = vec![
            labeled(1, "makan siang 25rb", Condition::new(Status::Ok, FlagSet::new()), Some(25_000)),
            labeled(
                2,
                "sekitar 50000 atau 70000",
                Condition::new(Status::Ambiguous, FlagSet::from([Flag::Estimation])),
                Some(60_000),
            ),
            labeled(
                3,
                "makan siang doang",
                Condition::new(Status::Rejected, FlagSet::from([Flag::MissingAmount])),
                None,
            ),
        ];
        let agreement = compare_labels(&records);
        assert_eq!(agreement.total, 3);
        assert_eq!(agreement.status_agree, 3);
        assert_eq!(agreement.flags_agree, 2);
        assert_eq!(agreement.amount_labeled, 2);
        assert_eq!(agreement.amount_agree, 1);
        assert_eq!(agreement.condition_mismatches, vec![2]);
    }

    #[test]
    fn evaluation_summary_lists_unmatched() {
        let engine = RulesEngine::default_rules().unwrap();
        let rows = [
            Condition::new(Status::Ok, FlagSet::new()),
            Condition::new(Status::Ambiguous, FlagSet::from([Flag::RoundTrip])),
        ];
        let batch = engine.evaluate_batch([(10, &rows[0]), (11, &rows[1])]);
        let text = EvaluationSummary { total: 2, batch: &batch }.to_string();
        assert!(text.contains("Total records: 2"));
        assert!(text.contains("Matched: 1, Unmatched: 1"));
        assert!(text.contains("  R08: 1x"));
        assert!(text.contains("Records with no matching rule: [11]"));
    }

    #[test]
    fn rule_check_reports_shipped_table_gap() {
        let engine = RulesEngine::default_rules().unwrap();
        let text = RuleCheck(&engine).to_string();
        assert!(text.starts_with("Rules: 8"));
        assert!(text.contains("R01 [rejected] {missing_amount} -> reject"));
        assert!(text.contains("Gap: no empty-flags rule for status 'ambiguous'"));
        assert!(!text.contains("No coverage gaps"));
    }
}
