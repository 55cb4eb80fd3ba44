//! Edge flagger: free text → (status, flags).
//!
//! The hard gate rejects text with no amount-shaped token at all. Text that
//! passes is checked for contextual cues and noise; any raised flag makes the
//! status `ambiguous`, decorative ones included.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::{Condition, Flag, FlagSet, Status};

/// Amount-shaped tokens: shorthand of any size, grouped thousands, or four
/// or more bare digits.
static AMOUNT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        [0-9]+(?:[.,][0-9]+)*\s*(?:k|rb|ribu|jt|juta)\b   # 25rb | 1.5 jt
        | [0-9]{1,3}(?:[.,][0-9]{3})+                     # 7.500 | 1,000,000
        | [0-9]{4,}                                       # 7500
        ",
    )
    .unwrap()
});

static ANY_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").unwrap());

const MULTIPLE_CATEGORY_CUES: &[&str] = &["atau", ","];
const ESTIMATION_CUES: &[&str] = &["sekitar", "kira", "±", "kurang lebih"];
const OPERATOR_CUES: &[&str] = &["-", "x", "/"];
const FOREIGN_CURRENCY_CUES: &[&str] = &["usd", "$", "yen", "jpy", "eur"];
const CALCULATION_CUES: &[&str] = &["=", "jadi", "total"];
const TYPO_CUES: &[&str] = &["??", "wkwk", "hehe"];
const ROUND_TRIP_CUE: &str = "pp";

/// True when `text` holds anything that looks like an amount.
pub fn has_amount(text: &str) -> bool {
    AMOUNT_SHAPE.is_match(&text.to_lowercase())
}

fn has_any(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| text.contains(cue))
}

/// Classify `text`. Never fails.
pub fn flag(text: &str) -> Condition {
    let t = text.to_lowercase();

    if !AMOUNT_SHAPE.is_match(&t) {
        return Condition::new(Status::Rejected, FlagSet::from([Flag::MissingAmount]));
    }

    let checks = [
        (Flag::MultipleCategories, has_any(&t, MULTIPLE_CATEGORY_CUES)),
        (Flag::Estimation, has_any(&t, ESTIMATION_CUES)),
        // Plus is the calculation signal, not an ambiguity.
        (Flag::NonPlusOperator, has_any(&t, OPERATOR_CUES)),
        (Flag::ForeignCurrency, has_any(&t, FOREIGN_CURRENCY_CUES)),
        (Flag::Calculation, has_any(&t, CALCULATION_CUES)),
        (Flag::Typo, has_any(&t, TYPO_CUES)),
        (Flag::RoundTrip, t.contains(ROUND_TRIP_CUE)),
        (Flag::UnitPrice, t.contains('@') && ANY_DIGIT.is_match(&t)),
    ];

    let flags: FlagSet = checks
        .into_iter()
        .filter_map(|(flag, raised)| raised.then_some(flag))
        .collect();

    let status = if flags.is_empty() {
        Status::Ok
    } else {
        Status::Ambiguous
    };
    Condition::new(status, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_of(text: &str) -> FlagSet {
        flag(text).flags
    }

    #[test]
    fn clean_shorthand_is_ok() {
        let condition = flag("makan siang 25rb");
        assert_eq!(condition.status, Status::Ok);
        assert!(condition.flags.is_empty());
    }

    #[test]
    fn no_digits_is_rejected() {
        let condition = flag("makan siang doang");
        assert_eq!(condition.status, Status::Rejected);
        assert_eq!(condition.flags, FlagSet::from([Flag::MissingAmount]));
    }

    #[test]
    fn rejection_short_circuits_other_flags() {
        // Would raise estimation, typo and multiple_categories if it passed the gate.
        let condition = flag("sekitar 50 atau 60 wkwk");
        assert_eq!(condition.status, Status::Rejected);
        assert_eq!(condition.flags, FlagSet::from([Flag::MissingAmount]));
    }

    #[test]
    fn amount_shapes() {
        assert!(has_amount("7500"));
        assert!(has_amount("7.500"));
        assert!(has_amount("1,000,000"));
        assert!(has_amount("5rb"));
        assert!(has_amount("1.5 JT"));
        assert!(has_amount("parkir 2 k"));
        assert!(!has_amount("beli 3 roti"));
        assert!(!has_amount("500"));
        assert!(!has_amount("1.5"));
        assert!(!has_amount("5kg beras"));
        assert!(!has_amount(""));
    }

    #[test]
    fn estimation_and_alternatives() {
        let condition = flag("sekitar 50000 atau 70000");
        assert_eq!(condition.status, Status::Ambiguous);
        assert_eq!(
            condition.flags,
            FlagSet::from([Flag::Estimation, Flag::MultipleCategories])
        );
    }

    #[test]
    fn comma_counts_as_multiple_categories() {
        assert!(flags_of("bakso 15000, es teh 5000").contains(Flag::MultipleCategories));
    }

    #[test]
    fn plus_is_not_an_operator_flag() {
        let flags = flags_of("beli kopi 15000 + 10000 = 25000 total");
        assert_eq!(flags, FlagSet::from([Flag::Calculation]));
    }

    #[test]
    fn non_plus_operators() {
        assert!(flags_of("30000 - 5000 diskon").contains(Flag::NonPlusOperator));
        assert!(flags_of("3 x 12000").contains(Flag::NonPlusOperator));
        assert!(flags_of("60000/2").contains(Flag::NonPlusOperator));
        // Any letter x is read as a multiply sign.
        assert!(flags_of("taxi 45000").contains(Flag::NonPlusOperator));
    }

    #[test]
    fn foreign_currency() {
        assert!(flags_of("hotel 120 USD 1800000").contains(Flag::ForeignCurrency));
        assert!(flags_of("$25 dinner 400000").contains(Flag::ForeignCurrency));
        assert!(flags_of("ramen 1500 yen").contains(Flag::ForeignCurrency));
    }

    #[test]
    fn decorative_flags_make_status_ambiguous() {
        let condition = flag("makan 25rb wkwk");
        assert_eq!(condition.status, Status::Ambiguous);
        assert_eq!(condition.flags, FlagSet::from([Flag::Typo]));

        let condition = flag("ojek pp 40rb");
        assert_eq!(condition.status, Status::Ambiguous);
        assert_eq!(condition.flags, FlagSet::from([Flag::RoundTrip]));
    }

    #[test]
    fn doubled_question_mark_is_typo() {
        assert!(flags_of("makan 25rb??").contains(Flag::Typo));
        assert!(!flags_of("makan 25rb?").contains(Flag::Typo));
    }

    #[test]
    fn unit_price_needs_at_sign_and_digit() {
        assert!(flags_of("3 gorengan @2000").contains(Flag::UnitPrice));
        assert!(!flags_of("makan 25rb").contains(Flag::UnitPrice));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(flag("MAKAN 25RB"), flag("makan 25rb"));
        assert!(flags_of("SEKITAR 50000").contains(Flag::Estimation));
    }
}
