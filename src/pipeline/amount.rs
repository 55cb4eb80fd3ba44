//! Amount normalizer: free text → best-guess IDR amount.
//!
//! A five-stage cascade, first match wins:
//! 1. explicit currency marker (`rp`, `idr`, `@`) followed by a number
//! 2. shorthand multiplier (`25rb`, `1,5jt`)
//! 3. calculation cue with two or more qualifying numbers → sum
//! 4. estimation cue with a qualifying number → max
//! 5. any qualifying number → max
//!
//! Stages 1 and 3-5 read numbers with [`clean_digits`] (every separator is
//! noise). Stage 2 reads its literal with [`parse_scaled_literal`] (a single
//! separator is a decimal point). The two conventions give different values
//! for the same token and must stay separate.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::{AmountResult, AmountSource};

/// Numbers below this are taken to be quantities, ages or times.
pub const MIN_LIKELY_MONEY: u64 = 1_000;

static NUMBER_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9][0-9.,]*").unwrap());

static EXPLICIT_CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(rp\.?|idr|@)\s*([0-9][0-9.,]*)").unwrap());

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+(?:[.,][0-9]+)?|[0-9]{1,3}(?:[.,][0-9]{3})+)\s*(k|rb|ribu|jt|juta)").unwrap()
});

const CALCULATION_CUES: &[&str] = &["+", "=", "total", "jadi"];

const ESTIMATION_CUES: &[&str] = &[
    "sekitar",
    "kira",
    "kira-kira",
    "±",
    "kurang lebih",
    "mungkin",
    "mgkn",
    "kira2",
    "kayaknya",
    "keknya",
];

/// Scale implied by an informal unit suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Thousand,
    Million,
}

impl Scale {
    fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "k" | "rb" | "ribu" => Some(Self::Thousand),
            "jt" | "juta" => Some(Self::Million),
            _ => None,
        }
    }

    fn multiplier(&self) -> f64 {
        match self {
            Self::Thousand => 1_000.0,
            Self::Million => 1_000_000.0,
        }
    }
}

/// Strip every non-digit and read what is left as an integer.
///
/// `"7.500"` and `"7,5"` both become `7500`. Returns `None` when no digits
/// remain or the value does not fit in a `u64`.
pub fn clean_digits(token: &str) -> Option<u64> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Read a shorthand literal with decimal semantics and apply its scale.
///
/// A single `.` or `,` is a decimal point (`"1,5"` × 1 000 000 = 1 500 000).
/// A literal with several separators is thousands-grouped and read with
/// [`clean_digits`] before scaling. The product is truncated.
fn parse_scaled_literal(literal: &str, scale: Scale) -> Option<u64> {
    let separators = literal.chars().filter(|c| matches!(c, '.' | ',')).count();
    let value: f64 = if separators <= 1 {
        literal.replace(',', ".").parse().ok()?
    } else {
        clean_digits(literal)? as f64
    };

    let scaled = value * scale.multiplier();
    if !scaled.is_finite() || scaled >= u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

/// Every number-shaped token in `text`, cleaned, keeping values ≥ 1000.
pub fn qualifying_numbers(text: &str) -> Vec<u64> {
    NUMBER_TOKEN
        .find_iter(text)
        .filter_map(|m| clean_digits(m.as_str()))
        .filter(|n| *n >= MIN_LIKELY_MONEY)
        .collect()
}

fn explicit_currency(text: &str) -> Option<u64> {
    let caps = EXPLICIT_CURRENCY.captures(text)?;
    clean_digits(&caps[2])
}

fn shorthand(text: &str) -> Option<u64> {
    let caps = SHORTHAND.captures(text)?;
    let scale = Scale::from_unit(&caps[2])?;
    parse_scaled_literal(&caps[1], scale)
}

fn has_any(text: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| text.contains(cue))
}

/// Extract the most plausible amount from `text`. Never fails.
pub fn normalize(text: &str) -> AmountResult {
    let t = text.to_lowercase();
    let nums = qualifying_numbers(&t);

    let found = |amount, source| AmountResult::Found { amount, source };

    if let Some(amount) = explicit_currency(&t) {
        return found(amount, AmountSource::ExplicitCurrency);
    }

    if let Some(amount) = shorthand(&t) {
        return found(amount, AmountSource::Shorthand);
    }

    if has_any(&t, CALCULATION_CUES) && nums.len() >= 2 {
        let total = nums.iter().fold(0u64, |acc, n| acc.saturating_add(*n));
        return found(total, AmountSource::Calculation);
    }

    let max = nums.iter().copied().max();

    if let Some(amount) = max.filter(|_| has_any(&t, ESTIMATION_CUES)) {
        return found(amount, AmountSource::Estimation);
    }

    match max {
        Some(amount) => found(amount, AmountSource::Fallback),
        None => AmountResult::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Confidence;

    fn amount_and_source(text: &str) -> (Option<u64>, &'static str) {
        let result = normalize(text);
        (result.amount(), result.source_label())
    }

    #[test]
    fn clean_digits_strips_all_separators() {
        assert_eq!(clean_digits("7.500"), Some(7500));
        assert_eq!(clean_digits("7,5"), Some(75));
        assert_eq!(clean_digits("1.000.000,"), Some(1_000_000));
        assert_eq!(clean_digits(".,"), None);
        assert_eq!(clean_digits("99999999999999999999999"), None);
    }

    #[test]
    fn overflowing_explicit_amount_falls_through() {
        let result = normalize("rp 99999999999999999999 dan 5000");
        assert_eq!(result.amount(), Some(5_000));
        assert_eq!(result.source(), Some(AmountSource::Fallback));
    }

    #[test]
    fn calculation_sum_saturates() {
        let result = normalize("total 18000000000000000000 + 18000000000000000000");
        assert_eq!(result.amount(), Some(u64::MAX));
        assert_eq!(result.source(), Some(AmountSource::Calculation));
    }

    #[test]
    fn scaled_literal_uses_decimal_point() {
        assert_eq!(parse_scaled_literal("1,5", Scale::Million), Some(1_500_000));
        assert_eq!(parse_scaled_literal("7.5", Scale::Thousand), Some(7_500));
        assert_eq!(parse_scaled_literal("25", Scale::Thousand), Some(25_000));
        assert_eq!(parse_scaled_literal("1.500", Scale::Thousand), Some(1_500));
        assert_eq!(parse_scaled_literal("1.500.000", Scale::Thousand), Some(1_500_000_000));
    }

    #[test]
    fn qualifying_numbers_drop_small_values() {
        assert_eq!(qualifying_numbers("2 porsi 15.000 jam 12"), vec![15_000]);
        assert!(qualifying_numbers("umur 25 tahun").is_empty());
    }

    #[test]
    fn shorthand_thousands() {
        let result = normalize("makan siang 25rb");
        assert_eq!(result.amount(), Some(25_000));
        assert_eq!(result.source(), Some(AmountSource::Shorthand));
        assert_eq!(result.confidence(), Confidence::High);
    }

    #[test]
    fn shorthand_units() {
        assert_eq!(amount_and_source("gaji 2jt"), (Some(2_000_000), "shorthand"));
        assert_eq!(amount_and_source("bensin 50 ribu"), (Some(50_000), "shorthand"));
        assert_eq!(amount_and_source("laptop 7,5 juta"), (Some(7_500_000), "shorthand"));
        assert_eq!(amount_and_source("kopi 18K"), (Some(18_000), "shorthand"));
    }

    #[test]
    fn shorthand_has_no_word_boundary() {
        // "2 k" from "2 kopi" is read as two thousand.
        assert_eq!(amount_and_source("2 kopi 15000"), (Some(2_000), "shorthand"));
    }

    #[test]
    fn explicit_currency_strips_separators() {
        assert_eq!(amount_and_source("bayar Rp 7.500"), (Some(7_500), "explicit_currency"));
        assert_eq!(amount_and_source("bayar rp.7,5"), (Some(75), "explicit_currency"));
        assert_eq!(amount_and_source("IDR 120000 hotel"), (Some(120_000), "explicit_currency"));
        assert_eq!(
            normalize("idr 1000").confidence(),
            Confidence::High,
        );
    }

    #[test]
    fn explicit_currency_beats_shorthand() {
        assert_eq!(amount_and_source("Rp 25rb"), (Some(25), "explicit_currency"));
    }

    #[test]
    fn unit_price_marker_counts_as_explicit() {
        assert_eq!(amount_and_source("3 gorengan @2000"), (Some(2_000), "explicit_currency"));
    }

    #[test]
    fn calculation_sums_every_qualifying_number() {
        let result = normalize("beli kopi 15000 + 10000 = 25000 total");
        assert_eq!(result.amount(), Some(50_000));
        assert_eq!(result.source(), Some(AmountSource::Calculation));
        assert_eq!(result.confidence(), Confidence::Medium);
    }

    #[test]
    fn calculation_needs_two_numbers() {
        assert_eq!(amount_and_source("total 45000"), (Some(45_000), "fallback"));
    }

    #[test]
    fn estimation_takes_max() {
        let result = normalize("sekitar 50000 atau 70000");
        assert_eq!(result.amount(), Some(70_000));
        assert_eq!(result.source(), Some(AmountSource::Estimation));
        assert_eq!(result.confidence(), Confidence::Low);
    }

    #[test]
    fn estimation_slang_cues() {
        assert_eq!(amount_and_source("parkir keknya 5000"), (Some(5_000), "estimation"));
        assert_eq!(amount_and_source("mgkn 12.000"), (Some(12_000), "estimation"));
    }

    #[test]
    fn fallback_takes_max() {
        let result = normalize("belanja 12000 dan 30000");
        assert_eq!(result.amount(), Some(30_000));
        assert_eq!(result.source(), Some(AmountSource::Fallback));
        assert_eq!(result.confidence(), Confidence::Medium);
    }

    #[test]
    fn no_amount() {
        for text in ["makan siang doang", "", "beli 3 roti", "jam 12 makan"] {
            let result = normalize(text);
            assert_eq!(result, AmountResult::Missing, "text: {text:?}");
            assert_eq!(result.source_label(), "none");
            assert_eq!(result.confidence(), Confidence::Low);
            assert_eq!(result.currency(), "IDR");
        }
    }
}
