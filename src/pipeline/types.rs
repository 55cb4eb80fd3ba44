//! Shared types for the decision pipeline.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Currency every extracted amount is reported in.
pub const CURRENCY: &str = "IDR";

// ── Status ──────────────────────────────────────────────────────────

/// Outcome of the edge flagger for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No flags raised.
    Ok,
    /// At least one flag raised, but an amount is present.
    Ambiguous,
    /// No amount-shaped token anywhere. Terminal.
    Rejected,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Ok, Status::Ambiguous, Status::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Ambiguous => "ambiguous",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Flags ───────────────────────────────────────────────────────────

/// Fixed vocabulary of flags the flagger may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    MissingAmount,
    MultipleCategories,
    Estimation,
    NonPlusOperator,
    ForeignCurrency,
    Calculation,
    Typo,
    RoundTrip,
    UnitPrice,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingAmount => "missing_amount",
            Self::MultipleCategories => "multiple_categories",
            Self::Estimation => "estimation",
            Self::NonPlusOperator => "non_plus_operator",
            Self::ForeignCurrency => "foreign_currency",
            Self::Calculation => "calculation",
            Self::Typo => "typo",
            Self::RoundTrip => "round_trip",
            Self::UnitPrice => "unit_price",
        }
    }

    /// Noise flags that are stripped before rule matching.
    ///
    /// Only `typo` and `round_trip`. `estimation` and `unit_price` are kept.
    pub fn is_decorative(&self) -> bool {
        matches!(self, Self::Typo | Self::RoundTrip)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unordered set of flags. Iteration is in vocabulary order so joined
/// output is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet(BTreeSet<Flag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.0.iter().copied()
    }

    /// True when the two sets share at least one flag.
    pub fn intersects(&self, other: &FlagSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Copy of this set with the decorative flags removed.
    pub fn without_decorative(&self) -> FlagSet {
        self.iter().filter(|f| !f.is_decorative()).collect()
    }

    /// `|`-joined representation used in decision output.
    pub fn joined(&self) -> String {
        self.iter().map(|f| f.as_str()).collect::<Vec<_>>().join("|")
    }

    /// Serialize as the joined string rather than a list.
    pub(crate) fn serialize_joined<S: serde::Serializer>(
        flags: &FlagSet,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&flags.joined())
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Flag; N]> for FlagSet {
    fn from(flags: [Flag; N]) -> Self {
        flags.into_iter().collect()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// A (status, flags) pair, as produced by the flagger or labeled by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub status: Status,
    #[serde(default)]
    pub flags: FlagSet,
}

impl Condition {
    pub fn new(status: Status, flags: FlagSet) -> Self {
        Self { status, flags }
    }
}

// ── Amounts ─────────────────────────────────────────────────────────

/// How much the extracted amount can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Which stage of the normalizer cascade produced an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    ExplicitCurrency,
    Shorthand,
    Calculation,
    Estimation,
    Fallback,
}

impl AmountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitCurrency => "explicit_currency",
            Self::Shorthand => "shorthand",
            Self::Calculation => "calculation",
            Self::Estimation => "estimation",
            Self::Fallback => "fallback",
        }
    }

    pub fn confidence(&self) -> Confidence {
        match self {
            Self::ExplicitCurrency | Self::Shorthand => Confidence::High,
            Self::Calculation | Self::Fallback => Confidence::Medium,
            Self::Estimation => Confidence::Low,
        }
    }
}

/// Best-effort amount extracted from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountResult {
    Found { amount: u64, source: AmountSource },
    Missing,
}

impl AmountResult {
    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::Found { amount, .. } => Some(*amount),
            Self::Missing => None,
        }
    }

    /// Same as `amount` until currency conversion exists.
    pub fn normalized(&self) -> Option<u64> {
        self.amount()
    }

    pub fn currency(&self) -> &'static str {
        CURRENCY
    }

    pub fn source(&self) -> Option<AmountSource> {
        match self {
            Self::Found { source, .. } => Some(*source),
            Self::Missing => None,
        }
    }

    /// Source tag including `none` for a missing amount.
    pub fn source_label(&self) -> &'static str {
        self.source().map_or("none", |s| s.as_str())
    }

    pub fn confidence(&self) -> Confidence {
        self.source().map_or(Confidence::Low, |s| s.confidence())
    }
}

#[derive(Serialize)]
struct AmountView {
    amount: Option<u64>,
    normalized: Option<u64>,
    currency: &'static str,
    confidence: Confidence,
    source: &'static str,
}

impl Serialize for AmountResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AmountView {
            amount: self.amount(),
            normalized: self.normalized(),
            currency: self.currency(),
            confidence: self.confidence(),
            source: self.source_label(),
        }
        .serialize(serializer)
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// One line of user text entering the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub text: String,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

// ── Decisions ───────────────────────────────────────────────────────

/// The rule chosen for a condition, with what the bot should do about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub rule_id: String,
    pub action: String,
    pub final_status: String,
    pub bot_response: String,
}

/// Final pipeline output for one message. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    pub id: String,
    pub text: String,
    pub status: Status,
    #[serde(serialize_with = "FlagSet::serialize_joined")]
    pub flags: FlagSet,
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(flatten)]
    pub amount: AmountResult,
}
