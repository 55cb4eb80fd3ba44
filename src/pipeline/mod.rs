//! Expense message decision pipeline.
//!
//! Every message flows through:
//! 1. `flagger::flag()` — hard amount gate plus ambiguity and noise flags
//! 2. `amount::normalize()` — best-guess amount, independent of step 1
//! 3. `RulesEngine::evaluate()` — first rule in evaluation order that fits
//!    the flagger's (status, flags)
//!
//! All three are pure. The only shared state is the rule table, which is
//! loaded once and never mutated.

pub mod amount;
pub mod flagger;
pub mod processor;
pub mod rules;
pub mod types;
