//! Expense Gate — decides whether an informal expense message can be
//! recorded, needs clarification, or should be rejected.

pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod report;
