//! Matching logic
//!
//! Crossing predicates, the per-instrument matcher, and the trigger pool
//! for conditional orders.

pub mod crossing;
pub mod matcher;
pub mod triggers;

pub use matcher::{Matcher, MatchingError, ProcessOutcome, StatusChange};
pub use triggers::TriggerPool;
