//! Scheduling constraint model and evaluation.
//!
//! This crate provides:
//! - The constraint schema (content rules with day-selected time windows,
//!   minimum-repeat-interval rules) with tolerant serde deserialization
//! - A pure evaluator that checks a full schedule and returns structured
//!   violations
//! - Catalog pre-filtering for content selection against the same rules

pub mod evaluator;
pub mod schema;

pub use evaluator::{check_violations, eligible_content, Violation};
pub use schema::{
    ContentRule, DaySelector, ParseError, RepetitionRule, SchedulingConstraints, TimeWindow,
};
