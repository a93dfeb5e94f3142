//! Scheduling engine: the Planning/Acting/Finishing control loop and the
//! state it drives.
//!
//! The engine is deliberately split from judgment. Everything deterministic
//! lives here: the closed action set, run state and its caches, gap/violation
//! bookkeeping, quality blending, cost accounting, and the loop itself with
//! its termination guarantees. The four judgment calls (parsing instructions,
//! picking content, proposing the next move, scoring taste) are trait objects
//! behind [`Capabilities`]; wire in [`offline_capabilities`] for deterministic
//! runs or an LLM-backed set for real ones.

pub mod action;
pub mod capability;
pub mod cost;
pub mod offline;
pub mod quality;
pub mod request;
pub mod runner;
pub mod state;

pub use action::{Action, FillSlotArgs, ParseConstraintsArgs, SelectContentArgs};
pub use capability::{
    ActionProposer, CapabilityError, ConstraintParser, ContentChoice, ContentSelector, Proposal,
    SelectionOutcome, SelectionRequest, SubjectiveScorer,
};
pub use cost::{estimate_cost, ActionCost, CostBreakdown, CostTier};
pub use offline::offline_capabilities;
pub use quality::{evaluate_quality, QualityReport};
pub use request::{RunSummary, ScheduleRequest, ScheduleResponse};
pub use runner::{Capabilities, RunError, ScheduleRunner};
pub use state::{
    ActionRecord, CompletionStatus, DecisionEntry, DecisionKind, GapSummary, ScheduleSummary,
    SchedulingState, SpanHint, StateSnapshot,
};
