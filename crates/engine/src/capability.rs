//! The four judgment seams of the engine, as async traits.
//!
//! Everything the loop cannot decide deterministically goes through one of
//! these seams: reading prose into rules, picking content, choosing the next
//! move, and scoring taste. Implementations live elsewhere (LLM-backed in
//! lineup-llm, deterministic ones in [`crate::offline`]); the engine only
//! ever sees the trait objects, so identical capability outputs produce
//! identical runs.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use thiserror::Error;

use lineup_core::{DaySchedule, MediaItem, SchedulingWindow, SelectionMode};
use lineup_rules::SchedulingConstraints;

use crate::action::Action;
use crate::state::{ScheduleSummary, StateSnapshot};

#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The backing service could not be reached or answered with an error.
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    /// The capability answered, but not in a shape we can use.
    #[error("malformed capability response: {0}")]
    Malformed(String),
    /// The capability was never given what it needs to run (key, URL, ...).
    #[error("capability not configured: {0}")]
    NotConfigured(String),
}

// ── Constraint parsing ──────────────────────────────────────────────

/// Turns free-form scheduling instructions into a structured rule set.
///
/// Ambiguous input is not an error; the contract is to return a valid
/// (possibly empty) rule set whenever the text can be read at all.
#[async_trait]
pub trait ConstraintParser: Send + Sync {
    async fn parse_constraints(
        &self,
        instructions: &str,
        window: &SchedulingWindow,
    ) -> Result<SchedulingConstraints, CapabilityError>;
}

// ── Content selection ───────────────────────────────────────────────

/// Everything a selector may consider for one span.
pub struct SelectionRequest<'a> {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub day: NaiveDate,
    pub schedule: &'a DaySchedule,
    /// Catalog items already filtered to those the rules permit here.
    pub eligible: Vec<&'a MediaItem>,
    pub constraints: Option<&'a SchedulingConstraints>,
    /// E.g. "Weekend morning".
    pub context_hint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Chosen(ContentChoice),
    /// Leaving the span unfilled on purpose; not an error.
    NoSuitableContent { reason: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ContentChoice {
    #[serde(default)]
    pub content_ref: Option<String>,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default)]
    pub category_filters: Vec<String>,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub rationale: Option<String>,
}

fn full_confidence() -> f64 {
    1.0
}

#[async_trait]
pub trait ContentSelector: Send + Sync {
    async fn select_content(
        &self,
        request: SelectionRequest<'_>,
    ) -> Result<SelectionOutcome, CapabilityError>;
}

// ── Next-action proposal ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Invoke(Action),
    Finish { reason: String },
}

/// Decides the loop's next move from a read-only state snapshot.
#[async_trait]
pub trait ActionProposer: Send + Sync {
    async fn propose_action(&self, snapshot: &StateSnapshot)
        -> Result<Proposal, CapabilityError>;
}

// ── Subjective scoring ──────────────────────────────────────────────

/// Scores dimensions the engine cannot compute, e.g. variety or flow.
/// Returned values are clamped by the quality aggregator, so a sloppy
/// implementation cannot push a score out of `[0, 1]`.
#[async_trait]
pub trait SubjectiveScorer: Send + Sync {
    async fn score_schedule(
        &self,
        summary: &ScheduleSummary,
        constraints: Option<&SchedulingConstraints>,
        criteria: &[String],
    ) -> Result<IndexMap<String, f64>, CapabilityError>;
}

// ── Scripted test doubles ───────────────────────────────────────────

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Queue-backed capability doubles for driving the loop in tests.
    //! Responses are consumed front-to-back in the order queued.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Replays a fixed proposal sequence, then finishes.
    pub struct ScriptedProposer {
        script: Mutex<VecDeque<Proposal>>,
    }

    impl ScriptedProposer {
        pub fn new(proposals: impl IntoIterator<Item = Proposal>) -> Self {
            Self {
                script: Mutex::new(proposals.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl ActionProposer for ScriptedProposer {
        async fn propose_action(
            &self,
            _snapshot: &StateSnapshot,
        ) -> Result<Proposal, CapabilityError> {
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Proposal::Finish {
                    reason: "script exhausted".into(),
                }))
        }
    }

    /// Proposes the same action forever; the ceiling has to stop it.
    pub struct RepeatProposer(pub Action);

    #[async_trait]
    impl ActionProposer for RepeatProposer {
        async fn propose_action(
            &self,
            _snapshot: &StateSnapshot,
        ) -> Result<Proposal, CapabilityError> {
            Ok(Proposal::Invoke(self.0.clone()))
        }
    }

    /// Sleeps past any reasonable timeout before answering.
    pub struct StalledProposer {
        pub delay: Duration,
    }

    #[async_trait]
    impl ActionProposer for StalledProposer {
        async fn propose_action(
            &self,
            _snapshot: &StateSnapshot,
        ) -> Result<Proposal, CapabilityError> {
            tokio::time::sleep(self.delay).await;
            Ok(Proposal::Finish {
                reason: "woke up late".into(),
            })
        }
    }

    /// Replays queued selection results front-to-back.
    pub struct ScriptedSelector {
        outcomes: Mutex<VecDeque<Result<SelectionOutcome, CapabilityError>>>,
    }

    impl ScriptedSelector {
        pub fn new(
            outcomes: impl IntoIterator<Item = Result<SelectionOutcome, CapabilityError>>,
        ) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl ContentSelector for ScriptedSelector {
        async fn select_content(
            &self,
            _request: SelectionRequest<'_>,
        ) -> Result<SelectionOutcome, CapabilityError> {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CapabilityError::Unavailable("selector script exhausted".into())))
        }
    }

    /// Always returns the same rule set.
    pub struct StaticParser(pub SchedulingConstraints);

    #[async_trait]
    impl ConstraintParser for StaticParser {
        async fn parse_constraints(
            &self,
            _instructions: &str,
            _window: &SchedulingWindow,
        ) -> Result<SchedulingConstraints, CapabilityError> {
            Ok(self.0.clone())
        }
    }

    /// Always returns the same dimension scores.
    pub struct StaticScorer(pub IndexMap<String, f64>);

    #[async_trait]
    impl SubjectiveScorer for StaticScorer {
        async fn score_schedule(
            &self,
            _summary: &ScheduleSummary,
            _constraints: Option<&SchedulingConstraints>,
            _criteria: &[String],
        ) -> Result<IndexMap<String, f64>, CapabilityError> {
            Ok(self.0.clone())
        }
    }
}
