//! Deterministic capability implementations with no network behind them.
//!
//! These run real schedules end to end: instructions are read as constraint
//! JSON when they parse as such, content rotates through the eligible pool,
//! and the proposer walks a fixed decision ladder off the snapshot. Useful
//! as a worker fallback when no LLM is configured, and as the backbone of
//! the integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use lineup_core::{SchedulingWindow, SelectionMode};
use lineup_rules::SchedulingConstraints;

use crate::action::{Action, ParseConstraintsArgs, SelectContentArgs};
use crate::capability::{
    ActionProposer, CapabilityError, ConstraintParser, ContentChoice, ContentSelector, Proposal,
    SelectionOutcome, SelectionRequest, SubjectiveScorer,
};
use crate::runner::Capabilities;
use crate::state::{ScheduleSummary, StateSnapshot};

/// The full offline capability set.
pub fn offline_capabilities() -> Capabilities {
    Capabilities {
        parser: Arc::new(OfflineParser),
        selector: Arc::new(RotationSelector::default()),
        proposer: Arc::new(GreedyProposer),
        scorer: Arc::new(FixedScorer::default()),
    }
}

// ── Parser ──────────────────────────────────────────────────────────

/// Accepts instructions already written as constraint JSON; anything else
/// becomes the empty rule set. No prose understanding offline.
pub struct OfflineParser;

#[async_trait]
impl ConstraintParser for OfflineParser {
    async fn parse_constraints(
        &self,
        instructions: &str,
        _window: &SchedulingWindow,
    ) -> Result<SchedulingConstraints, CapabilityError> {
        match SchedulingConstraints::from_json_str(instructions) {
            Ok(constraints) => Ok(constraints),
            Err(err) => {
                debug!(error = %err, "instructions are not constraint JSON, using the empty rule set");
                Ok(SchedulingConstraints::default())
            }
        }
    }
}

// ── Selector ────────────────────────────────────────────────────────

/// Rotates through the eligible pool so long runs spread the library
/// instead of repeating the first item. Prefers items whose runtime fits
/// the span; falls back to the whole pool when nothing fits.
#[derive(Default)]
pub struct RotationSelector {
    cursor: AtomicUsize,
}

#[async_trait]
impl ContentSelector for RotationSelector {
    async fn select_content(
        &self,
        request: SelectionRequest<'_>,
    ) -> Result<SelectionOutcome, CapabilityError> {
        if request.eligible.is_empty() {
            return Ok(SelectionOutcome::NoSuitableContent {
                reason: "no eligible content for this span".into(),
            });
        }

        let span_minutes = (request.end - request.start).num_minutes();
        let fitting: Vec<_> = request
            .eligible
            .iter()
            .copied()
            .filter(|item| {
                item.duration_minutes
                    .map_or(true, |d| i64::from(d) <= span_minutes)
            })
            .collect();
        let pool = if fitting.is_empty() {
            &request.eligible
        } else {
            &fitting
        };

        let item = pool[self.cursor.fetch_add(1, Ordering::Relaxed) % pool.len()];
        Ok(SelectionOutcome::Chosen(ContentChoice {
            content_ref: Some(item.id.clone()),
            selection_mode: SelectionMode::Specific,
            category_filters: vec![],
            confidence: 1.0,
            rationale: Some(format!("library rotation for {}", request.context_hint)),
        }))
    }
}

// ── Proposer ────────────────────────────────────────────────────────

/// Stateless decision ladder: parse instructions once, keep the gap
/// analysis fresh, fill the first suggested span while any gap is open,
/// then check violations, evaluate quality, and finish.
pub struct GreedyProposer;

#[async_trait]
impl ActionProposer for GreedyProposer {
    async fn propose_action(&self, snapshot: &StateSnapshot) -> Result<Proposal, CapabilityError> {
        if snapshot.user_instructions.is_some() && !snapshot.constraints_parsed {
            return Ok(Proposal::Invoke(Action::ParseConstraints(
                ParseConstraintsArgs::default(),
            )));
        }

        let Some(gaps) = &snapshot.gap_summary else {
            return Ok(Proposal::Invoke(Action::IdentifyGaps));
        };
        if gaps.open_gaps > 0 {
            if let Some(span) = &gaps.first_suggestion {
                return Ok(Proposal::Invoke(Action::SelectContent(SelectContentArgs {
                    start: span.start,
                    end: span.end,
                    hint: None,
                })));
            }
        }

        if snapshot.violation_count.is_none() {
            return Ok(Proposal::Invoke(Action::CheckViolations));
        }
        if snapshot.last_quality.is_none() {
            return Ok(Proposal::Invoke(Action::EvaluateQuality));
        }
        Ok(Proposal::Finish {
            reason: "window tiled and checked".into(),
        })
    }
}

// ── Scorer ──────────────────────────────────────────────────────────

/// Grades every requested dimension with the same fixed score. Honest
/// about what it is: offline runs have no taste.
pub struct FixedScorer {
    pub score: f64,
}

impl Default for FixedScorer {
    fn default() -> Self {
        Self { score: 0.7 }
    }
}

#[async_trait]
impl SubjectiveScorer for FixedScorer {
    async fn score_schedule(
        &self,
        _summary: &ScheduleSummary,
        _constraints: Option<&SchedulingConstraints>,
        criteria: &[String],
    ) -> Result<IndexMap<String, f64>, CapabilityError> {
        Ok(criteria.iter().map(|c| (c.clone(), self.score)).collect())
    }
}
