//! Run state: everything one scheduling run owns while it executes.
//!
//! The control loop holds the single `&mut SchedulingState`; capabilities
//! only ever see read-only projections ([`StateSnapshot`] for the proposer,
//! [`ScheduleSummary`] for the scorer).

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lineup_core::{
    Channel, ContentCatalog, DaySchedule, Gap, ImmutableSet, InitError, SchedulingWindow,
    SelectionMode, TimeSlot,
};
use lineup_rules::{SchedulingConstraints, Violation};

use crate::cost::CostTier;
use crate::quality::QualityReport;
use crate::request::ScheduleRequest;

// ── Bookkeeping records ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    ActionCompleted,
    ActionFailed,
    NoSuitableContent,
    CapabilityTimeout,
    CapabilityFailed,
    DeadlineReached,
    CeilingReached,
    ProposerFinished,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DecisionKind::ActionCompleted => "action_completed",
            DecisionKind::ActionFailed => "action_failed",
            DecisionKind::NoSuitableContent => "no_suitable_content",
            DecisionKind::CapabilityTimeout => "capability_timeout",
            DecisionKind::CapabilityFailed => "capability_failed",
            DecisionKind::DeadlineReached => "deadline_reached",
            DecisionKind::CeilingReached => "ceiling_reached",
            DecisionKind::ProposerFinished => "proposer_finished",
        };
        f.write_str(label)
    }
}

/// One entry of the human-readable decision trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub iteration: u32,
    pub kind: DecisionKind,
    pub detail: String,
}

impl DecisionEntry {
    pub fn render(&self) -> String {
        format!("iteration {} [{}] {}", self.iteration, self.kind, self.detail)
    }
}

/// One dispatched action, the cost accountant's unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: String,
    pub iteration: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    InProgress,
    Complete,
    Partial,
    Failed,
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Complete => "complete",
            CompletionStatus::Partial => "partial",
            CompletionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

// ── Proposer-facing snapshot ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanHint {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Condensed view of the gap cache, enough for a proposer to aim its
/// next fill without carrying the full gap list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    pub open_gaps: usize,
    pub unfilled_minutes: i64,
    /// First suggested sub-interval of the first open gap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_suggestion: Option<SpanHint>,
}

impl GapSummary {
    pub fn of(gaps: &[Gap]) -> Self {
        Self {
            open_gaps: gaps.len(),
            unfilled_minutes: gaps.iter().map(|g| g.duration_minutes).sum(),
            first_suggestion: gaps
                .first()
                .and_then(|g| g.suggested.first())
                .map(|b| SpanHint {
                    start: b.start,
                    end: b.end,
                }),
        }
    }
}

/// What the proposal capability sees each Planning entry. Serializable so
/// an LLM-backed proposer can ship it as prompt context verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub channel: String,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub iteration: u32,
    pub max_iterations: u32,
    pub quality_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_instructions: Option<String>,
    pub constraints_parsed: bool,
    pub content_rule_count: usize,
    pub media_count: usize,
    pub filled_slots: usize,
    pub filled_minutes: i64,
    pub total_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_summary: Option<GapSummary>,
    /// `None` until a violation check has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_quality: Option<f64>,
    pub recent_decisions: Vec<String>,
}

// ── Scorer-facing summary ───────────────────────────────────────────

/// Day-by-day rendering of the schedule for subjective scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub channel: String,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub slot_count: usize,
    pub filled_minutes: i64,
    pub total_minutes: i64,
    pub days: Vec<DayOutline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOutline {
    pub date: NaiveDate,
    pub entries: Vec<String>,
}

fn describe_slot(slot: &TimeSlot) -> String {
    let what = match &slot.content_ref {
        Some(id) => id.clone(),
        None => match slot.selection_mode {
            SelectionMode::Random => format!("random pick [{}]", slot.category_filters.join(", ")),
            SelectionMode::Sequential => {
                format!("sequential pick [{}]", slot.category_filters.join(", "))
            }
            SelectionMode::Specific => "(unassigned)".to_string(),
        },
    };
    let end = if slot.end.date() > slot.start.date() {
        format!("{}+1", slot.end.time().format("%H:%M"))
    } else {
        slot.end.time().format("%H:%M").to_string()
    };
    format!("{}-{} {}", slot.start.time().format("%H:%M"), end, what)
}

// ── The run state itself ────────────────────────────────────────────

/// Exclusive per-run state. Built once from the request, mutated only by
/// the control loop, torn down into the response.
#[derive(Debug)]
pub struct SchedulingState {
    pub channel: Channel,
    pub window: SchedulingWindow,
    pub schedule: DaySchedule,
    pub immutable: ImmutableSet,
    pub catalog: ContentCatalog,
    pub user_instructions: Option<String>,
    pub preferred_boundaries: Vec<chrono::NaiveTime>,
    pub evaluation_criteria: Vec<String>,
    pub cost_tier: CostTier,

    /// `None` until a parse_constraints action has run.
    pub constraints: Option<SchedulingConstraints>,
    /// Refreshed by identify_gaps, dropped on every successful fill.
    pub gap_analysis: Option<Vec<Gap>>,
    /// Refreshed by check_violations, dropped on every successful fill.
    pub violations: Option<Vec<Violation>>,
    pub quality: Option<QualityReport>,

    pub iterations: u32,
    pub max_iterations: u32,
    pub quality_threshold: f64,
    pub decisions: Vec<DecisionEntry>,
    pub actions: Vec<ActionRecord>,
    pub completion_status: CompletionStatus,
}

impl SchedulingState {
    /// Validate the request and lift it into run state. The only fatal
    /// errors of a run happen here.
    pub fn from_request(request: ScheduleRequest) -> Result<Self, InitError> {
        let window = request.window()?;
        let (schedule, immutable) = DaySchedule::from_daily_slots(request.daily_slots)?;
        Ok(Self {
            channel: request.channel,
            window,
            schedule,
            immutable,
            catalog: ContentCatalog::from_items(request.media),
            user_instructions: request.user_instructions,
            preferred_boundaries: request.preferred_boundaries,
            evaluation_criteria: request.evaluation_criteria,
            cost_tier: request.cost_tier,
            constraints: None,
            gap_analysis: None,
            violations: None,
            quality: None,
            iterations: 0,
            max_iterations: request.max_iterations,
            quality_threshold: request.quality_threshold,
            decisions: Vec::new(),
            actions: Vec::new(),
            completion_status: CompletionStatus::InProgress,
        })
    }

    pub fn record_decision(&mut self, kind: DecisionKind, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(iteration = self.iterations, kind = %kind, %detail, "decision");
        self.decisions.push(DecisionEntry {
            iteration: self.iterations,
            kind,
            detail,
        });
    }

    pub fn record_action(&mut self, name: &str) {
        self.actions.push(ActionRecord {
            action: name.to_string(),
            iteration: self.iterations,
        });
    }

    /// A schedule mutation makes the cached analyses stale.
    pub fn invalidate_analysis(&mut self) {
        self.gap_analysis = None;
        self.violations = None;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            channel: self.channel.name.clone(),
            window_start: self.window.start,
            window_end: self.window.end,
            iteration: self.iterations,
            max_iterations: self.max_iterations,
            quality_threshold: self.quality_threshold,
            user_instructions: self.user_instructions.clone(),
            constraints_parsed: self.constraints.is_some(),
            content_rule_count: self
                .constraints
                .as_ref()
                .map_or(0, |c| c.content_rules.len()),
            media_count: self.catalog.len(),
            filled_slots: self.schedule.slot_count(),
            filled_minutes: self.schedule.filled_minutes_within(&self.window),
            total_minutes: self.window.total_minutes(),
            gap_summary: self.gap_analysis.as_deref().map(GapSummary::of),
            violation_count: self.violations.as_ref().map(Vec::len),
            last_quality: self.quality.as_ref().map(|q| q.overall_score),
            recent_decisions: self
                .decisions
                .iter()
                .rev()
                .take(10)
                .rev()
                .map(DecisionEntry::render)
                .collect(),
        }
    }

    pub fn summary(&self) -> ScheduleSummary {
        let days = self
            .window
            .days()
            .filter_map(|date| {
                let slots = self.schedule.slots_for(date);
                (!slots.is_empty()).then(|| DayOutline {
                    date,
                    entries: slots.iter().map(describe_slot).collect(),
                })
            })
            .collect();
        ScheduleSummary {
            channel: self.channel.name.clone(),
            window_start: self.window.start,
            window_end: self.window.end,
            slot_count: self.schedule.slot_count(),
            filled_minutes: self.schedule.filled_minutes_within(&self.window),
            total_minutes: self.window.total_minutes(),
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lineup_core::find_gaps;

    fn base_request() -> ScheduleRequest {
        serde_json::from_value(serde_json::json!({
            "channel": {"name": "Retro TV"},
            "start_date": "2026-02-01",
            "window_days": 1,
        }))
        .unwrap()
    }

    #[test]
    fn snapshot_reflects_caches() {
        let mut state = SchedulingState::from_request(base_request()).unwrap();
        let snap = state.snapshot();
        assert!(snap.gap_summary.is_none());
        assert!(snap.violation_count.is_none());
        assert!(!snap.constraints_parsed);
        assert_eq!(snap.total_minutes, 1200);

        state.gap_analysis = Some(find_gaps(&state.schedule, &state.window, &[]));
        state.violations = Some(vec![]);
        let snap = state.snapshot();
        let gaps = snap.gap_summary.unwrap();
        assert_eq!(gaps.open_gaps, 2);
        assert_eq!(gaps.unfilled_minutes, 1200);
        assert_eq!(snap.violation_count, Some(0));
    }

    #[test]
    fn recent_decisions_keep_the_tail() {
        let mut state = SchedulingState::from_request(base_request()).unwrap();
        for i in 0..15 {
            state.record_decision(DecisionKind::ActionCompleted, format!("step {i}"));
        }
        let snap = state.snapshot();
        assert_eq!(snap.recent_decisions.len(), 10);
        assert!(snap.recent_decisions[0].contains("step 5"));
        assert!(snap.recent_decisions[9].contains("step 14"));
    }

    #[test]
    fn summary_outlines_scheduled_days_only() {
        let mut request = base_request();
        request.window_days = 2;
        request.daily_slots = vec![TimeSlot::new(
            NaiveDate::from_ymd_opt(2026, 2, 1)
                .unwrap()
                .and_hms_opt(23, 0, 0)
                .unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 2)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap(),
            Some("movie:alien".into()),
        )
        .unwrap()];

        let state = SchedulingState::from_request(request).unwrap();
        let summary = state.summary();
        assert_eq!(summary.slot_count, 1);
        assert_eq!(summary.days.len(), 1);
        assert_eq!(summary.days[0].entries, ["23:00-01:00+1 movie:alien"]);
    }
}
