//! The control loop: Planning → Acting → Planning → ... → Finishing.
//!
//! Planning consults the proposal capability; Acting dispatches exactly one
//! action; Finishing classifies the outcome and assembles the response.
//! Recoverable failures (overlaps, parse trouble, capability errors) become
//! decision-log entries and the run keeps going; only initialization can
//! abort a run before it produces a response.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use lineup_core::time::context_hint;
use lineup_core::{find_gaps, InitError, SelectionMode, TimeSlot};
use lineup_rules::SchedulingConstraints;

use crate::action::{Action, FillSlotArgs, ParseConstraintsArgs, SelectContentArgs};
use crate::capability::{
    ActionProposer, ConstraintParser, ContentSelector, Proposal, SelectionOutcome,
    SelectionRequest, SubjectiveScorer,
};
use crate::cost::estimate_cost;
use crate::quality::QualityReport;
use crate::request::{RunSummary, ScheduleRequest, ScheduleResponse};
use crate::state::{CompletionStatus, DecisionEntry, DecisionKind, SchedulingState};

/// The four capability implementations a runner drives.
#[derive(Clone)]
pub struct Capabilities {
    pub parser: Arc<dyn ConstraintParser>,
    pub selector: Arc<dyn ContentSelector>,
    pub proposer: Arc<dyn ActionProposer>,
    pub scorer: Arc<dyn SubjectiveScorer>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("initialization failed: {0}")]
    Init(#[from] InitError),
}

/// What a Planning entry decided.
enum Verdict {
    Act(Action),
    /// Proposer failed recoverably; plan again (the ceiling bounds this).
    Replan,
    Finish {
        /// True when something cut the run short (timeout, deadline); a
        /// forced finish can never report `complete`.
        forced: bool,
    },
}

enum ActOutcome {
    Continue,
    /// A blocking capability timed out mid-action; stop the run.
    ForceFinish,
}

/// Drives one request through the loop to a response.
pub struct ScheduleRunner {
    capabilities: Capabilities,
    capability_timeout: Duration,
    deadline: Option<Instant>,
}

impl ScheduleRunner {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            capability_timeout: Duration::from_secs(60),
            deadline: None,
        }
    }

    /// Budget for each individual capability call.
    pub fn with_capability_timeout(mut self, timeout: Duration) -> Self {
        self.capability_timeout = timeout;
        self
    }

    /// Overall deadline; a run past it finishes with its partial result.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub async fn run(&self, request: ScheduleRequest) -> Result<ScheduleResponse, RunError> {
        let mut state = SchedulingState::from_request(request)?;
        info!(
            channel = %state.channel.name,
            window_start = %state.window.start,
            window_end = %state.window.end,
            max_iterations = state.max_iterations,
            media = state.catalog.len(),
            "run started"
        );

        let mut forced = false;
        loop {
            match self.plan(&mut state).await {
                Verdict::Finish { forced: f } => {
                    forced = f;
                    break;
                }
                Verdict::Replan => continue,
                Verdict::Act(action) => match self.act(&mut state, action).await {
                    ActOutcome::Continue => {}
                    ActOutcome::ForceFinish => {
                        forced = true;
                        break;
                    }
                },
            }
        }

        Ok(self.finish(&mut state, forced).await)
    }

    // ── Planning ────────────────────────────────────────────────────

    async fn plan(&self, state: &mut SchedulingState) -> Verdict {
        state.iterations += 1;

        // The hard ceiling is the primary termination guarantee; it does
        // not consult the proposer.
        if state.iterations > state.max_iterations {
            state.record_decision(
                DecisionKind::CeilingReached,
                format!("iteration ceiling {} reached", state.max_iterations),
            );
            info!(iterations = state.iterations, "ceiling reached, finishing");
            return Verdict::Finish { forced: false };
        }

        if self.deadline_passed() {
            state.record_decision(
                DecisionKind::DeadlineReached,
                "caller deadline passed before planning",
            );
            return Verdict::Finish { forced: true };
        }

        let snapshot = state.snapshot();
        debug!(
            iteration = state.iterations,
            filled_slots = snapshot.filled_slots,
            "planning"
        );

        let proposal = timeout(
            self.capability_timeout,
            self.capabilities.proposer.propose_action(&snapshot),
        )
        .await;

        match proposal {
            Err(_) => {
                state.record_decision(
                    DecisionKind::CapabilityTimeout,
                    format!("proposer exceeded {}s", self.capability_timeout.as_secs()),
                );
                warn!("proposer timed out, finishing early");
                Verdict::Finish { forced: true }
            }
            Ok(Err(err)) => {
                state.record_decision(
                    DecisionKind::CapabilityFailed,
                    format!("proposer failed: {err}"),
                );
                warn!(error = %err, "proposer failed, replanning");
                Verdict::Replan
            }
            Ok(Ok(Proposal::Finish { reason })) => {
                state.record_decision(DecisionKind::ProposerFinished, reason);
                Verdict::Finish { forced: false }
            }
            Ok(Ok(Proposal::Invoke(action))) => {
                // Cancellation check at the Planning→Acting boundary: a
                // passed deadline returns the partial result instead of
                // starting new work.
                if self.deadline_passed() {
                    state.record_decision(
                        DecisionKind::DeadlineReached,
                        "caller deadline passed before acting",
                    );
                    return Verdict::Finish { forced: true };
                }
                Verdict::Act(action)
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    // ── Acting ──────────────────────────────────────────────────────

    async fn act(&self, state: &mut SchedulingState, action: Action) -> ActOutcome {
        let name = action.name();
        state.record_action(name);
        debug!(iteration = state.iterations, action = name, "acting");

        match action {
            Action::IdentifyGaps => {
                self.identify_gaps(state);
                ActOutcome::Continue
            }
            Action::FillSlot(args) => {
                self.fill_slot(state, args);
                ActOutcome::Continue
            }
            Action::SelectContent(args) => self.select_content(state, args).await,
            Action::ParseConstraints(args) => {
                self.parse_constraints(state, args).await;
                ActOutcome::Continue
            }
            Action::CheckViolations => {
                self.check_violations(state);
                ActOutcome::Continue
            }
            Action::EvaluateQuality => {
                self.evaluate_quality(state).await;
                ActOutcome::Continue
            }
        }
    }

    fn identify_gaps(&self, state: &mut SchedulingState) {
        let gaps = find_gaps(&state.schedule, &state.window, &state.preferred_boundaries);
        let open = gaps.len();
        let minutes: i64 = gaps.iter().map(|g| g.duration_minutes).sum();
        state.gap_analysis = Some(gaps);
        state.record_decision(
            DecisionKind::ActionCompleted,
            format!("identified {open} gaps, {minutes} minutes unfilled"),
        );
    }

    fn fill_slot(&self, state: &mut SchedulingState, args: FillSlotArgs) {
        let slot = match TimeSlot::new(args.start, args.end, args.content_ref) {
            Ok(mut slot) => {
                slot.selection_mode = args.selection_mode;
                slot.category_filters = args.category_filters;
                slot.notes = args.notes;
                slot
            }
            Err(err) => {
                state.record_decision(DecisionKind::ActionFailed, format!("fill rejected: {err}"));
                return;
            }
        };

        let span = format!("{}..{}", slot.start, slot.end);
        match state.schedule.fill(slot, &state.immutable) {
            Ok(()) => {
                state.invalidate_analysis();
                state.record_decision(DecisionKind::ActionCompleted, format!("filled {span}"));
            }
            Err(err) => {
                state.record_decision(DecisionKind::ActionFailed, format!("fill rejected: {err}"));
            }
        }
    }

    async fn select_content(
        &self,
        state: &mut SchedulingState,
        args: SelectContentArgs,
    ) -> ActOutcome {
        if args.start >= args.end {
            state.record_decision(
                DecisionKind::ActionFailed,
                format!("selection span is empty: {}..{}", args.start, args.end),
            );
            return ActOutcome::Continue;
        }

        let empty = SchedulingConstraints::default();
        let outcome = {
            let constraints = state.constraints.as_ref();
            let eligible = lineup_rules::eligible_content(
                args.start,
                args.end,
                constraints.unwrap_or(&empty),
                &state.catalog,
            );
            let request = SelectionRequest {
                start: args.start,
                end: args.end,
                day: args.start.date(),
                schedule: &state.schedule,
                eligible,
                constraints,
                context_hint: args
                    .hint
                    .clone()
                    .unwrap_or_else(|| context_hint(args.start)),
            };
            timeout(
                self.capability_timeout,
                self.capabilities.selector.select_content(request),
            )
            .await
        };

        match outcome {
            Err(_) => {
                state.record_decision(
                    DecisionKind::CapabilityTimeout,
                    format!("selector exceeded {}s", self.capability_timeout.as_secs()),
                );
                warn!("selector timed out, finishing early");
                ActOutcome::ForceFinish
            }
            Ok(Err(err)) => {
                state.record_decision(
                    DecisionKind::CapabilityFailed,
                    format!("selector failed: {err}"),
                );
                ActOutcome::Continue
            }
            Ok(Ok(SelectionOutcome::NoSuitableContent { reason })) => {
                state.record_decision(
                    DecisionKind::NoSuitableContent,
                    format!("{}..{} left open: {reason}", args.start, args.end),
                );
                ActOutcome::Continue
            }
            Ok(Ok(SelectionOutcome::Chosen(choice))) => {
                let label = match &choice.content_ref {
                    Some(id) => id.clone(),
                    None => format!("{} pick", mode_label(choice.selection_mode)),
                };
                debug!(
                    content = %label,
                    confidence = choice.confidence,
                    rationale = choice.rationale.as_deref().unwrap_or(""),
                    "content chosen"
                );
                let slot = match TimeSlot::new(args.start, args.end, choice.content_ref) {
                    Ok(mut slot) => {
                        slot.selection_mode = choice.selection_mode;
                        slot.category_filters = choice.category_filters;
                        slot
                    }
                    Err(err) => {
                        state.record_decision(
                            DecisionKind::ActionFailed,
                            format!("selected slot rejected: {err}"),
                        );
                        return ActOutcome::Continue;
                    }
                };
                match state.schedule.fill(slot, &state.immutable) {
                    Ok(()) => {
                        state.invalidate_analysis();
                        state.record_decision(
                            DecisionKind::ActionCompleted,
                            format!("selected {label} for {}..{}", args.start, args.end),
                        );
                    }
                    Err(err) => {
                        state.record_decision(
                            DecisionKind::ActionFailed,
                            format!("selected slot rejected: {err}"),
                        );
                    }
                }
                ActOutcome::Continue
            }
        }
    }

    async fn parse_constraints(&self, state: &mut SchedulingState, args: ParseConstraintsArgs) {
        let instructions = args
            .instructions
            .or_else(|| state.user_instructions.clone());
        let Some(text) = instructions else {
            state.constraints = Some(SchedulingConstraints::default());
            state.record_decision(
                DecisionKind::ActionCompleted,
                "no instructions to parse, empty rule set stored",
            );
            return;
        };

        let parsed = timeout(
            self.capability_timeout,
            self.capabilities
                .parser
                .parse_constraints(&text, &state.window),
        )
        .await;

        match parsed {
            Ok(Ok(constraints)) => {
                let detail = format!(
                    "parsed {} content rules{}",
                    constraints.content_rules.len(),
                    if constraints.repetition.is_some() {
                        " and a repetition rule"
                    } else {
                        ""
                    }
                );
                state.constraints = Some(constraints);
                state.record_decision(DecisionKind::ActionCompleted, detail);
            }
            Ok(Err(err)) => {
                state.constraints = Some(SchedulingConstraints::default());
                state.record_decision(
                    DecisionKind::CapabilityFailed,
                    format!("constraint parsing failed ({err}), continuing unconstrained"),
                );
            }
            Err(_) => {
                state.constraints = Some(SchedulingConstraints::default());
                state.record_decision(
                    DecisionKind::CapabilityTimeout,
                    format!(
                        "constraint parsing exceeded {}s, continuing unconstrained",
                        self.capability_timeout.as_secs()
                    ),
                );
            }
        }
    }

    fn check_violations(&self, state: &mut SchedulingState) {
        let empty = SchedulingConstraints::default();
        let constraints = state.constraints.as_ref().unwrap_or(&empty);
        let violations = lineup_rules::check_violations(&state.schedule, constraints, &state.catalog);
        let count = violations.len();
        state.violations = Some(violations);
        state.record_decision(
            DecisionKind::ActionCompleted,
            format!("{count} violations found"),
        );
    }

    async fn evaluate_quality(&self, state: &mut SchedulingState) {
        let subjective = self.subjective_scores(state).await;
        let report = crate::quality::evaluate_quality(
            &state.schedule,
            &state.window,
            state.constraints.as_ref(),
            &state.catalog,
            &subjective,
        );
        let overall = report.overall_score;
        state.quality = Some(report);
        state.record_decision(
            DecisionKind::ActionCompleted,
            format!("overall quality {overall:.2}"),
        );
    }

    /// Ask the scorer for the subjective dimensions; on any trouble the
    /// quality report degrades to objective dimensions only.
    async fn subjective_scores(
        &self,
        state: &mut SchedulingState,
    ) -> indexmap::IndexMap<String, f64> {
        if state.evaluation_criteria.is_empty() {
            return indexmap::IndexMap::new();
        }
        let summary = state.summary();
        let scored = timeout(
            self.capability_timeout,
            self.capabilities.scorer.score_schedule(
                &summary,
                state.constraints.as_ref(),
                &state.evaluation_criteria,
            ),
        )
        .await;

        match scored {
            Ok(Ok(scores)) => scores,
            Ok(Err(err)) => {
                state.record_decision(
                    DecisionKind::CapabilityFailed,
                    format!("scorer failed ({err}), objective dimensions only"),
                );
                indexmap::IndexMap::new()
            }
            Err(_) => {
                state.record_decision(
                    DecisionKind::CapabilityTimeout,
                    format!(
                        "scorer exceeded {}s, objective dimensions only",
                        self.capability_timeout.as_secs()
                    ),
                );
                indexmap::IndexMap::new()
            }
        }
    }

    // ── Finishing ───────────────────────────────────────────────────

    async fn finish(&self, state: &mut SchedulingState, forced: bool) -> ScheduleResponse {
        let gaps = find_gaps(&state.schedule, &state.window, &state.preferred_boundaries);
        let open_gaps = gaps.len();
        let unfilled_minutes: i64 = gaps.iter().map(|g| g.duration_minutes).sum();
        state.gap_analysis = Some(gaps);

        let subjective = self.subjective_scores(state).await;
        let report = crate::quality::evaluate_quality(
            &state.schedule,
            &state.window,
            state.constraints.as_ref(),
            &state.catalog,
            &subjective,
        );
        state.quality = Some(report.clone());

        let status = if state.schedule.is_empty() {
            CompletionStatus::Failed
        } else if open_gaps == 0 && !forced {
            CompletionStatus::Complete
        } else {
            CompletionStatus::Partial
        };
        state.completion_status = status;

        let cost = estimate_cost(&state.actions, state.cost_tier);
        let overview = overview_line(state, status, open_gaps, unfilled_minutes, &report);
        info!(
            status = %status,
            iterations = state.iterations,
            open_gaps,
            unfilled_minutes,
            total_usd = cost.total_usd,
            "run finished"
        );

        ScheduleResponse {
            overview,
            slots: state.schedule.flatten(),
            summary: RunSummary {
                total_iterations: state.iterations,
                completion_status: status,
                key_decisions: state
                    .decisions
                    .iter()
                    .rev()
                    .take(10)
                    .rev()
                    .map(DecisionEntry::render)
                    .collect(),
                constraints_applied: state.constraints.clone(),
                unfilled_minutes,
                open_gaps,
                quality: report,
                cost,
            },
        }
    }
}

fn mode_label(mode: SelectionMode) -> &'static str {
    match mode {
        SelectionMode::Specific => "specific",
        SelectionMode::Random => "random",
        SelectionMode::Sequential => "sequential",
    }
}

fn overview_line(
    state: &SchedulingState,
    status: CompletionStatus,
    open_gaps: usize,
    unfilled_minutes: i64,
    quality: &QualityReport,
) -> String {
    let channel = &state.channel.name;
    match status {
        CompletionStatus::Complete => format!(
            "Scheduled {} slots for {channel}, covering the full window {}..{}; overall quality {:.2}.",
            state.schedule.slot_count(),
            state.window.start,
            state.window.end,
            quality.overall_score
        ),
        CompletionStatus::Partial => format!(
            "Scheduled {} slots for {channel} ({:.0}% of the window); {open_gaps} gaps totaling {unfilled_minutes} minutes remain; overall quality {:.2}.",
            state.schedule.slot_count(),
            quality.coverage * 100.0,
            quality.overall_score
        ),
        CompletionStatus::Failed => format!(
            "No content could be scheduled for {channel} in {}..{}; {open_gaps} gaps totaling {unfilled_minutes} minutes remain.",
            state.window.start, state.window.end
        ),
        CompletionStatus::InProgress => {
            format!("Run for {channel} is still in progress after {} iterations.", state.iterations)
        }
    }
}
