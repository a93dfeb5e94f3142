//! LLM-backed implementations of the engine's four capability traits.
//!
//! One [`LlmCapabilities`] instance serves all four seams over a single chat
//! provider. Every exchange follows the same contract: a fixed system prompt,
//! one user message carrying the serialized engine state, and a JSON-only
//! reply. Replies are fished out of markdown fences when models add them,
//! then parsed strictly; anything unusable surfaces as
//! [`CapabilityError::Malformed`] and the loop decides how to degrade.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use lineup_core::{Config, SchedulingWindow};
use lineup_engine::{
    Action, ActionProposer, Capabilities, CapabilityError, ConstraintParser, ContentChoice,
    ContentSelector, Proposal, ScheduleSummary, SelectionOutcome, SelectionRequest, StateSnapshot,
    SubjectiveScorer,
};
use lineup_rules::SchedulingConstraints;

use crate::provider::{ChatProvider, LlmError, Message};
use crate::providers::create_provider;

// ── System prompts ──────────────────────────────────────────────────

const PARSER_SYSTEM_PROMPT: &str = r#"You turn television scheduling instructions into a JSON rule set.

Reply with ONLY a JSON object, no explanation, shaped like:
{
  "content_rules": [
    {
      "label": "kids mornings",
      "allowed_content": ["series:cartoons"],
      "required_categories": ["cartoons"],
      "excluded_categories": ["horror"],
      "time_windows": [
        {"days": "weekdays", "start_time": "06:00", "end_time": "09:00"}
      ]
    }
  ],
  "repetition": {"min_hours_between_repeats": 48}
}

"days" is "all", "weekdays", "weekends", or a list of weekday names.
"allowed_content" may be "any" when the windows accept everything.
A window whose end_time is not after its start_time crosses midnight.
Omit "repetition" unless the instructions limit repeats. Express only
rules the instructions actually state; when nothing applies, reply
{"content_rules": []}."#;

const SELECTOR_SYSTEM_PROMPT: &str = r#"You pick content for one time slot of a TV channel.

Choose from the eligible items only. Reply with ONLY a JSON object:
{"content_ref": "<item id>", "selection_mode": "specific", "confidence": 0.9, "rationale": "<one line>"}

To schedule a rotating pick instead of a single item, omit "content_ref"
and set "selection_mode" to "random" or "sequential" together with
"category_filters". If nothing eligible suits the span, reply:
{"no_suitable_content": true, "reason": "<one line>"}"#;

const PROPOSER_SYSTEM_PROMPT: &str = r#"You drive an automated TV scheduler, one step per reply.

From the state you receive, pick the single most useful next step and
reply with ONLY a JSON object {"action": "<name>", "arguments": {...}}.

Available actions:
- "parse_constraints", no arguments: turn the user's instructions into
  rules. Do this first whenever instructions exist and are not parsed.
- "identify_gaps", no arguments: refresh the unfilled-interval analysis.
- "select_content", arguments {"start": "...", "end": "...", "hint": "..."}
  (hint optional): have content picked and placed for one open span.
- "fill_slot", arguments {"start": "...", "end": "...", "content_ref": "..."}:
  place a slot you have already decided on.
- "check_violations", no arguments: re-check the schedule against the rules.
- "evaluate_quality", no arguments: refresh the quality report.
- {"action": "finish", "reason": "<one line>"}: stop when the window is
  filled and checked, or when no further step would help.

Timestamps are "YYYY-MM-DDTHH:MM:SS". Work on spans the gap analysis
reports; never invent spans outside the window."#;

const SCORER_SYSTEM_PROMPT: &str = r#"You grade a finished TV schedule on the named criteria.

Reply with ONLY a JSON object mapping every criterion to a number from
0.0 (poor) to 1.0 (excellent), e.g. {"variety": 0.8, "flow": 0.65}."#;

// ── The capability bundle ───────────────────────────────────────────

/// All four engine capabilities over one chat provider.
pub struct LlmCapabilities {
    provider: Box<dyn ChatProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmCapabilities {
    pub fn new(provider: Box<dyn ChatProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    /// Build from config, creating the provider the config names.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let provider = create_provider(&config.llm, &config.ollama)?;
        Ok(Self::new(
            provider,
            config.llm.temperature,
            config.llm.max_tokens,
        ))
    }

    /// Wire this instance into all four capability slots of a runner.
    pub fn into_capabilities(self) -> Capabilities {
        let shared = Arc::new(self);
        Capabilities {
            parser: shared.clone(),
            selector: shared.clone(),
            proposer: shared.clone(),
            scorer: shared,
        }
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, CapabilityError> {
        let messages = [Message::system(system), Message::user(user)];
        let response = self
            .provider
            .complete(&messages, self.temperature, self.max_tokens)
            .await
            .map_err(capability_error)?;
        debug!(chars = response.len(), "model replied");
        Ok(response)
    }
}

fn capability_error(err: LlmError) -> CapabilityError {
    match err {
        LlmError::NotConfigured(msg) => CapabilityError::NotConfigured(msg),
        LlmError::Malformed(msg) => CapabilityError::Malformed(msg),
        other => CapabilityError::Unavailable(other.to_string()),
    }
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl ConstraintParser for LlmCapabilities {
    async fn parse_constraints(
        &self,
        instructions: &str,
        window: &SchedulingWindow,
    ) -> Result<SchedulingConstraints, CapabilityError> {
        let user = constraint_user_prompt(instructions, window);
        let raw = self.complete(PARSER_SYSTEM_PROMPT, user).await?;
        parse_constraints_reply(&raw)
    }
}

#[async_trait]
impl ContentSelector for LlmCapabilities {
    async fn select_content(
        &self,
        request: SelectionRequest<'_>,
    ) -> Result<SelectionOutcome, CapabilityError> {
        // Nothing to choose from: decline locally, no call spent.
        if request.eligible.is_empty() {
            return Ok(SelectionOutcome::NoSuitableContent {
                reason: "no eligible content for this span".into(),
            });
        }

        let user = selection_user_prompt(&request);
        let raw = self.complete(SELECTOR_SYSTEM_PROMPT, user).await?;
        let outcome = parse_selection_reply(&raw)?;

        if let SelectionOutcome::Chosen(choice) = &outcome {
            if let Some(id) = &choice.content_ref {
                if !request.eligible.iter().any(|item| item.id == *id) {
                    return Err(CapabilityError::Malformed(format!(
                        "model chose '{id}', which is not in the eligible list"
                    )));
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl ActionProposer for LlmCapabilities {
    async fn propose_action(&self, snapshot: &StateSnapshot) -> Result<Proposal, CapabilityError> {
        let state_json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| CapabilityError::Malformed(format!("state serialization: {e}")))?;
        let user = format!("Current state:\n{state_json}\n\nRespond ONLY with the JSON action.");
        let raw = self.complete(PROPOSER_SYSTEM_PROMPT, user).await?;
        parse_proposal_reply(&raw)
    }
}

#[async_trait]
impl SubjectiveScorer for LlmCapabilities {
    async fn score_schedule(
        &self,
        summary: &ScheduleSummary,
        constraints: Option<&SchedulingConstraints>,
        criteria: &[String],
    ) -> Result<IndexMap<String, f64>, CapabilityError> {
        if criteria.is_empty() {
            return Ok(IndexMap::new());
        }
        let summary_json = serde_json::to_string_pretty(summary)
            .map_err(|e| CapabilityError::Malformed(format!("summary serialization: {e}")))?;
        let rules_line = match constraints {
            Some(c) if !c.is_empty() => format!(
                "\nThe schedule was built under {} content rules{}.",
                c.content_rules.len(),
                if c.repetition.is_some() {
                    " and a repetition rule"
                } else {
                    ""
                }
            ),
            _ => String::new(),
        };
        let user = format!(
            "Schedule:\n{summary_json}\n{rules_line}\nCriteria to score: {}.\n\nRespond ONLY with the JSON scores.",
            criteria.join(", ")
        );
        let raw = self.complete(SCORER_SYSTEM_PROMPT, user).await?;
        parse_score_reply(&raw, criteria)
    }
}

// ── User prompt builders ────────────────────────────────────────────

fn constraint_user_prompt(instructions: &str, window: &SchedulingWindow) -> String {
    format!(
        "Scheduling window: {} .. {} ({} days).\n\nInstructions:\n{}\n\nRespond ONLY with the JSON rule set, no explanation.",
        window.start, window.end, window.day_count(), instructions
    )
}

fn selection_user_prompt(request: &SelectionRequest<'_>) -> String {
    const LISTED_ITEMS: usize = 40;

    let minutes = (request.end - request.start).num_minutes();
    let mut lines = vec![format!(
        "Span to fill: {} .. {} ({} minutes). Context: {}.",
        request.start, request.end, minutes, request.context_hint
    )];

    let scheduled = request.schedule.slots_for(request.day);
    if !scheduled.is_empty() {
        lines.push("Already scheduled that day:".into());
        for slot in scheduled {
            lines.push(format!(
                "  {}-{} {}",
                slot.start.time().format("%H:%M"),
                slot.end.time().format("%H:%M"),
                slot.content_ref.as_deref().unwrap_or("(rotating pick)")
            ));
        }
    }

    if let Some(constraints) = request.constraints {
        if !constraints.is_empty() {
            lines.push(format!(
                "{} content rules apply to this schedule; the list below is already filtered to what they allow here.",
                constraints.content_rules.len()
            ));
        }
    }

    lines.push("Eligible items:".into());
    for item in request.eligible.iter().take(LISTED_ITEMS) {
        let duration = item
            .duration_minutes
            .map_or_else(|| "?".into(), |d| d.to_string());
        lines.push(format!(
            "  {}: {} ({} min) [{}]",
            item.id,
            item.title,
            duration,
            item.categories.join(", ")
        ));
    }
    if request.eligible.len() > LISTED_ITEMS {
        lines.push(format!(
            "  ... and {} more",
            request.eligible.len() - LISTED_ITEMS
        ));
    }

    lines.push("\nRespond ONLY with the JSON choice.".into());
    lines.join("\n")
}

// ── Reply parsing ───────────────────────────────────────────────────

fn parse_constraints_reply(raw: &str) -> Result<SchedulingConstraints, CapabilityError> {
    let json = extract_json(raw);
    SchedulingConstraints::from_json_str(json).map_err(|e| {
        CapabilityError::Malformed(format!("constraint reply unusable: {e}; got: {}", snippet(raw)))
    })
}

fn parse_selection_reply(raw: &str) -> Result<SelectionOutcome, CapabilityError> {
    #[derive(Deserialize)]
    struct Decline {
        no_suitable_content: bool,
        #[serde(default)]
        reason: Option<String>,
    }

    let json = extract_json(raw);
    if let Ok(decline) = serde_json::from_str::<Decline>(json) {
        if decline.no_suitable_content {
            return Ok(SelectionOutcome::NoSuitableContent {
                reason: decline
                    .reason
                    .unwrap_or_else(|| "model declined the span".into()),
            });
        }
    }

    let choice: ContentChoice = serde_json::from_str(json).map_err(|e| {
        CapabilityError::Malformed(format!("selection reply unusable: {e}; got: {}", snippet(raw)))
    })?;
    if choice.content_ref.is_none() && choice.category_filters.is_empty() {
        return Err(CapabilityError::Malformed(
            "selection names neither a content_ref nor category_filters".into(),
        ));
    }
    Ok(SelectionOutcome::Chosen(choice))
}

fn parse_proposal_reply(raw: &str) -> Result<Proposal, CapabilityError> {
    #[derive(Deserialize)]
    struct Reply {
        action: String,
        #[serde(default)]
        arguments: Option<Value>,
        #[serde(default)]
        reason: Option<String>,
    }

    let json = extract_json(raw);
    let reply: Reply = serde_json::from_str(json).map_err(|e| {
        CapabilityError::Malformed(format!("proposal reply unusable: {e}; got: {}", snippet(raw)))
    })?;

    if reply.action == "finish" {
        return Ok(Proposal::Finish {
            reason: reply
                .reason
                .unwrap_or_else(|| "proposer chose to finish".into()),
        });
    }
    Action::from_parts(&reply.action, reply.arguments)
        .map(Proposal::Invoke)
        .map_err(|e| CapabilityError::Malformed(format!("unusable action '{}': {e}", reply.action)))
}

fn parse_score_reply(raw: &str, criteria: &[String]) -> Result<IndexMap<String, f64>, CapabilityError> {
    let json = extract_json(raw);
    let value: Value = serde_json::from_str(json).map_err(|e| {
        CapabilityError::Malformed(format!("score reply unusable: {e}; got: {}", snippet(raw)))
    })?;

    // Accept both {"variety": 0.8} and {"scores": {"variety": 0.8}}.
    let map = value
        .get("scores")
        .and_then(Value::as_object)
        .or_else(|| value.as_object())
        .ok_or_else(|| {
            CapabilityError::Malformed(format!("score reply is not an object: {}", snippet(raw)))
        })?;

    let scores: IndexMap<String, f64> = criteria
        .iter()
        .filter_map(|criterion| {
            map.get(criterion)
                .and_then(Value::as_f64)
                .map(|score| (criterion.clone(), score))
        })
        .collect();

    if scores.is_empty() {
        return Err(CapabilityError::Malformed(format!(
            "no scores for the requested criteria in {}",
            snippet(raw)
        )));
    }
    Ok(scores)
}

/// Extract JSON from a model reply, handling markdown code fences.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` blocks, skipping a language tag on the opening line
    if let Some(start) = trimmed.find("```") {
        let json_start = start + 3;
        let after_tick = &trimmed[json_start..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            return after_tick[content_start..content_start + end].trim();
        }
    }

    // raw JSON somewhere in surrounding prose
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

fn snippet(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= 160 {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(160).collect();
        format!("{cut}...")
    }
}
