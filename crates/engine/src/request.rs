//! The run's outer surface: what a caller submits and what comes back.
//!
//! Requests are hand-authored (files, API payloads), so unknown fields are
//! rejected here; the tolerant parsing lives in the constraint schema, where
//! the producer is a model.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use lineup_core::time::{hhmm, hhmm_list};
use lineup_core::{Channel, InitError, MediaItem, SchedulingWindow, TimeSlot};
use lineup_rules::SchedulingConstraints;

use crate::cost::{CostBreakdown, CostTier};
use crate::quality::QualityReport;
use crate::state::CompletionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleRequest {
    pub channel: Channel,
    /// The content library this run may schedule from.
    #[serde(default)]
    pub media: Vec<MediaItem>,
    pub start_date: NaiveDate,
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Broadcast day opens at this time of day.
    #[serde(default = "default_day_start", with = "hhmm")]
    pub day_start: NaiveTime,
    /// Broadcast day closes this many hours after midnight of the last
    /// calendar day; values >= 24 spill into the following day (26 = 02:00).
    #[serde(default = "default_day_end_hour")]
    pub day_end_hour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_instructions: Option<String>,
    /// Times of day gaps should preferably be cut at, e.g. program junctions.
    #[serde(default, with = "hhmm_list")]
    pub preferred_boundaries: Vec<NaiveTime>,
    /// Pre-existing slots; immutable for the whole run.
    #[serde(default)]
    pub daily_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub cost_tier: CostTier,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,
    /// Subjective dimensions the scorer is asked for.
    #[serde(default = "default_evaluation_criteria")]
    pub evaluation_criteria: Vec<String>,
}

fn default_window_days() -> u32 {
    30
}

fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(6, 0, 0).expect("06:00 is a valid time")
}

fn default_day_end_hour() -> u32 {
    26
}

fn default_max_iterations() -> u32 {
    5
}

fn default_quality_threshold() -> f64 {
    0.7
}

fn default_evaluation_criteria() -> Vec<String> {
    vec!["variety".to_string(), "flow".to_string()]
}

impl ScheduleRequest {
    /// The window this request asks to have tiled. `window_days = 0` or a
    /// day-end before the day-start collapses the window, which
    /// `SchedulingWindow::new` rejects.
    pub fn window(&self) -> Result<SchedulingWindow, InitError> {
        let start = self.start_date.and_time(self.day_start);
        let last_day = self.start_date + Duration::days(i64::from(self.window_days) - 1);
        let end = last_day.and_time(NaiveTime::MIN) + Duration::hours(i64::from(self.day_end_hour));
        SchedulingWindow::new(start, end)
    }
}

/// What every run returns, complete or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    /// One-paragraph human summary of how the run went.
    pub overview: String,
    /// The full schedule, flattened chronologically. Immutable request
    /// slots appear here unchanged.
    pub slots: Vec<TimeSlot>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_iterations: u32,
    pub completion_status: CompletionStatus,
    /// The tail of the decision trail, rendered for humans.
    pub key_decisions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints_applied: Option<SchedulingConstraints>,
    pub unfilled_minutes: i64,
    pub open_gaps: usize,
    pub quality: QualityReport,
    pub cost: CostBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_request_gets_defaults() {
        let request: ScheduleRequest = serde_json::from_value(json!({
            "channel": {"name": "Retro TV"},
            "start_date": "2026-02-01",
        }))
        .unwrap();

        assert_eq!(request.window_days, 30);
        assert_eq!(request.day_start, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert_eq!(request.day_end_hour, 26);
        assert_eq!(request.max_iterations, 5);
        assert_eq!(request.quality_threshold, 0.7);
        assert_eq!(request.cost_tier, CostTier::Balanced);
        assert_eq!(request.evaluation_criteria, ["variety", "flow"]);
        assert!(request.daily_slots.is_empty());
    }

    #[test]
    fn broadcast_day_window_spills_past_midnight() {
        let request: ScheduleRequest = serde_json::from_value(json!({
            "channel": {"name": "Retro TV"},
            "start_date": "2026-02-01",
            "window_days": 1,
        }))
        .unwrap();

        let window = request.window().unwrap();
        assert_eq!(
            window.start,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap().and_hms_opt(6, 0, 0).unwrap()
        );
        assert_eq!(
            window.end,
            NaiveDate::from_ymd_opt(2026, 2, 2).unwrap().and_hms_opt(2, 0, 0).unwrap()
        );
        assert_eq!(window.total_minutes(), 1200);
    }

    #[test]
    fn same_day_close_stays_on_the_last_day() {
        let request: ScheduleRequest = serde_json::from_value(json!({
            "channel": {"name": "Retro TV"},
            "start_date": "2026-02-01",
            "window_days": 3,
            "day_start": "08:00",
            "day_end_hour": 22,
        }))
        .unwrap();

        let window = request.window().unwrap();
        assert_eq!(
            window.end,
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap().and_hms_opt(22, 0, 0).unwrap()
        );
    }

    #[test]
    fn zero_day_window_is_rejected() {
        let request: ScheduleRequest = serde_json::from_value(json!({
            "channel": {"name": "Retro TV"},
            "start_date": "2026-02-01",
            "window_days": 0,
        }))
        .unwrap();
        assert!(matches!(
            request.window(),
            Err(InitError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn unknown_request_fields_are_rejected() {
        let result: Result<ScheduleRequest, _> = serde_json::from_value(json!({
            "channel": {"name": "Retro TV"},
            "start_date": "2026-02-01",
            "windowdays": 7,
        }));
        assert!(result.is_err());
    }
}
