//! Window bounds, day clipping, and time-of-day helpers.
//!
//! All intervals in this crate are half-open `[start, end)`. Timestamps are
//! naive local datetimes: a broadcast channel schedules against its own wall
//! clock and never crosses zones mid-window.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::InitError;

// ── Scheduling window ───────────────────────────────────────────────

/// The half-open span of time a run must tile with slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SchedulingWindow {
    /// Build a validated window. Empty or inverted bounds are fatal:
    /// there is nothing meaningful to schedule into.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, InitError> {
        if start >= end {
            return Err(InitError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn total_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Number of calendar days the window touches.
    pub fn day_count(&self) -> i64 {
        (self.last_day() - self.start.date()).num_days() + 1
    }

    /// Calendar days intersecting the window, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.start.date().iter_days().take_while(move |d| *d <= last)
    }

    /// The window clipped to one calendar day, or `None` when the day lies
    /// outside the window.
    pub fn day_span(&self, day: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let day_start = day.and_time(NaiveTime::MIN);
        let day_end = day.succ_opt()?.and_time(NaiveTime::MIN);
        let lo = self.start.max(day_start);
        let hi = self.end.min(day_end);
        (lo < hi).then_some((lo, hi))
    }

    /// Minutes of `[start, end)` that fall inside the window.
    pub fn clip_minutes(&self, start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        let lo = start.max(self.start);
        let hi = end.min(self.end);
        if lo < hi {
            (hi - lo).num_minutes()
        } else {
            0
        }
    }

    fn last_day(&self) -> NaiveDate {
        // A window ending exactly at midnight does not touch the end date.
        if self.end.time() == NaiveTime::MIN {
            self.end.date().pred_opt().unwrap_or(self.end.date())
        } else {
            self.end.date()
        }
    }
}

/// Half-open interval overlap: touching endpoints do not overlap.
pub fn spans_overlap(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

// ── Day-part classification ─────────────────────────────────────────

/// Fixed mapping from hour-of-day to a named day part.
///
/// morning 06:00..12:00, afternoon 12:00..17:00, evening 17:00..22:00,
/// late night 22:00..06:00.
pub fn daypart(hour: u32) -> &'static str {
    match hour {
        6..=11 => "morning",
        12..=16 => "afternoon",
        17..=21 => "evening",
        _ => "late night",
    }
}

/// Human-readable placement hint for a point in time, e.g. "Weekend morning".
pub fn context_hint(at: NaiveDateTime) -> String {
    let kind = if matches!(at.weekday(), Weekday::Sat | Weekday::Sun) {
        "Weekend"
    } else {
        "Weekday"
    };
    format!("{} {}", kind, daypart(at.hour()))
}

// ── Time-of-day parsing ─────────────────────────────────────────────

/// Parse a time of day from `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("invalid time of day '{raw}': {e}"))
}

/// Serde adapter for a single `NaiveTime` field in `HH:MM` form.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Vec<NaiveTime>` fields in `HH:MM` form.
pub mod hhmm_list {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], s: S) -> Result<S::Ok, S::Error> {
        let rendered: Vec<String> = times.iter().map(|t| t.format("%H:%M").to_string()).collect();
        s.collect_seq(rendered)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveTime>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(d)?;
        raw.iter()
            .map(|r| super::parse_time(r).map_err(serde::de::Error::custom))
            .collect()
    }
}
