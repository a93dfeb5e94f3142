//! Constraint schema with tolerant serde deserialization.
//!
//! Constraint JSON is produced by the natural-language parsing capability,
//! so the schema accepts the looseness a model actually emits: `"any"` for
//! an unconstrained content list, day selectors as either a named group or
//! a list of weekday names, times as `HH:MM`. Unknown fields are ignored.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use lineup_core::time::hhmm;

const MINUTES_PER_DAY: i64 = 1440;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("constraint JSON invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("constraint validation failed: {0}")]
    Validation(String),
}

// ── Rule set ────────────────────────────────────────────────────────

/// The full parsed rule set for one run. An empty set is a valid result
/// of parsing ambiguous instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConstraints {
    #[serde(default)]
    pub content_rules: Vec<ContentRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition: Option<RepetitionRule>,
}

impl SchedulingConstraints {
    /// Parse and validate constraint JSON in one step.
    pub fn from_json_str(raw: &str) -> Result<Self, ParseError> {
        let constraints: Self = serde_json::from_str(raw)?;
        constraints.validate()?;
        Ok(constraints)
    }

    pub fn validate(&self) -> Result<(), ParseError> {
        for (idx, rule) in self.content_rules.iter().enumerate() {
            for window in &rule.time_windows {
                if window.start_time == window.end_time {
                    return Err(ParseError::Validation(format!(
                        "{}: time window start equals end ({})",
                        rule.display_label(idx),
                        window.start_time.format("%H:%M"),
                    )));
                }
            }
        }
        if let Some(rep) = &self.repetition {
            if rep.min_hours_between_repeats < 0.0 {
                return Err(ParseError::Validation(format!(
                    "min_hours_between_repeats is negative: {}",
                    rep.min_hours_between_repeats
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.content_rules.is_empty() && self.repetition.is_none()
    }
}

/// Minimum spacing between consecutive airings of the same content,
/// measured from one occurrence's end to the next occurrence's start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionRule {
    pub min_hours_between_repeats: f64,
}

// ── Content rules ───────────────────────────────────────────────────

/// Restricts which content may occupy the time windows it names.
/// A rule with no windows matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Empty means unconstrained (`"any"` on the wire is accepted too).
    #[serde(default, deserialize_with = "de_allowed_content")]
    pub allowed_content: Vec<String>,
    #[serde(default)]
    pub required_categories: Vec<String>,
    #[serde(default)]
    pub excluded_categories: Vec<String>,
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,
}

impl ContentRule {
    /// Does any of this rule's windows fully contain the span?
    pub fn matches_span(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.time_windows.iter().any(|w| w.matches_span(start, end))
    }

    pub fn display_label(&self, index: usize) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("rule {}", index + 1))
    }
}

fn de_allowed_content<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(String),
        Many(Vec<String>),
    }
    match Repr::deserialize(d)? {
        Repr::One(s) if s.eq_ignore_ascii_case("any") => Ok(Vec::new()),
        Repr::One(s) => Ok(vec![s]),
        Repr::Many(list) => Ok(list),
    }
}

// ── Time windows ────────────────────────────────────────────────────

/// A recurring time-of-day window on selected weekdays.
///
/// `end_time <= start_time` means the window crosses midnight, e.g.
/// 22:00..02:00; a span airing after midnight matches against the
/// previous day's window instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub days: DaySelector,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

impl TimeWindow {
    /// Full containment: the span must lie entirely inside the window.
    /// Partial overlap is not a match.
    pub fn matches_span(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if start >= end {
            return false;
        }
        let day = start.date();
        let span_start = minute_of(start.time());
        let duration = (end - start).num_minutes();
        let (w_start, w_end) = self.extended_bounds();

        if self.days.matches(day.weekday())
            && span_start >= w_start
            && span_start + duration <= w_end
        {
            return true;
        }
        // The previous day's instance of a midnight-crossing window.
        if let Some(prev) = day.pred_opt() {
            if self.days.matches(prev.weekday()) {
                let shifted = span_start + MINUTES_PER_DAY;
                if shifted >= w_start && shifted + duration <= w_end {
                    return true;
                }
            }
        }
        false
    }

    fn extended_bounds(&self) -> (i64, i64) {
        let w_start = minute_of(self.start_time);
        let mut w_end = minute_of(self.end_time);
        if w_end <= w_start {
            w_end += MINUTES_PER_DAY;
        }
        (w_start, w_end)
    }
}

fn minute_of(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

// ── Day selectors ───────────────────────────────────────────────────

/// Which weekdays a time window applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DaySelector {
    #[default]
    All,
    Weekdays,
    Weekends,
    Days(Vec<Weekday>),
}

impl DaySelector {
    pub fn matches(&self, weekday: Weekday) -> bool {
        match self {
            DaySelector::All => true,
            DaySelector::Weekdays => !matches!(weekday, Weekday::Sat | Weekday::Sun),
            DaySelector::Weekends => matches!(weekday, Weekday::Sat | Weekday::Sun),
            DaySelector::Days(days) => days.contains(&weekday),
        }
    }
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

impl Serialize for DaySelector {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            DaySelector::All => s.serialize_str("all"),
            DaySelector::Weekdays => s.serialize_str("weekdays"),
            DaySelector::Weekends => s.serialize_str("weekends"),
            DaySelector::Days(days) => s.collect_seq(days.iter().map(|d| day_name(*d))),
        }
    }
}

impl<'de> Deserialize<'de> for DaySelector {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Named(String),
            Listed(Vec<String>),
        }

        let parse_day = |raw: &str| -> Result<Weekday, D::Error> {
            raw.parse::<Weekday>()
                .map_err(|_| serde::de::Error::custom(format!("unknown weekday '{raw}'")))
        };

        match Repr::deserialize(d)? {
            Repr::Named(name) => match name.to_ascii_lowercase().as_str() {
                "all" | "any" => Ok(DaySelector::All),
                "weekdays" => Ok(DaySelector::Weekdays),
                "weekends" => Ok(DaySelector::Weekends),
                other => Ok(DaySelector::Days(vec![parse_day(other)?])),
            },
            Repr::Listed(names) => {
                let mut days = names
                    .iter()
                    .map(|n| parse_day(n))
                    .collect::<Result<Vec<_>, _>>()?;
                days.sort_by_key(|d| d.num_days_from_monday());
                days.dedup();
                Ok(DaySelector::Days(days))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn window(days: DaySelector, start: &str, end: &str) -> TimeWindow {
        TimeWindow {
            days,
            start_time: lineup_core::time::parse_time(start).unwrap(),
            end_time: lineup_core::time::parse_time(end).unwrap(),
        }
    }

    #[test]
    fn day_selector_wire_forms() {
        let all: DaySelector = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(all, DaySelector::All);

        let weekends: DaySelector = serde_json::from_str(r#""weekends""#).unwrap();
        assert!(weekends.matches(Weekday::Sat));
        assert!(!weekends.matches(Weekday::Wed));

        let listed: DaySelector = serde_json::from_str(r#"["friday", "mon", "friday"]"#).unwrap();
        assert_eq!(listed, DaySelector::Days(vec![Weekday::Mon, Weekday::Fri]));

        let single: DaySelector = serde_json::from_str(r#""saturday""#).unwrap();
        assert_eq!(single, DaySelector::Days(vec![Weekday::Sat]));

        assert!(serde_json::from_str::<DaySelector>(r#""someday""#).is_err());
    }

    #[test]
    fn day_selector_round_trip() {
        let sel = DaySelector::Days(vec![Weekday::Mon, Weekday::Fri]);
        let json = serde_json::to_string(&sel).unwrap();
        assert_eq!(json, r#"["monday","friday"]"#);
        assert_eq!(serde_json::from_str::<DaySelector>(&json).unwrap(), sel);
    }

    #[test]
    fn allowed_content_accepts_any() {
        let rule: ContentRule =
            serde_json::from_str(r#"{"allowed_content": "any", "time_windows": []}"#).unwrap();
        assert!(rule.allowed_content.is_empty());

        let rule: ContentRule =
            serde_json::from_str(r#"{"allowed_content": ["series:news"]}"#).unwrap();
        assert_eq!(rule.allowed_content, ["series:news"]);
    }

    #[test]
    fn full_containment_required() {
        // 2026-02-02 is a Monday
        let w = window(DaySelector::All, "17:00", "22:00");
        assert!(w.matches_span(dt("2026-02-02T17:00:00"), dt("2026-02-02T22:00:00")));
        assert!(w.matches_span(dt("2026-02-02T18:00:00"), dt("2026-02-02T19:00:00")));
        // straddles the window start: partial overlap is not a match
        assert!(!w.matches_span(dt("2026-02-02T16:30:00"), dt("2026-02-02T18:00:00")));
        assert!(!w.matches_span(dt("2026-02-02T21:00:00"), dt("2026-02-02T22:30:00")));
    }

    #[test]
    fn midnight_crossing_window() {
        // Friday 22:00 .. Saturday 02:00; 2026-02-06 is a Friday
        let w = window(DaySelector::Days(vec![Weekday::Fri]), "22:00", "02:00");
        assert!(w.matches_span(dt("2026-02-06T23:00:00"), dt("2026-02-07T01:00:00")));
        // early Saturday belongs to Friday's window instance
        assert!(w.matches_span(dt("2026-02-07T00:30:00"), dt("2026-02-07T01:30:00")));
        // Saturday evening does not
        assert!(!w.matches_span(dt("2026-02-07T23:00:00"), dt("2026-02-07T23:30:00")));
        // before the window opens
        assert!(!w.matches_span(dt("2026-02-06T21:00:00"), dt("2026-02-06T23:00:00")));
    }

    #[test]
    fn weekday_selector_on_window() {
        let w = window(DaySelector::Weekdays, "06:00", "12:00");
        // Sunday morning
        assert!(!w.matches_span(dt("2026-02-01T08:00:00"), dt("2026-02-01T09:00:00")));
        // Monday morning
        assert!(w.matches_span(dt("2026-02-02T08:00:00"), dt("2026-02-02T09:00:00")));
    }

    #[test]
    fn constraints_parse_and_validate() {
        let raw = r#"{
            "content_rules": [
                {
                    "label": "kids mornings",
                    "required_categories": ["cartoons"],
                    "excluded_categories": ["horror"],
                    "time_windows": [
                        {"days": "weekdays", "start_time": "06:00", "end_time": "09:00"}
                    ],
                    "confidence": 0.92
                }
            ],
            "repetition": {"min_hours_between_repeats": 48}
        }"#;
        let constraints = SchedulingConstraints::from_json_str(raw).unwrap();
        assert_eq!(constraints.content_rules.len(), 1);
        assert_eq!(
            constraints
                .repetition
                .as_ref()
                .unwrap()
                .min_hours_between_repeats,
            48.0
        );
        assert!(!constraints.is_empty());
    }

    #[test]
    fn degenerate_window_rejected() {
        let raw = r#"{
            "content_rules": [
                {"time_windows": [{"start_time": "06:00", "end_time": "06:00"}]}
            ]
        }"#;
        assert!(matches!(
            SchedulingConstraints::from_json_str(raw),
            Err(ParseError::Validation(_))
        ));
    }

    #[test]
    fn negative_repeat_interval_rejected() {
        let raw = r#"{"repetition": {"min_hours_between_repeats": -1}}"#;
        assert!(SchedulingConstraints::from_json_str(raw).is_err());
    }
}
