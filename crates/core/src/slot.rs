//! Slot records and their identity for immutability tracking.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::SlotError;
use crate::time::spans_overlap;

/// How the content for a slot was (or should be) chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// A concrete content reference picked for this exact slot.
    #[default]
    Specific,
    /// Any item matching the slot's category filters.
    Random,
    /// Next unplayed item in a series or category rotation.
    Sequential,
}

/// One contiguous interval of airtime assigned to content.
///
/// A slot belongs to the calendar day of its `start`; a slot may run past
/// midnight and still count as one record on that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    #[serde(default)]
    pub selection_mode: SelectionMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl TimeSlot {
    /// Build a validated slot. `start >= end` is rejected.
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        content_ref: Option<String>,
    ) -> Result<Self, SlotError> {
        if start >= end {
            return Err(SlotError::EmptySlot { start, end });
        }
        Ok(Self {
            start,
            end,
            content_ref,
            selection_mode: SelectionMode::default(),
            category_filters: Vec::new(),
            notes: Vec::new(),
        })
    }

    /// Re-check the interval invariant on a deserialized slot.
    pub fn validate(&self) -> Result<(), SlotError> {
        if self.start >= self.end {
            return Err(SlotError::EmptySlot {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn day(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn id(&self) -> SlotId {
        SlotId {
            day: self.day(),
            start: self.start,
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        spans_overlap(self.start, self.end, other.start, other.end)
    }
}

/// Identity of a slot for immutability tracking: `(day, start)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SlotId {
    pub day: NaiveDate,
    pub start: NaiveDateTime,
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.day, self.start.time().format("%H:%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn slot_rejects_empty_interval() {
        let at = dt("2026-02-01T08:00:00");
        assert!(matches!(
            TimeSlot::new(at, at, None),
            Err(SlotError::EmptySlot { .. })
        ));
    }

    #[test]
    fn midnight_spanner_belongs_to_start_day() {
        let slot = TimeSlot::new(
            dt("2026-02-01T23:00:00"),
            dt("2026-02-02T02:00:00"),
            Some("movie:alien".into()),
        )
        .unwrap();
        assert_eq!(slot.day(), slot.start.date());
        assert_eq!(slot.duration_minutes(), 180);
    }

    #[test]
    fn adjacent_slots_do_not_overlap() {
        let a = TimeSlot::new(dt("2026-02-01T06:00:00"), dt("2026-02-01T08:00:00"), None).unwrap();
        let b = TimeSlot::new(dt("2026-02-01T08:00:00"), dt("2026-02-01T09:00:00"), None).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn selection_mode_snake_case_wire_form() {
        let slot = TimeSlot {
            start: dt("2026-02-01T06:00:00"),
            end: dt("2026-02-01T07:00:00"),
            content_ref: None,
            selection_mode: SelectionMode::Random,
            category_filters: vec!["cartoons".into()],
            notes: vec![],
        };
        let v = serde_json::to_value(&slot).unwrap();
        assert_eq!(v["selection_mode"], "random");
        assert!(v.get("content_ref").is_none());
    }
}
