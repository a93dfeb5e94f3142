//! Day-keyed slot storage with a single validated mutation path.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{InitError, SlotError};
use crate::slot::{SlotId, TimeSlot};
use crate::time::SchedulingWindow;

/// Identities of slots that were present before the run started.
/// Computed once at initialization, never mutated afterwards.
pub type ImmutableSet = BTreeSet<SlotId>;

/// Calendar date → slots sorted ascending by start, overlap-free.
///
/// Every insertion goes through [`DaySchedule::fill`]; there is no other
/// mutation path, which is what makes the no-overlap and immutability
/// invariants enforceable rather than a caller convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DaySchedule {
    days: BTreeMap<NaiveDate, Vec<TimeSlot>>,
}

impl DaySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lift the request's pre-existing slots into a schedule and the
    /// immutable identity set. Invalid or mutually overlapping slots are
    /// fatal: the run never starts on a corrupt seed.
    pub fn from_daily_slots(slots: Vec<TimeSlot>) -> Result<(Self, ImmutableSet), InitError> {
        for slot in &slots {
            if slot.start >= slot.end {
                return Err(InitError::InvalidImmutableSlot {
                    start: slot.start,
                    end: slot.end,
                });
            }
        }

        let mut ordered: Vec<TimeSlot> = slots;
        ordered.sort_by_key(|s| s.start);

        // Chronological sweep catches same-day and cross-midnight overlap alike.
        let mut reach: Option<(chrono::NaiveDateTime, chrono::NaiveDateTime)> = None;
        for slot in &ordered {
            if let Some((prev_start, prev_end)) = reach {
                if slot.start < prev_end {
                    return Err(InitError::ImmutableOverlap {
                        day: slot.day(),
                        first_start: prev_start,
                        second_start: slot.start,
                    });
                }
            }
            if reach.map_or(true, |(_, end)| slot.end > end) {
                reach = Some((slot.start, slot.end));
            }
        }

        let mut schedule = Self::new();
        let mut immutable = ImmutableSet::new();
        for slot in ordered {
            immutable.insert(slot.id());
            schedule.days.entry(slot.day()).or_default().push(slot);
        }
        Ok((schedule, immutable))
    }

    /// Insert a slot, rejecting overlaps and immutable-identity collisions.
    /// On failure the schedule is left exactly as it was.
    pub fn fill(&mut self, slot: TimeSlot, immutable: &ImmutableSet) -> Result<(), SlotError> {
        slot.validate()?;
        if immutable.contains(&slot.id()) {
            return Err(SlotError::ImmutableSlot(slot.id()));
        }
        if let Some(existing) = self.find_overlap(&slot) {
            return Err(SlotError::Overlap {
                new_start: slot.start,
                new_end: slot.end,
                existing_start: existing.start,
                existing_end: existing.end,
            });
        }
        let day_slots = self.days.entry(slot.day()).or_default();
        day_slots.push(slot);
        day_slots.sort_by_key(|s| s.start);
        Ok(())
    }

    /// First stored slot overlapping the candidate. Slots are keyed by the
    /// day they start on, so a previous day's slot running past midnight is
    /// still found by scanning every day up to the candidate's end.
    fn find_overlap(&self, slot: &TimeSlot) -> Option<&TimeSlot> {
        let last_day = slot.end.date();
        self.days
            .range(..=last_day)
            .flat_map(|(_, day_slots)| day_slots)
            .find(|existing| existing.overlaps(slot))
    }

    pub fn slots_for(&self, day: NaiveDate) -> &[TimeSlot] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All slots in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = &TimeSlot> {
        self.days.values().flatten()
    }

    pub fn flatten(&self) -> Vec<TimeSlot> {
        self.iter().cloned().collect()
    }

    pub fn slot_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }

    /// Scheduled minutes that fall inside the window. Exact because the
    /// fill path guarantees stored slots never overlap each other.
    pub fn filled_minutes_within(&self, window: &SchedulingWindow) -> i64 {
        self.iter()
            .map(|s| window.clip_minutes(s.start, s.end))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn slot(start: &str, end: &str, content: &str) -> TimeSlot {
        TimeSlot::new(dt(start), dt(end), Some(content.to_string())).unwrap()
    }

    #[test]
    fn fills_stay_sorted() {
        let mut sched = DaySchedule::new();
        let none = ImmutableSet::new();
        sched
            .fill(slot("2026-02-01T12:00:00", "2026-02-01T13:00:00", "b"), &none)
            .unwrap();
        sched
            .fill(slot("2026-02-01T06:00:00", "2026-02-01T07:00:00", "a"), &none)
            .unwrap();
        let starts: Vec<_> = sched.iter().map(|s| s.start).collect();
        assert_eq!(
            starts,
            vec![dt("2026-02-01T06:00:00"), dt("2026-02-01T12:00:00")]
        );
    }

    #[test]
    fn overlap_rejected_and_schedule_unchanged() {
        let (mut sched, immutable) = DaySchedule::from_daily_slots(vec![
            slot("2026-02-01T17:00:00", "2026-02-01T18:00:00", "news"),
            slot("2026-02-01T18:00:00", "2026-02-01T19:00:00", "weather"),
        ])
        .unwrap();

        let before = sched.clone();
        let err = sched
            .fill(
                slot("2026-02-01T17:30:00", "2026-02-01T18:30:00", "movie"),
                &immutable,
            )
            .unwrap_err();

        match err {
            SlotError::Overlap { existing_start, .. } => {
                assert_eq!(existing_start, dt("2026-02-01T17:00:00"));
            }
            other => panic!("expected overlap, got {other:?}"),
        }
        assert_eq!(sched, before);
    }

    #[test]
    fn touching_endpoints_are_legal() {
        let mut sched = DaySchedule::new();
        let none = ImmutableSet::new();
        sched
            .fill(slot("2026-02-01T06:00:00", "2026-02-01T08:00:00", "a"), &none)
            .unwrap();
        sched
            .fill(slot("2026-02-01T08:00:00", "2026-02-01T09:00:00", "b"), &none)
            .unwrap();
        assert_eq!(sched.slot_count(), 2);
    }

    #[test]
    fn immutable_identity_cannot_be_refilled() {
        let (mut sched, immutable) = DaySchedule::from_daily_slots(vec![slot(
            "2026-02-01T17:00:00",
            "2026-02-01T18:00:00",
            "news",
        )])
        .unwrap();

        // Same (day, start) identity, different content and length.
        let err = sched
            .fill(
                slot("2026-02-01T17:00:00", "2026-02-01T17:30:00", "other"),
                &immutable,
            )
            .unwrap_err();
        assert!(matches!(err, SlotError::ImmutableSlot(_)));
    }

    #[test]
    fn cross_midnight_overlap_detected() {
        let mut sched = DaySchedule::new();
        let none = ImmutableSet::new();
        sched
            .fill(
                slot("2026-02-01T23:00:00", "2026-02-02T02:00:00", "movie"),
                &none,
            )
            .unwrap();
        let err = sched
            .fill(
                slot("2026-02-02T00:30:00", "2026-02-02T01:30:00", "short"),
                &none,
            )
            .unwrap_err();
        assert!(matches!(err, SlotError::Overlap { .. }));
    }

    #[test]
    fn overlapping_daily_slots_are_fatal() {
        let err = DaySchedule::from_daily_slots(vec![
            slot("2026-02-01T17:00:00", "2026-02-01T19:00:00", "a"),
            slot("2026-02-01T18:00:00", "2026-02-01T20:00:00", "b"),
        ])
        .unwrap_err();
        assert!(matches!(err, InitError::ImmutableOverlap { .. }));
    }

    #[test]
    fn degenerate_daily_slot_is_fatal() {
        let bad = TimeSlot {
            start: dt("2026-02-01T17:00:00"),
            end: dt("2026-02-01T17:00:00"),
            content_ref: None,
            selection_mode: Default::default(),
            category_filters: vec![],
            notes: vec![],
        };
        assert!(matches!(
            DaySchedule::from_daily_slots(vec![bad]),
            Err(InitError::InvalidImmutableSlot { .. })
        ));
    }

    #[test]
    fn filled_minutes_clip_to_window() {
        let window =
            SchedulingWindow::new(dt("2026-02-01T08:00:00"), dt("2026-02-01T22:00:00")).unwrap();
        let (sched, _) = DaySchedule::from_daily_slots(vec![
            // hangs off the front of the window
            slot("2026-02-01T07:00:00", "2026-02-01T09:00:00", "early"),
            slot("2026-02-01T12:00:00", "2026-02-01T13:00:00", "noon"),
        ])
        .unwrap();
        assert_eq!(sched.filled_minutes_within(&window), 60 + 60);
    }
}
