//! Gap detection: the complement of the schedule within a window.
//!
//! Gaps are computed views, regenerated on demand and never stored as
//! authoritative state. Together with the window-clipped slots they tile
//! `[window.start, window.end)` exactly.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schedule::DaySchedule;
use crate::time::{context_hint, SchedulingWindow};

/// An unfilled interval, with advisory fill suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub day: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
    /// Sub-intervals cut at preferred boundaries; the whole gap when no
    /// boundary falls strictly inside. Advisory only.
    pub suggested: Vec<GapBoundary>,
    /// Placement context for content selection, e.g. "Weekday evening".
    pub context_hint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapBoundary {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Sweep each calendar day of the window and report unfilled intervals,
/// ordered by day then start. Side-effect free; empty when fully scheduled.
pub fn find_gaps(
    schedule: &DaySchedule,
    window: &SchedulingWindow,
    preferred: &[NaiveTime],
) -> Vec<Gap> {
    let mut cuts: Vec<NaiveTime> = preferred.to_vec();
    cuts.sort();
    cuts.dedup();

    let busy = busy_by_day(schedule);
    let mut gaps = Vec::new();

    for day in window.days() {
        let Some((day_start, day_end)) = window.day_span(day) else {
            continue;
        };
        let mut cursor = day_start;
        for &(busy_start, busy_end) in busy.get(&day).map(Vec::as_slice).unwrap_or(&[]) {
            if busy_end <= cursor {
                continue;
            }
            if busy_start >= day_end {
                break;
            }
            if busy_start > cursor {
                push_gap(&mut gaps, day, cursor, busy_start.min(day_end), &cuts);
            }
            cursor = cursor.max(busy_end);
            if cursor >= day_end {
                break;
            }
        }
        if cursor < day_end {
            push_gap(&mut gaps, day, cursor, day_end, &cuts);
        }
    }

    gaps
}

/// Per-day busy intervals. A slot spanning midnight contributes a clipped
/// interval to every day it touches; the stored record is never split.
fn busy_by_day(
    schedule: &DaySchedule,
) -> BTreeMap<NaiveDate, Vec<(NaiveDateTime, NaiveDateTime)>> {
    let mut busy: BTreeMap<NaiveDate, Vec<(NaiveDateTime, NaiveDateTime)>> = BTreeMap::new();
    for slot in schedule.iter() {
        let mut day = slot.start.date();
        loop {
            let Some(next) = day.succ_opt() else { break };
            let day_lo = day.and_time(NaiveTime::MIN);
            let day_hi = next.and_time(NaiveTime::MIN);
            let lo = slot.start.max(day_lo);
            let hi = slot.end.min(day_hi);
            if lo < hi {
                busy.entry(day).or_default().push((lo, hi));
            }
            if slot.end <= day_hi {
                break;
            }
            day = next;
        }
    }
    for intervals in busy.values_mut() {
        intervals.sort();
    }
    busy
}

fn push_gap(
    gaps: &mut Vec<Gap>,
    day: NaiveDate,
    start: NaiveDateTime,
    end: NaiveDateTime,
    cuts: &[NaiveTime],
) {
    let mut bounds = vec![start];
    for &t in cuts {
        let cut = day.and_time(t);
        // Strictly inside only: a cut at a gap edge would suggest a
        // zero-length interval.
        if cut > start && cut < end {
            bounds.push(cut);
        }
    }
    bounds.push(end);

    let suggested = bounds
        .windows(2)
        .map(|pair| GapBoundary {
            start: pair[0],
            end: pair[1],
        })
        .collect();

    gaps.push(Gap {
        day,
        start,
        end,
        duration_minutes: (end - start).num_minutes(),
        suggested,
        context_hint: context_hint(start),
    });
}
