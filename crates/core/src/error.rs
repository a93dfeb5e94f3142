use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::slot::SlotId;

/// Fatal request-validation errors. A run aborts before the state machine
/// starts when one of these is raised; everything else is absorbed mid-run.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("scheduling window is empty or inverted: {start} .. {end}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("pre-existing slot has end {end} not after start {start}")]
    InvalidImmutableSlot {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("pre-existing slots overlap on {day}: {first_start} and {second_start}")]
    ImmutableOverlap {
        day: NaiveDate,
        first_start: NaiveDateTime,
        second_start: NaiveDateTime,
    },
}

/// Recoverable slot-placement errors raised by the single mutation path.
#[derive(Error, Debug)]
pub enum SlotError {
    #[error("slot end {end} is not after start {start}")]
    EmptySlot {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("slot {new_start} .. {new_end} overlaps existing slot {existing_start} .. {existing_end}")]
    Overlap {
        new_start: NaiveDateTime,
        new_end: NaiveDateTime,
        existing_start: NaiveDateTime,
        existing_end: NaiveDateTime,
    },

    #[error("slot at {0} is immutable and cannot be replaced")]
    ImmutableSlot(SlotId),
}
