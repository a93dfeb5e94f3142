pub mod config;
pub mod error;
pub mod gaps;
pub mod media;
pub mod schedule;
pub mod slot;
pub mod time;

pub use config::Config;
pub use error::*;
pub use gaps::{find_gaps, Gap, GapBoundary};
pub use media::{Channel, ContentCatalog, MediaItem};
pub use schedule::{DaySchedule, ImmutableSet};
pub use slot::{SelectionMode, SlotId, TimeSlot};
pub use time::SchedulingWindow;
