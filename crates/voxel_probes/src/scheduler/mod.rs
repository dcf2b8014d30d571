//! Probe update scheduling: which dirty slots get traced this frame.

pub mod budget;
pub mod priority;
pub mod schedule;

pub use budget::UpdateBudget;
pub use priority::PriorityClass;
pub use schedule::{ProbeUpdateScheduler, ScheduleStats, ScheduledSlot};
