//! Budgeted, deterministic selection of dirty probe slots.
//!
//! # Ordering
//!
//! ```text
//!   key = (priority class, level, storage.x, storage.y, storage.z)
//!
//!   Starved ─► NearRefresh ─► Invalidated ─► Streaming
//!   within a class: lexicographic over (L, x, y, z)
//! ```
//!
//! The key never involves insertion order or handle identity, so the same
//! dirty set always yields the same selection. A slot that keeps losing to
//! higher classes is promoted to `Starved` after `starvation_frames`, which
//! bounds its wait by roughly `|dirty| / B` frames.

use crate::cache::{DirtySlot, SlotRef};

use super::budget::UpdateBudget;
use super::priority::PriorityClass;

/// A slot chosen for tracing this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledSlot {
	pub slot: SlotRef,
	pub class: PriorityClass,
}

/// Statistics from one scheduling pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleStats {
	/// Eligible dirty slots offered.
	pub dirty: usize,
	pub selected: usize,
	/// Eligible slots left for later frames.
	pub deferred: usize,
	/// Starved slots among the offered ones.
	pub starved: usize,
}

type SortKey = (PriorityClass, u32, u32, u32, u32);

#[inline]
fn sort_key(entry: &ScheduledSlot) -> SortKey {
	let s = entry.slot;
	(entry.class, s.level, s.storage.x, s.storage.y, s.storage.z)
}

/// Picks `min(B, |eligible|)` slots per frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeUpdateScheduler {
	budget: UpdateBudget,
}

impl ProbeUpdateScheduler {
	pub fn new(budget: UpdateBudget) -> Self {
		Self { budget }
	}

	#[inline]
	pub fn budget(&self) -> UpdateBudget {
		self.budget
	}

	pub fn set_budget(&mut self, budget: UpdateBudget) {
		self.budget = budget;
	}

	/// Select the slots to trace at `frame`, most urgent first.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "probe_scheduler::schedule"))]
	pub fn schedule(&self, dirty: &[DirtySlot], frame: u64) -> (Vec<ScheduledSlot>, ScheduleStats) {
		let mut candidates: Vec<ScheduledSlot> = dirty
			.iter()
			.map(|d| ScheduledSlot {
				slot: d.slot,
				class: PriorityClass::classify(d, &self.budget, frame),
			})
			.collect();

		let mut stats = ScheduleStats {
			dirty: candidates.len(),
			starved: candidates
				.iter()
				.filter(|c| c.class == PriorityClass::Starved)
				.count(),
			..Default::default()
		};

		let take = self.budget.max_slots_per_frame.min(candidates.len());
		if take == 0 {
			stats.deferred = candidates.len();
			return (Vec::new(), stats);
		}
		if take < candidates.len() {
			candidates.select_nth_unstable_by_key(take - 1, sort_key);
			candidates.truncate(take);
		}
		candidates.sort_unstable_by_key(sort_key);

		stats.selected = candidates.len();
		stats.deferred = stats.dirty - stats.selected;
		(candidates, stats)
	}
}

#[cfg(test)]
#[path = "schedule_test.rs"]
mod schedule_test;
