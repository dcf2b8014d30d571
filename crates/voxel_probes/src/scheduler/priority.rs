//! Priority classes for dirty probe slots.

use crate::cache::{DirtyFlags, DirtySlot};
use crate::config::RefreshPolicy;

use super::budget::UpdateBudget;

/// Ordered most urgent first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
	/// Dirty for at least the starvation threshold.
	Starved,
	/// Entered a near level and holds no usable data.
	NearRefresh,
	/// Topology change or manual invalidation.
	Invalidated,
	/// Everything else (far-level streaming).
	Streaming,
}

impl PriorityClass {
	/// Classify one dirty slot at `frame`.
	pub fn classify(slot: &DirtySlot, budget: &UpdateBudget, frame: u64) -> Self {
		if budget.is_starved(slot.dirty_since, frame) {
			return PriorityClass::Starved;
		}
		if slot.policy == RefreshPolicy::ForceRefresh && slot.flags.contains(DirtyFlags::ORIGIN_SHIFT) {
			return PriorityClass::NearRefresh;
		}
		if slot
			.flags
			.intersects(DirtyFlags::TOPOLOGY_CHANGE | DirtyFlags::MANUAL_INVALIDATE)
		{
			return PriorityClass::Invalidated;
		}
		PriorityClass::Streaming
	}
}
