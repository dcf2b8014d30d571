//! Per-frame probe update budget.
//!
//! Bounds the number of probe slots dispatched for tracing each frame so a
//! fast camera never turns into a frame spike. Work beyond the budget stays
//! dirty and is picked up on later frames.

/// Rate limiting configuration for probe updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateBudget {
	/// Maximum slots dispatched per frame (0 = none).
	pub max_slots_per_frame: usize,
	/// Frames a slot may stay dirty before it jumps the queue (0 = never).
	pub starvation_frames: u64,
}

impl UpdateBudget {
	/// Default budget.
	pub const DEFAULT: Self = Self {
		max_slots_per_frame: crate::constants::DEFAULT_UPDATE_BUDGET as usize,
		starvation_frames: crate::constants::DEFAULT_STARVATION_FRAMES as u64,
	};

	/// Unlimited budget for testing or warm-up frames.
	pub const UNLIMITED: Self = Self {
		max_slots_per_frame: usize::MAX,
		starvation_frames: 0,
	};

	pub fn new(max_slots_per_frame: usize, starvation_frames: u64) -> Self {
		Self {
			max_slots_per_frame,
			starvation_frames,
		}
	}

	/// Check if more slots can be dispatched this frame.
	#[inline]
	pub fn can_dispatch(&self, dispatched: usize) -> bool {
		dispatched < self.max_slots_per_frame
	}

	/// Check if a slot dirty since `dirty_since` counts as starved at `frame`.
	#[inline]
	pub fn is_starved(&self, dirty_since: u64, frame: u64) -> bool {
		self.starvation_frames > 0 && frame.saturating_sub(dirty_since) >= self.starvation_frames
	}
}

impl Default for UpdateBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

impl From<&crate::config::ClipmapConfig> for UpdateBudget {
	fn from(config: &crate::config::ClipmapConfig) -> Self {
		Self::new(config.atlas_texels_per_update as usize, config.starvation_frames as u64)
	}
}
