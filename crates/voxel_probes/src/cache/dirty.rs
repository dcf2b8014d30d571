//! Dirty reasons carried by probe slots and regions.

use bitflags::bitflags;

bitflags! {
	/// Why a slot (or any slot of a region) needs a retrace.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
	pub struct DirtyFlags: u8 {
		/// The slot's world cell entered the window.
		const ORIGIN_SHIFT = 1 << 0;
		/// Voxel geometry or trace parameters changed around the slot.
		const TOPOLOGY_CHANGE = 1 << 1;
		/// Invalidated by an explicit request.
		const MANUAL_INVALIDATE = 1 << 2;
	}
}

impl DirtyFlags {
	/// Flags reported for a `(level, region)` that has never been seen.
	pub const MISS: Self = Self::ORIGIN_SHIFT;
}
