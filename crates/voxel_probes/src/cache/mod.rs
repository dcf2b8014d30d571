//! CPU-side probe region cache.
//!
//! - [`store`]: streaming, recycling, eviction and generation-checked write-back
//! - [`region`]: the `R³` region unit and its copy-on-write slot buffer
//! - [`arena`]: per-level storage-slot ownership and generations
//! - [`dirty`]: dirty reasons

pub mod arena;
pub mod dirty;
pub mod region;
pub mod store;

pub use arena::{ArenaEntry, SlotArena, SlotRef, SlotTag};
pub use dirty::DirtyFlags;
pub use region::{ProbeRegion, ProbeSlot, RegionKey};
pub use store::{
	regions_in_window, CacheStats, DirtySlot, DiscardReason, ProbeRegionCache, RegionStatus, Residency,
	ShiftOutcome, SlotState, WriteBack,
};
