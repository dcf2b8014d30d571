//! ProbeRegion - the streaming unit of the cache.
//!
//! A region is an `R×R×R` block of world cells on one level, keyed by
//! `div_floor(cell, R)`. Its slot buffer is shared copy-on-write with frame
//! snapshots: mutation goes through `Arc::make_mut`, so a reader holding an
//! older buffer never observes a change.

use std::sync::Arc;

use glam::{IVec3, UVec3};

use super::dirty::DirtyFlags;
use crate::clipmap::address::{div_floor_ivec, wrap_ivec};
use crate::trace::ProbeSample;

/// `(level, region_coord)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionKey {
	pub level: u32,
	pub coord: IVec3,
}

impl RegionKey {
	pub fn new(level: u32, coord: IVec3) -> Self {
		Self { level, coord }
	}

	/// Region containing a global cell.
	#[inline]
	pub fn of_cell(level: u32, cell: IVec3, region_size: u32) -> Self {
		Self::new(level, div_floor_ivec(cell, region_size as i32))
	}

	/// First cell of the region.
	#[inline]
	pub fn min_cell(&self, region_size: u32) -> IVec3 {
		self.coord * region_size as i32
	}

	/// Physical region slot: regions sharing it compete for the same storage.
	#[inline]
	pub fn physical_slot(&self, resolution: UVec3, region_size: u32) -> UVec3 {
		wrap_ivec(self.coord, resolution / region_size)
	}
}

/// One probe's cached state.
#[derive(Clone, Debug, Default)]
pub struct ProbeSlot {
	pub dirty: DirtyFlags,
	/// Frame the slot last went from clean to dirty.
	pub dirty_since: u64,
	pub last_updated_frame: Option<u64>,
	pub sample: Option<Arc<ProbeSample>>,
}

impl ProbeSlot {
	/// A slot with no data that needs a full trace.
	pub fn needs_refresh(flags: DirtyFlags, frame: u64) -> Self {
		Self {
			dirty: flags,
			dirty_since: frame,
			last_updated_frame: None,
			sample: None,
		}
	}

	#[inline]
	pub fn is_dirty(&self) -> bool {
		!self.dirty.is_empty()
	}

	#[inline]
	pub fn has_sample(&self) -> bool {
		self.sample.is_some()
	}

	/// Add dirty reasons. An already-dirty slot keeps its original
	/// `dirty_since`.
	pub fn mark_dirty(&mut self, flags: DirtyFlags, frame: u64) {
		if self.dirty.is_empty() {
			self.dirty_since = frame;
		}
		self.dirty |= flags;
	}

	/// Store a fresh sample and clear every dirty reason.
	pub fn write(&mut self, sample: Arc<ProbeSample>, frame: u64) {
		self.sample = Some(sample);
		self.dirty = DirtyFlags::empty();
		self.last_updated_frame = Some(frame);
	}
}

/// An `R³` block of probe slots on one level.
#[derive(Clone, Debug)]
pub struct ProbeRegion {
	pub key: RegionKey,
	pub region_size: u32,
	pub last_updated_frame: Option<u64>,
	pub layout_version: u32,
	/// Bumped on every change to the slot contents since creation or recycle.
	pub generation: u32,
	slots: Arc<Vec<ProbeSlot>>,
}

impl ProbeRegion {
	/// A fresh region whose slots all need a full refresh.
	pub fn new(key: RegionKey, region_size: u32, layout_version: u32, flags: DirtyFlags, frame: u64) -> Self {
		let count = (region_size * region_size * region_size) as usize;
		Self {
			key,
			region_size,
			last_updated_frame: None,
			layout_version,
			generation: 0,
			slots: Arc::new(vec![ProbeSlot::needs_refresh(flags, frame); count]),
		}
	}

	/// Reuse this allocation for another key: every slot is reset to "needs
	/// full refresh" and generation/version start over.
	pub fn recycle(&mut self, key: RegionKey, layout_version: u32, flags: DirtyFlags, frame: u64) {
		self.key = key;
		self.last_updated_frame = None;
		self.layout_version = layout_version;
		self.generation = 0;
		let slots = Arc::make_mut(&mut self.slots);
		for slot in slots.iter_mut() {
			*slot = ProbeSlot::needs_refresh(flags, frame);
		}
	}

	/// Offset of a cell inside the slot buffer, `None` if the cell belongs to
	/// another region.
	#[inline]
	pub fn slot_index(&self, cell: IVec3) -> Option<usize> {
		let r = self.region_size as i32;
		let local = cell - self.key.min_cell(self.region_size);
		if local.cmplt(IVec3::ZERO).any() || local.cmpge(IVec3::splat(r)).any() {
			return None;
		}
		Some((local.x + local.y * r + local.z * r * r) as usize)
	}

	/// Global cell of a slot offset.
	#[inline]
	pub fn cell_of_slot(&self, index: usize) -> IVec3 {
		let r = self.region_size as usize;
		let local = IVec3::new((index % r) as i32, ((index / r) % r) as i32, (index / (r * r)) as i32);
		self.key.min_cell(self.region_size) + local
	}

	#[inline]
	pub fn slot(&self, cell: IVec3) -> Option<&ProbeSlot> {
		self.slot_index(cell).map(|i| &self.slots[i])
	}

	/// Mutable slot access. Clones the buffer first if a snapshot shares it.
	pub fn slot_mut(&mut self, cell: IVec3) -> Option<&mut ProbeSlot> {
		let index = self.slot_index(cell)?;
		self.generation = self.generation.wrapping_add(1);
		Some(&mut Arc::make_mut(&mut self.slots)[index])
	}

	/// All slots mutably (copy-on-write).
	pub fn slots_mut(&mut self) -> &mut [ProbeSlot] {
		self.generation = self.generation.wrapping_add(1);
		Arc::make_mut(&mut self.slots).as_mut_slice()
	}

	#[inline]
	pub fn slots(&self) -> &[ProbeSlot] {
		&self.slots
	}

	/// Shared handle to the current slot buffer.
	#[inline]
	pub fn shared_slots(&self) -> Arc<Vec<ProbeSlot>> {
		Arc::clone(&self.slots)
	}

	/// Union of every slot's dirty reasons.
	pub fn dirty_flags(&self) -> DirtyFlags {
		self.slots
			.iter()
			.fold(DirtyFlags::empty(), |acc, slot| acc | slot.dirty)
	}

	/// Iterate `(cell, slot)` pairs.
	pub fn iter(&self) -> impl Iterator<Item = (IVec3, &ProbeSlot)> + '_ {
		self.slots
			.iter()
			.enumerate()
			.map(move |(i, slot)| (self.cell_of_slot(i), slot))
	}
}
