//! Per-level record of which world cell owns each physical storage slot.
//!
//! ```text
//!   storage (x,y,z) ──► entries[x + y*Nx + z*Nx*Ny] ──► { cell, generation }
//! ```
//!
//! Every change of owner bumps the generation. A trace result carries the
//! generation it was issued against and is dropped when the two disagree.

use glam::{IVec3, UVec3};

/// Physical slot address: a level plus a ring-wrapped storage index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotRef {
	pub level: u32,
	pub storage: UVec3,
}

impl SlotRef {
	pub fn new(level: u32, storage: UVec3) -> Self {
		Self { level, storage }
	}
}

/// Identity a trace is issued against. A completion is only accepted when
/// every field still matches the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotTag {
	pub level: u32,
	pub storage: UVec3,
	/// World cell the slot held at dispatch.
	pub cell: IVec3,
	pub generation: u32,
	pub layout_version: u32,
}

impl SlotTag {
	#[inline]
	pub fn slot(&self) -> SlotRef {
		SlotRef::new(self.level, self.storage)
	}
}

/// Owner of one storage slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaEntry {
	/// World cell currently stored here (`None` before first assignment).
	pub cell: Option<IVec3>,
	pub generation: u32,
}

/// Result of assigning an owner to a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reassignment {
	pub previous: ArenaEntry,
	pub generation: u32,
}

/// Owners of every storage slot of one level.
#[derive(Clone, Debug)]
pub struct SlotArena {
	resolution: UVec3,
	entries: Vec<ArenaEntry>,
}

impl SlotArena {
	pub fn new(resolution: UVec3) -> Self {
		Self {
			resolution,
			entries: vec![ArenaEntry::default(); resolution.element_product() as usize],
		}
	}

	#[inline]
	pub fn resolution(&self) -> UVec3 {
		self.resolution
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[inline]
	fn index(&self, storage: UVec3) -> usize {
		debug_assert!(storage.cmplt(self.resolution).all());
		(storage.x + storage.y * self.resolution.x + storage.z * self.resolution.x * self.resolution.y)
			as usize
	}

	#[inline]
	pub fn get(&self, storage: UVec3) -> ArenaEntry {
		self.entries[self.index(storage)]
	}

	/// Record `cell` as the owner of `storage`.
	///
	/// Returns the previous entry and the new generation when the owner
	/// changed, `None` when `cell` already owned the slot.
	pub fn assign(&mut self, storage: UVec3, cell: IVec3) -> Option<Reassignment> {
		let index = self.index(storage);
		let entry = &mut self.entries[index];
		if entry.cell == Some(cell) {
			return None;
		}
		let previous = *entry;
		entry.cell = Some(cell);
		entry.generation = entry.generation.wrapping_add(1);
		Some(Reassignment {
			previous,
			generation: entry.generation,
		})
	}

	/// Bump the generation without changing the owner. In-flight results for
	/// the slot become stale.
	pub fn bump(&mut self, storage: UVec3) -> u32 {
		let index = self.index(storage);
		let entry = &mut self.entries[index];
		entry.generation = entry.generation.wrapping_add(1);
		entry.generation
	}

	/// True if `cell` still owns `storage` at `generation`.
	#[inline]
	pub fn matches(&self, storage: UVec3, cell: IVec3, generation: u32) -> bool {
		if storage.cmpge(self.resolution).any() {
			return false;
		}
		let entry = self.get(storage);
		entry.cell == Some(cell) && entry.generation == generation
	}

	/// Forget every owner. Generations keep counting so tags issued before
	/// the reset can never match again.
	pub fn clear_owners(&mut self) {
		for entry in &mut self.entries {
			entry.cell = None;
			entry.generation = entry.generation.wrapping_add(1);
		}
	}
}
