//! ProbeRegionCache - region streaming, recycling, eviction and write-back.
//!
//! # Origin Shift
//!
//! ```text
//!   old window          new window
//!   ┌───┬───┬───┐       ┌───┬───┬───┐
//!   │ A │ B │ C │  ──►  │ B │ C │ D │     A leaves, D enters
//!   └───┴───┴───┘       └───┴───┴───┘
//!
//!   near level:  A and D share a physical region slot → A's allocation is
//!                recycled as D, every slot reset to "needs full refresh".
//!   far level:   A moves to the retained pool; if A re-enters later its
//!                samples are re-uploaded instead of retraced.
//! ```
//!
//! After the region pass, every storage slot of the new window whose owning
//! world cell changed gets a new arena generation, a metadata invalidation
//! and (near levels) a dirty mark. Trace results carry the generation they
//! were issued against, so a result for a recycled slot is dropped.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use glam::{IVec3, UVec3, Vec3};
use tracing::{debug, trace};

use super::arena::{SlotArena, SlotRef, SlotTag};
use super::dirty::DirtyFlags;
use super::region::{ProbeRegion, ProbeSlot, RegionKey};
use crate::clipmap::address::div_floor_ivec;
use crate::clipmap::snap::snap_cell;
use crate::clipmap::LevelWindow;
use crate::config::{ClipmapConfig, RefreshPolicy};
use crate::trace::ProbeSample;

// =============================================================================
// Results and statistics
// =============================================================================

/// What a single origin shift did to one level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShiftOutcome {
	pub level: u32,
	/// Regions that newly intersect the window.
	pub entered: usize,
	/// Regions that no longer intersect the window.
	pub left: usize,
	pub created: usize,
	pub recycled: usize,
	pub evicted: usize,
	pub retained: usize,
	pub restored: usize,
	/// Storage slots whose owning world cell changed.
	pub reassigned_slots: usize,
}

/// Why a completed trace was not written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
	/// Issued against an older atlas layout.
	StaleLayout,
	/// The slot changed owner or was invalidated after dispatch.
	Reassigned,
	/// The owning region is no longer resident.
	NotResident,
}

/// Result of [`ProbeRegionCache::write_back`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteBack {
	Accepted,
	Discarded(DiscardReason),
}

/// Cumulative cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub regions_created: u64,
	pub regions_recycled: u64,
	pub regions_evicted: u64,
	pub regions_retained: u64,
	pub regions_restored: u64,
	/// Retained regions dropped by capacity or invalidation.
	pub retained_dropped: u64,
	pub results_accepted: u64,
	pub results_discarded: u64,
	pub slots_reassigned: u64,
}

/// Where a region currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
	Resident,
	Retained,
	/// Never seen, or dropped.
	Miss,
}

/// Lookup result for a `(level, region_coord)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionStatus {
	pub residency: Residency,
	pub dirty_flags: DirtyFlags,
	pub last_updated_frame: Option<u64>,
	pub layout_version: u32,
	/// Slots holding a sample.
	pub populated: usize,
}

impl RegionStatus {
	/// Implicit miss: dirty, no data.
	pub fn miss(layout_version: u32) -> Self {
		Self {
			residency: Residency::Miss,
			dirty_flags: DirtyFlags::MISS,
			last_updated_frame: None,
			layout_version,
			populated: 0,
		}
	}

	#[inline]
	pub fn is_dirty(&self) -> bool {
		!self.dirty_flags.is_empty()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.populated == 0
	}
}

/// A dirty, in-window, not-in-flight slot offered to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtySlot {
	pub slot: SlotRef,
	pub flags: DirtyFlags,
	pub dirty_since: u64,
	pub policy: RefreshPolicy,
}

/// Current state of one storage slot.
#[derive(Clone, Debug)]
pub struct SlotState {
	pub tag: SlotTag,
	pub dirty: DirtyFlags,
	pub last_updated_frame: Option<u64>,
	pub in_flight: bool,
	pub sample: Option<Arc<ProbeSample>>,
}

// =============================================================================
// Per-level state
// =============================================================================

#[derive(Clone, Debug)]
struct LevelCache {
	policy: RefreshPolicy,
	window: Option<LevelWindow>,
	resident: HashMap<IVec3, ProbeRegion>,
	retained: HashMap<IVec3, ProbeRegion>,
	/// Eviction order of `retained`, oldest first.
	retained_order: VecDeque<IVec3>,
	retained_capacity: usize,
	arena: SlotArena,
	in_flight: HashMap<UVec3, SlotTag>,
}

impl LevelCache {
	fn new(policy: RefreshPolicy, resolution: UVec3, retained_capacity: usize) -> Self {
		Self {
			policy,
			window: None,
			resident: HashMap::new(),
			retained: HashMap::new(),
			retained_order: VecDeque::new(),
			retained_capacity,
			arena: SlotArena::new(resolution),
			in_flight: HashMap::new(),
		}
	}

	/// Push a region into the retained pool, dropping the oldest over capacity.
	/// Returns the number of regions dropped (including `region` itself when
	/// the pool has no capacity).
	fn retain(&mut self, region: ProbeRegion) -> usize {
		if self.retained_capacity == 0 {
			return 1;
		}
		let coord = region.key.coord;
		if self.retained.insert(coord, region).is_some() {
			self.retained_order.retain(|c| *c != coord);
		}
		self.retained_order.push_back(coord);

		let mut dropped = 0;
		while self.retained.len() > self.retained_capacity {
			let Some(oldest) = self.retained_order.pop_front() else {
				break;
			};
			if self.retained.remove(&oldest).is_some() {
				dropped += 1;
			}
		}
		dropped
	}

	fn take_retained(&mut self, coord: IVec3) -> Option<ProbeRegion> {
		let region = self.retained.remove(&coord)?;
		self.retained_order.retain(|c| *c != coord);
		Some(region)
	}

	fn drop_retained(&mut self) -> usize {
		let dropped = self.retained.len();
		self.retained.clear();
		self.retained_order.clear();
		dropped
	}

	/// Mark a cell dirty, stale any trace in flight for it and queue its
	/// metadata texel for invalidation.
	#[allow(clippy::too_many_arguments)]
	fn invalidate_cell(
		&mut self,
		level: u32,
		region_size: u32,
		cell: IVec3,
		flags: DirtyFlags,
		frame: u64,
		cancellations: &mut Vec<SlotTag>,
		invalidated: &mut Vec<SlotRef>,
	) -> bool {
		let key = RegionKey::of_cell(level, cell, region_size);
		let Some(region) = self.resident.get_mut(&key.coord) else {
			return false;
		};
		let Some(slot) = region.slot_mut(cell) else {
			return false;
		};
		slot.mark_dirty(flags, frame);

		if let Some(window) = &self.window {
			if window.contains_cell(cell) {
				let storage = window.storage_of_cell(cell);
				self.arena.bump(storage);
				if let Some(tag) = self.in_flight.remove(&storage) {
					cancellations.push(tag);
				}
				invalidated.push(SlotRef::new(level, storage));
			}
		}
		true
	}
}

/// Region coordinates intersecting a window, x fastest.
pub fn regions_in_window(window: &LevelWindow, region_size: u32) -> Vec<IVec3> {
	let lo = div_floor_ivec(window.origin_cell, region_size as i32);
	let hi = div_floor_ivec(window.end_cell() - IVec3::ONE, region_size as i32);
	let mut coords = Vec::new();
	for z in lo.z..=hi.z {
		for y in lo.y..=hi.y {
			for x in lo.x..=hi.x {
				coords.push(IVec3::new(x, y, z));
			}
		}
	}
	coords
}

#[inline]
fn coord_order(c: &IVec3) -> (i32, i32, i32) {
	(c.x, c.y, c.z)
}

// =============================================================================
// ProbeRegionCache
// =============================================================================

/// CPU-side probe data for every level, streamed with the camera.
#[derive(Clone, Debug)]
pub struct ProbeRegionCache {
	resolution: UVec3,
	region_size: u32,
	layout_version: u32,
	levels: Vec<LevelCache>,
	cancellations: Vec<SlotTag>,
	invalidated: Vec<SlotRef>,
	reuploads: Vec<SlotRef>,
	stats: CacheStats,
}

impl ProbeRegionCache {
	pub fn new(config: &ClipmapConfig) -> Self {
		let mut cache = Self {
			resolution: config.resolution_vec(),
			region_size: config.region_size,
			layout_version: 0,
			levels: Vec::new(),
			cancellations: Vec::new(),
			invalidated: Vec::new(),
			reuploads: Vec::new(),
			stats: CacheStats::default(),
		};
		cache.build_levels(config);
		cache
	}

	fn build_levels(&mut self, config: &ClipmapConfig) {
		self.levels = (0..config.levels)
			.map(|l| LevelCache::new(config.refresh_policy(l), self.resolution, config.retained_regions_per_level))
			.collect();
	}

	#[inline]
	pub fn layout_version(&self) -> u32 {
		self.layout_version
	}

	#[inline]
	pub fn resolution(&self) -> UVec3 {
		self.resolution
	}

	#[inline]
	pub fn region_size(&self) -> u32 {
		self.region_size
	}

	#[inline]
	pub fn level_count(&self) -> u32 {
		self.levels.len() as u32
	}

	#[inline]
	pub fn stats(&self) -> CacheStats {
		self.stats
	}

	pub fn policy(&self, level: u32) -> Option<RefreshPolicy> {
		self.levels.get(level as usize).map(|l| l.policy)
	}

	/// Window recorded by the last shift of a level.
	pub fn window(&self, level: u32) -> Option<&LevelWindow> {
		self.levels.get(level as usize).and_then(|l| l.window.as_ref())
	}

	pub fn resident_count(&self, level: u32) -> usize {
		self.levels.get(level as usize).map_or(0, |l| l.resident.len())
	}

	pub fn retained_count(&self, level: u32) -> usize {
		self.levels.get(level as usize).map_or(0, |l| l.retained.len())
	}

	pub fn in_flight_count(&self) -> usize {
		self.levels.iter().map(|l| l.in_flight.len()).sum()
	}

	/// Resident regions of a level (unordered).
	pub fn resident_regions(&self, level: u32) -> impl Iterator<Item = &ProbeRegion> + '_ {
		self.levels
			.get(level as usize)
			.into_iter()
			.flat_map(|l| l.resident.values())
	}

	// -------------------------------------------------------------------------
	// Origin shift
	// -------------------------------------------------------------------------

	/// Move a level to `window`. The previous window is the one recorded by
	/// the last call (none on the first frame, when every region enters).
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "probe_cache::on_origin_shift"))]
	pub fn on_origin_shift(&mut self, level: u32, window: LevelWindow, frame: u64) -> ShiftOutcome {
		let mut outcome = ShiftOutcome {
			level,
			..Default::default()
		};
		let region_size = self.region_size;
		let resolution = self.resolution;
		let layout_version = self.layout_version;
		let Some(lc) = self.levels.get_mut(level as usize) else {
			return outcome;
		};
		if lc.window == Some(window) {
			return outcome;
		}
		let previous = lc.window.replace(window);

		// Region pass
		let wanted: Vec<IVec3> = regions_in_window(&window, region_size);
		let wanted_set: HashSet<IVec3> = wanted.iter().copied().collect();

		let mut leaving: Vec<IVec3> = lc
			.resident
			.keys()
			.filter(|c| !wanted_set.contains(*c))
			.copied()
			.collect();
		leaving.sort_unstable_by_key(coord_order);
		let entering: Vec<IVec3> = wanted
			.iter()
			.filter(|c| !lc.resident.contains_key(*c))
			.copied()
			.collect();
		outcome.left = leaving.len();
		outcome.entered = entering.len();

		match lc.policy {
			RefreshPolicy::ForceRefresh => {
				let mut by_slot: HashMap<UVec3, VecDeque<IVec3>> = HashMap::new();
				for coord in &leaving {
					let physical = RegionKey::new(level, *coord).physical_slot(resolution, region_size);
					by_slot.entry(physical).or_default().push_back(*coord);
				}
				for coord in &entering {
					let key = RegionKey::new(level, *coord);
					let paired = by_slot
						.get_mut(&key.physical_slot(resolution, region_size))
						.and_then(|queue| queue.pop_front())
						.and_then(|old| lc.resident.remove(&old));
					let region = match paired {
						Some(mut region) => {
							trace!(level, from = ?region.key.coord, to = ?coord, "recycling probe region");
							region.recycle(key, layout_version, DirtyFlags::ORIGIN_SHIFT, frame);
							outcome.recycled += 1;
							region
						}
						None => {
							outcome.created += 1;
							ProbeRegion::new(key, region_size, layout_version, DirtyFlags::ORIGIN_SHIFT, frame)
						}
					};
					lc.resident.insert(*coord, region);
				}
				for coord in &leaving {
					if lc.resident.remove(coord).is_some() {
						outcome.evicted += 1;
					}
				}
			}
			RefreshPolicy::ReuseCached => {
				let mut dropped = 0;
				for coord in &leaving {
					if let Some(region) = lc.resident.remove(coord) {
						dropped += lc.retain(region);
						outcome.retained += 1;
					}
				}
				for coord in &entering {
					let region = match lc.take_retained(*coord) {
						Some(region) if region.layout_version == layout_version => {
							outcome.restored += 1;
							region
						}
						_ => {
							outcome.created += 1;
							ProbeRegion::new(
								RegionKey::new(level, *coord),
								region_size,
								layout_version,
								DirtyFlags::ORIGIN_SHIFT,
								frame,
							)
						}
					};
					lc.resident.insert(*coord, region);
				}
				self.stats.retained_dropped += dropped as u64;
			}
		}

		// Slot pass: every storage slot whose owner changed.
		let policy = lc.policy;
		for cell in window.cells() {
			let storage = window.storage_of_cell(cell);
			if lc.arena.assign(storage, cell).is_none() {
				continue;
			}
			outcome.reassigned_slots += 1;
			if let Some(tag) = lc.in_flight.remove(&storage) {
				self.cancellations.push(tag);
			}
			let slot_ref = SlotRef::new(level, storage);
			self.invalidated.push(slot_ref);

			let key = RegionKey::of_cell(level, cell, region_size);
			let Some(slot) = lc.resident.get_mut(&key.coord).and_then(|r| r.slot_mut(cell)) else {
				continue;
			};
			match policy {
				RefreshPolicy::ForceRefresh => {
					slot.sample = None;
					slot.last_updated_frame = None;
					slot.mark_dirty(DirtyFlags::ORIGIN_SHIFT, frame);
				}
				RefreshPolicy::ReuseCached => {
					if slot.has_sample() {
						self.reuploads.push(slot_ref);
					} else {
						slot.mark_dirty(DirtyFlags::ORIGIN_SHIFT, frame);
					}
				}
			}
		}

		self.stats.regions_created += outcome.created as u64;
		self.stats.regions_recycled += outcome.recycled as u64;
		self.stats.regions_evicted += outcome.evicted as u64;
		self.stats.regions_retained += outcome.retained as u64;
		self.stats.regions_restored += outcome.restored as u64;
		self.stats.slots_reassigned += outcome.reassigned_slots as u64;

		debug!(
			level,
			from = ?previous.map(|w| w.origin_cell),
			to = ?window.origin_cell,
			entered = outcome.entered,
			left = outcome.left,
			recycled = outcome.recycled,
			evicted = outcome.evicted,
			restored = outcome.restored,
			"probe level origin shift"
		);
		outcome
	}

	// -------------------------------------------------------------------------
	// Tracing hand-off
	// -------------------------------------------------------------------------

	/// Every dirty, in-window slot that has no trace in flight.
	pub fn dirty_slots(&self) -> Vec<DirtySlot> {
		let mut out = Vec::new();
		for (level, lc) in self.levels.iter().enumerate() {
			let Some(window) = &lc.window else {
				continue;
			};
			for region in lc.resident.values() {
				for (cell, slot) in region.iter() {
					if !slot.is_dirty() || !window.contains_cell(cell) {
						continue;
					}
					let storage = window.storage_of_cell(cell);
					if lc.in_flight.contains_key(&storage) {
						continue;
					}
					out.push(DirtySlot {
						slot: SlotRef::new(level as u32, storage),
						flags: slot.dirty,
						dirty_since: slot.dirty_since,
						policy: lc.policy,
					});
				}
			}
		}
		out
	}

	/// Mark a slot in flight and return the tag its result must carry.
	pub fn begin_trace(&mut self, slot: SlotRef) -> Option<SlotTag> {
		let layout_version = self.layout_version;
		let lc = self.levels.get_mut(slot.level as usize)?;
		let entry = lc.arena.get(slot.storage);
		let cell = entry.cell?;
		let tag = SlotTag {
			level: slot.level,
			storage: slot.storage,
			cell,
			generation: entry.generation,
			layout_version,
		};
		lc.in_flight.insert(slot.storage, tag);
		Some(tag)
	}

	/// Store a completed trace if the slot still belongs to the same world
	/// cell, generation and layout it was issued against.
	pub fn write_back(&mut self, tag: SlotTag, sample: Arc<ProbeSample>, frame: u64) -> WriteBack {
		let outcome = self.try_write_back(tag, sample, frame);
		match outcome {
			WriteBack::Accepted => self.stats.results_accepted += 1,
			WriteBack::Discarded(reason) => {
				self.stats.results_discarded += 1;
				debug!(level = tag.level, storage = ?tag.storage, ?reason, "discarding late probe result");
			}
		}
		outcome
	}

	fn try_write_back(&mut self, tag: SlotTag, sample: Arc<ProbeSample>, frame: u64) -> WriteBack {
		if tag.layout_version != self.layout_version {
			return WriteBack::Discarded(DiscardReason::StaleLayout);
		}
		let region_size = self.region_size;
		let Some(lc) = self.levels.get_mut(tag.level as usize) else {
			return WriteBack::Discarded(DiscardReason::StaleLayout);
		};
		if !lc.arena.matches(tag.storage, tag.cell, tag.generation) {
			return WriteBack::Discarded(DiscardReason::Reassigned);
		}
		if lc.in_flight.get(&tag.storage) == Some(&tag) {
			lc.in_flight.remove(&tag.storage);
		}
		let key = RegionKey::of_cell(tag.level, tag.cell, region_size);
		let Some(region) = lc.resident.get_mut(&key.coord) else {
			return WriteBack::Discarded(DiscardReason::NotResident);
		};
		let Some(slot) = region.slot_mut(tag.cell) else {
			return WriteBack::Discarded(DiscardReason::NotResident);
		};
		slot.write(sample, frame);
		region.last_updated_frame = Some(frame);
		WriteBack::Accepted
	}

	// -------------------------------------------------------------------------
	// Queries
	// -------------------------------------------------------------------------

	/// Residency and dirtiness of a region. Unknown keys are an implicit miss.
	pub fn status(&self, key: RegionKey) -> RegionStatus {
		let Some(lc) = self.levels.get(key.level as usize) else {
			return RegionStatus::miss(self.layout_version);
		};
		let (residency, region) = if let Some(region) = lc.resident.get(&key.coord) {
			(Residency::Resident, region)
		} else if let Some(region) = lc.retained.get(&key.coord) {
			(Residency::Retained, region)
		} else {
			return RegionStatus::miss(self.layout_version);
		};
		RegionStatus {
			residency,
			dirty_flags: region.dirty_flags(),
			last_updated_frame: region.last_updated_frame,
			layout_version: region.layout_version,
			populated: region.slots().iter().filter(|s| s.has_sample()).count(),
		}
	}

	/// Current owner, dirtiness and sample of a storage slot.
	pub fn slot_state(&self, slot: SlotRef) -> Option<SlotState> {
		let lc = self.levels.get(slot.level as usize)?;
		if slot.storage.cmpge(self.resolution).any() {
			return None;
		}
		let entry = lc.arena.get(slot.storage);
		let cell = entry.cell?;
		let key = RegionKey::of_cell(slot.level, cell, self.region_size);
		let probe: &ProbeSlot = lc.resident.get(&key.coord)?.slot(cell)?;
		Some(SlotState {
			tag: SlotTag {
				level: slot.level,
				storage: slot.storage,
				cell,
				generation: entry.generation,
				layout_version: self.layout_version,
			},
			dirty: probe.dirty,
			last_updated_frame: probe.last_updated_frame,
			in_flight: lc.in_flight.contains_key(&slot.storage),
			sample: probe.sample.clone(),
		})
	}

	// -------------------------------------------------------------------------
	// Invalidation
	// -------------------------------------------------------------------------

	/// Mark every slot of one region dirty. A retained copy is dropped.
	pub fn invalidate_region(&mut self, key: RegionKey, flags: DirtyFlags, frame: u64) -> usize {
		let region_size = self.region_size;
		let Some(lc) = self.levels.get_mut(key.level as usize) else {
			return 0;
		};
		if lc.take_retained(key.coord).is_some() {
			self.stats.retained_dropped += 1;
		}
		let Some(region) = lc.resident.get(&key.coord) else {
			return 0;
		};
		let cells: Vec<IVec3> = region.iter().map(|(cell, _)| cell).collect();
		cells
			.into_iter()
			.filter(|cell| {
				lc.invalidate_cell(
					key.level,
					region_size,
					*cell,
					flags,
					frame,
					&mut self.cancellations,
					&mut self.invalidated,
				)
			})
			.count()
	}

	/// Mark every resident slot of a level dirty and drop its retained pool.
	pub fn invalidate_level(&mut self, level: u32, flags: DirtyFlags, frame: u64) -> usize {
		let Some(lc) = self.levels.get_mut(level as usize) else {
			return 0;
		};
		self.stats.retained_dropped += lc.drop_retained() as u64;
		let coords: Vec<IVec3> = lc.resident.keys().copied().collect();
		coords
			.into_iter()
			.map(|coord| self.invalidate_region(RegionKey::new(level, coord), flags, frame))
			.sum()
	}

	/// Invalidate everything on every level.
	pub fn invalidate_all(&mut self, flags: DirtyFlags, frame: u64) -> usize {
		(0..self.level_count())
			.map(|level| self.invalidate_level(level, flags, frame))
			.sum()
	}

	/// Topology change inside a world-space box (for example a voxel edit).
	///
	/// Every cell overlapping `[min, max]` on every level is marked dirty;
	/// retained regions overlapping it are dropped.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "probe_cache::invalidate_bounds"))]
	pub fn invalidate_bounds(&mut self, min: Vec3, max: Vec3, frame: u64) -> usize {
		let region_size = self.region_size;
		let mut count = 0;
		for (level, lc) in self.levels.iter_mut().enumerate() {
			let level = level as u32;
			let Some(window) = lc.window else {
				continue;
			};
			let lo = snap_cell(min.min(max), window.spacing);
			let hi = snap_cell(max.max(min), window.spacing);

			let region_lo = div_floor_ivec(lo, region_size as i32);
			let region_hi = div_floor_ivec(hi, region_size as i32);
			let overlaps = |c: &IVec3| c.cmpge(region_lo).all() && c.cmple(region_hi).all();

			let stale: Vec<IVec3> = lc.retained.keys().filter(|c| overlaps(c)).copied().collect();
			for coord in stale {
				lc.take_retained(coord);
				self.stats.retained_dropped += 1;
			}

			let regions: Vec<IVec3> = lc.resident.keys().filter(|c| overlaps(c)).copied().collect();
			for coord in regions {
				let min_cell = RegionKey::new(level, coord).min_cell(region_size);
				let first = min_cell.max(lo);
				let last = (min_cell + IVec3::splat(region_size as i32 - 1)).min(hi);
				for z in first.z..=last.z {
					for y in first.y..=last.y {
						for x in first.x..=last.x {
							let cell = IVec3::new(x, y, z);
							let flags = DirtyFlags::TOPOLOGY_CHANGE;
							if lc.invalidate_cell(
								level,
								region_size,
								cell,
								flags,
								frame,
								&mut self.cancellations,
								&mut self.invalidated,
							) {
								count += 1;
							}
						}
					}
				}
			}
		}
		debug!(?min, ?max, slots = count, "probe bounds invalidated");
		count
	}

	// -------------------------------------------------------------------------
	// Reconfiguration
	// -------------------------------------------------------------------------

	/// Drop all content and start a new layout version. In-flight traces are
	/// cancelled and their results will be rejected.
	pub fn reset_layout(&mut self, config: &ClipmapConfig) {
		for lc in &mut self.levels {
			self.cancellations.extend(lc.in_flight.drain().map(|(_, tag)| tag));
		}
		self.layout_version = self.layout_version.wrapping_add(1);
		self.resolution = config.resolution_vec();
		self.region_size = config.region_size;
		self.invalidated.clear();
		self.reuploads.clear();
		self.build_levels(config);
		debug!(layout_version = self.layout_version, "probe cache layout reset");
	}

	/// Apply new refresh policies and retained capacities. Levels that
	/// switched to forced refresh lose their retained pool.
	pub fn apply_policies(&mut self, config: &ClipmapConfig) {
		for (level, lc) in self.levels.iter_mut().enumerate() {
			let policy = config.refresh_policy(level as u32);
			lc.policy = policy;
			lc.retained_capacity = config.retained_regions_per_level;
			if policy == RefreshPolicy::ForceRefresh {
				self.stats.retained_dropped += lc.drop_retained() as u64;
				continue;
			}
			while lc.retained.len() > lc.retained_capacity {
				let Some(oldest) = lc.retained_order.pop_front() else {
					break;
				};
				if lc.retained.remove(&oldest).is_some() {
					self.stats.retained_dropped += 1;
				}
			}
		}
	}

	// -------------------------------------------------------------------------
	// Pending work for the GPU phase and the trace stage
	// -------------------------------------------------------------------------

	/// Tags of traces made stale since the last call.
	pub fn take_cancellations(&mut self) -> Vec<SlotTag> {
		std::mem::take(&mut self.cancellations)
	}

	/// Storage slots whose metadata texel must be invalidated.
	pub fn take_invalidated(&mut self) -> Vec<SlotRef> {
		std::mem::take(&mut self.invalidated)
	}

	/// Storage slots whose cached sample must be uploaded again.
	pub fn take_reuploads(&mut self) -> Vec<SlotRef> {
		std::mem::take(&mut self.reuploads)
	}
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
