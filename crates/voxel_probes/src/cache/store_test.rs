use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::clipmap::ClipmapLevel;

// =========================================================================
// Helpers
// =========================================================================

fn config(near_levels: u32) -> ClipmapConfig {
	ClipmapConfig::default()
		.with_levels(1)
		.with_resolution([8, 8, 8])
		.with_region_size(4)
		.with_near_levels(near_levels)
		.with_retained_regions(16)
}

fn window(camera: Vec3) -> LevelWindow {
	ClipmapLevel::new(1.0, 0, UVec3::splat(8)).window(camera)
}

fn sample(marker: f32) -> Arc<ProbeSample> {
	Arc::new(ProbeSample {
		hit_distance: marker,
		..Default::default()
	})
}

/// Trace and write back every dirty slot.
fn fill(cache: &mut ProbeRegionCache, frame: u64) -> usize {
	let dirty = cache.dirty_slots();
	for d in &dirty {
		let tag = cache.begin_trace(d.slot).unwrap();
		assert_eq!(cache.write_back(tag, sample(frame as f32), frame), WriteBack::Accepted);
	}
	dirty.len()
}

// =========================================================================
// Origin shift
// =========================================================================

#[test]
fn test_first_shift_creates_everything() {
	let mut cache = ProbeRegionCache::new(&config(1));
	let outcome = cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);

	assert_eq!(outcome.entered, 8);
	assert_eq!(outcome.created, 8);
	assert_eq!(outcome.reassigned_slots, 512);
	assert_eq!(cache.take_invalidated().len(), 512);
	assert_eq!(cache.dirty_slots().len(), 512);
	assert_eq!(cache.resident_count(0), 8);
}

#[test]
fn test_unchanged_window_is_a_no_op() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	cache.take_invalidated();
	let outcome = cache.on_origin_shift(0, window(Vec3::splat(0.7)), 1);
	assert_eq!(outcome.reassigned_slots, 0);
	assert!(cache.take_invalidated().is_empty());
}

#[test]
fn test_near_level_recycles_paired_regions() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::new(0.5, 0.5, 0.5)), 0);
	fill(&mut cache, 0);

	// Four cells along +x: regions x=-1 leave, x=1 enter, same physical slot.
	let outcome = cache.on_origin_shift(0, window(Vec3::new(4.5, 0.5, 0.5)), 1);
	assert_eq!(outcome.left, 4);
	assert_eq!(outcome.entered, 4);
	assert_eq!(outcome.recycled, 4);
	assert_eq!(outcome.evicted, 0);
	assert_eq!(outcome.reassigned_slots, 4 * 8 * 8);
	assert_eq!(cache.dirty_slots().len(), 4 * 8 * 8, "entered cells need a full refresh");
	assert!(cache.take_reuploads().is_empty());

	let status = cache.status(RegionKey::new(0, IVec3::new(1, 0, 0)));
	assert_eq!(status.residency, Residency::Resident);
	assert!(status.is_dirty() && status.is_empty());
	assert_eq!(cache.status(RegionKey::new(0, IVec3::new(-1, 0, 0))).residency, Residency::Miss);
}

#[test]
fn test_near_level_evicts_unpaired_regions() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	// Jump far enough that nothing overlaps; every leaving region pairs with
	// an entering one of the same physical slot.
	let outcome = cache.on_origin_shift(0, window(Vec3::splat(100.5)), 1);
	assert_eq!(outcome.left, 8);
	assert_eq!(outcome.recycled + outcome.evicted, 8);
	assert_eq!(cache.resident_count(0), regions_in_window(&window(Vec3::splat(100.5)), 4).len());
}

#[test]
fn test_eviction_never_drops_in_view_data() {
	let mut rng = StdRng::seed_from_u64(17);
	for near in [0, 1] {
		let mut cache = ProbeRegionCache::new(&config(near));
		let mut camera = Vec3::splat(0.5);
		cache.on_origin_shift(0, window(camera), 0);
		fill(&mut cache, 0);

		for frame in 1..60u64 {
			let before = window(camera);
			camera += Vec3::new(
				rng.random_range(-3.0..3.0),
				rng.random_range(-3.0..3.0),
				rng.random_range(-3.0..3.0),
			);
			let after = window(camera);
			cache.on_origin_shift(0, after, frame);

			for cell in after.cells() {
				let key = RegionKey::of_cell(0, cell, 4);
				assert_eq!(cache.status(key).residency, Residency::Resident, "cell {cell} lost its region");
				if before.contains_cell(cell) {
					let state = cache.slot_state(SlotRef::new(0, after.storage_of_cell(cell))).unwrap();
					assert_eq!(state.tag.cell, cell);
					assert!(state.sample.is_some(), "in-view sample for {cell} dropped");
				}
			}
			fill(&mut cache, frame);
		}
	}
}

#[test]
fn test_far_level_restores_without_retrace() {
	let mut cache = ProbeRegionCache::new(&config(0));
	let home = Vec3::splat(0.5);
	cache.on_origin_shift(0, window(home), 0);
	fill(&mut cache, 0);
	cache.take_invalidated();

	// Eight cells along +x: the window no longer overlaps the home regions.
	let away = cache.on_origin_shift(0, window(Vec3::new(8.5, 0.5, 0.5)), 1);
	assert_eq!(away.retained, 8);
	assert_eq!(cache.retained_count(0), 8);
	assert_eq!(cache.status(RegionKey::new(0, IVec3::new(-1, 0, 0))).residency, Residency::Retained);
	fill(&mut cache, 1);
	cache.take_reuploads();
	cache.take_invalidated();

	let back = cache.on_origin_shift(0, window(home), 2);
	assert_eq!(back.restored, 8);
	assert_eq!(back.created, 0);
	assert!(cache.dirty_slots().is_empty(), "restored regions keep their samples");
	assert_eq!(cache.take_reuploads().len(), back.reassigned_slots);
	assert_eq!(cache.take_invalidated().len(), back.reassigned_slots);

	let state = cache.slot_state(SlotRef::new(0, UVec3::ZERO)).unwrap();
	assert_eq!(state.sample.unwrap().hit_distance, 0.0, "frame-0 sample restored");
}

#[test]
fn test_retained_pool_is_bounded() {
	let mut cache = ProbeRegionCache::new(&config(0).with_retained_regions(2));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	cache.on_origin_shift(0, window(Vec3::splat(100.5)), 1);
	assert_eq!(cache.retained_count(0), 2);
	assert_eq!(cache.stats().retained_dropped, 6);
}

#[test]
fn test_zero_retained_capacity_evicts() {
	let mut cache = ProbeRegionCache::new(&config(0).with_retained_regions(0));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	cache.on_origin_shift(0, window(Vec3::splat(100.5)), 1);
	assert_eq!(cache.retained_count(0), 0);
}

// =========================================================================
// Write-back
// =========================================================================

#[test]
fn test_write_back_clears_dirty() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	let slot = cache.dirty_slots()[0].slot;
	let tag = cache.begin_trace(slot).unwrap();
	assert_eq!(cache.in_flight_count(), 1);
	assert!(cache.dirty_slots().iter().all(|d| d.slot != slot), "in-flight slots are not offered");

	assert_eq!(cache.write_back(tag, sample(1.0), 3), WriteBack::Accepted);
	let state = cache.slot_state(slot).unwrap();
	assert!(state.dirty.is_empty());
	assert_eq!(state.last_updated_frame, Some(3));
	assert!(!state.in_flight);
	assert_eq!(cache.in_flight_count(), 0);
}

#[test]
fn test_late_result_after_recycle_is_discarded() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);

	// x=-4 is the first column; it leaves when the window moves +4.
	let storage = window(Vec3::splat(0.5)).storage_of_cell(IVec3::new(-4, 0, 0));
	let tag = cache.begin_trace(SlotRef::new(0, storage)).unwrap();

	cache.on_origin_shift(0, window(Vec3::new(4.5, 0.5, 0.5)), 1);
	assert_eq!(cache.take_cancellations(), vec![tag]);

	assert_eq!(
		cache.write_back(tag, sample(9.0), 2),
		WriteBack::Discarded(DiscardReason::Reassigned)
	);
	let state = cache.slot_state(SlotRef::new(0, storage)).unwrap();
	assert_eq!(state.tag.cell, IVec3::new(4, 0, 0));
	assert!(state.sample.is_none(), "late result never lands in the reassigned slot");
	assert_eq!(cache.stats().results_discarded, 1);
}

#[test]
fn test_stale_layout_is_discarded() {
	let config = config(1);
	let mut cache = ProbeRegionCache::new(&config);
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	let tag = cache.begin_trace(cache.dirty_slots()[0].slot).unwrap();

	cache.reset_layout(&config);
	assert_eq!(cache.layout_version(), 1);
	assert_eq!(cache.take_cancellations(), vec![tag]);
	assert_eq!(cache.resident_count(0), 0);
	assert_eq!(
		cache.write_back(tag, sample(0.0), 1),
		WriteBack::Discarded(DiscardReason::StaleLayout)
	);
}

// =========================================================================
// Invalidation
// =========================================================================

#[test]
fn test_invalidate_bounds_marks_topology_change() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	fill(&mut cache, 0);

	cache.take_invalidated();

	let count = cache.invalidate_bounds(Vec3::new(0.2, 0.2, 0.2), Vec3::new(1.8, 0.8, 0.8), 5);
	assert_eq!(count, 2);
	let dirty = cache.dirty_slots();
	assert_eq!(dirty.len(), 2);
	assert!(dirty.iter().all(|d| d.flags == DirtyFlags::TOPOLOGY_CHANGE && d.dirty_since == 5));

	let mut invalidated = cache.take_invalidated();
	let mut expected: Vec<SlotRef> = dirty.iter().map(|d| d.slot).collect();
	invalidated.sort_by_key(|s| (s.storage.x, s.storage.y, s.storage.z));
	expected.sort_by_key(|s| (s.storage.x, s.storage.y, s.storage.z));
	assert_eq!(invalidated, expected);
}

#[test]
fn test_invalidate_cancels_in_flight() {
	let mut cache = ProbeRegionCache::new(&config(1));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	fill(&mut cache, 0);

	let key = RegionKey::new(0, IVec3::ZERO);
	cache.invalidate_region(key, DirtyFlags::MANUAL_INVALIDATE, 1);
	let slot = cache.dirty_slots()[0].slot;
	let tag = cache.begin_trace(slot).unwrap();

	cache.invalidate_region(key, DirtyFlags::MANUAL_INVALIDATE, 2);
	assert_eq!(cache.take_cancellations(), vec![tag]);
	assert_eq!(
		cache.write_back(tag, sample(0.0), 3),
		WriteBack::Discarded(DiscardReason::Reassigned)
	);
}

#[test]
fn test_invalidate_all_drops_retained() {
	let mut cache = ProbeRegionCache::new(&config(0));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	fill(&mut cache, 0);
	cache.on_origin_shift(0, window(Vec3::new(8.5, 0.5, 0.5)), 1);
	assert!(cache.retained_count(0) > 0);

	let count = cache.invalidate_all(DirtyFlags::TOPOLOGY_CHANGE, 2);
	assert_eq!(count, 8 * 64);
	assert_eq!(cache.retained_count(0), 0);
}

#[test]
fn test_unknown_region_is_implicit_miss() {
	let cache = ProbeRegionCache::new(&config(1));
	let status = cache.status(RegionKey::new(0, IVec3::new(99, 99, 99)));
	assert_eq!(status, RegionStatus::miss(0));
	assert!(status.is_dirty() && status.is_empty());
	assert_eq!(cache.status(RegionKey::new(7, IVec3::ZERO)).residency, Residency::Miss);
}

#[test]
fn test_policy_switch_to_near_drops_retained() {
	let mut cache = ProbeRegionCache::new(&config(0));
	cache.on_origin_shift(0, window(Vec3::splat(0.5)), 0);
	cache.on_origin_shift(0, window(Vec3::new(8.5, 0.5, 0.5)), 1);
	assert!(cache.retained_count(0) > 0);

	cache.apply_policies(&config(1));
	assert_eq!(cache.policy(0), Some(RefreshPolicy::ForceRefresh));
	assert_eq!(cache.retained_count(0), 0);
}
