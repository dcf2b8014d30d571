use std::sync::Arc;

use glam::{IVec3, UVec2, Vec3};

use super::*;
use crate::atlas::TileRect;
use crate::config::RefreshPolicy;
use crate::gpu::{DefineSet, ProbePass};
use crate::trace::test_utils::{CountingTracer, SkyTracer};

// =========================================================================
// Helpers
// =========================================================================

/// Two levels of 4³ probes in 2³ regions: 8 regions and 64 slots per level.
fn config() -> ClipmapConfig {
	ClipmapConfig::default()
		.with_levels(2)
		.with_resolution([4, 4, 4])
		.with_region_size(2)
		.with_oct_tile_size(2)
		.with_near_levels(1)
		.with_update_budget(1000)
}

fn system(config: ClipmapConfig) -> WorldProbeSystem<SkyTracer> {
	WorldProbeSystem::new(config, SkyTracer::new(Vec3::ONE), TraceMode::Inline).unwrap()
}

/// Dispatch everything, then write it all back.
fn settle(system: &mut WorldProbeSystem<SkyTracer>, camera: Vec3) {
	system.update(camera);
	system.update(camera);
}

#[derive(Default)]
struct CountingWriter {
	radiance: usize,
	metadata: usize,
}

impl AtlasWriter for CountingWriter {
	fn reallocate(&mut self, _ctx: &GpuContextToken, _layout: &AtlasLayout) {}
	fn write_radiance(&mut self, _ctx: &GpuContextToken, _rect: TileRect, _rgba32f: &[u8]) {
		self.radiance += 1;
	}
	fn write_visibility(&mut self, _ctx: &GpuContextToken, _texel: UVec2, _rgba32f: &[u8]) {}
	fn write_distance(&mut self, _ctx: &GpuContextToken, _texel: UVec2, _r32f: &[u8]) {}
	fn write_metadata(&mut self, _ctx: &GpuContextToken, _texel: UVec2, _rgba32u: &[u8]) {
		self.metadata += 1;
	}
	fn write_debug(&mut self, _ctx: &GpuContextToken, _texel: UVec2, _rgba8: &[u8]) {}
}

#[derive(Default)]
struct CountingBackend {
	compiled: Vec<ProbePass>,
}

impl ProgramBackend for CountingBackend {
	fn compile(&mut self, _ctx: &GpuContextToken, pass: ProbePass, _defines: &DefineSet) -> Result<(), ProgramError> {
		self.compiled.push(pass);
		Ok(())
	}
}

// =========================================================================
// Frame flow
// =========================================================================

#[test]
fn test_first_frame_streams_every_level() {
	let mut system = system(config());
	let report = system.update(Vec3::ZERO);

	assert!(report.enabled);
	assert_eq!(report.frame, 0);
	assert_eq!(report.moved_levels().collect::<Vec<_>>(), vec![0, 1]);
	for shift in &report.shifts {
		assert_eq!(shift.created, 8);
		assert_eq!(shift.reassigned_slots, 64);
	}
	assert_eq!(report.schedule.dirty, 128);
	assert_eq!(report.dispatched, 128);
	// Metadata invalidation plus in-flight debug colour per slot
	assert_eq!(report.uploads_queued, 256);
	assert_eq!(report.accepted, 0);
	assert_eq!(system.frame(), 1);
}

#[test]
fn test_results_written_back_on_next_frame() {
	let mut system = system(config());
	system.update(Vec3::ZERO);
	let report = system.update(Vec3::ZERO);

	assert!(report.shifts.is_empty());
	assert_eq!(report.completed, 128);
	assert_eq!(report.accepted, 128);
	assert_eq!(report.discarded, 0);
	assert_eq!(report.dispatched, 0);

	let snapshot = system.snapshot();
	assert_eq!(snapshot.frame, 1);
	assert_eq!(snapshot.region_count(), 16);
	assert!(snapshot.probe(0, IVec3::ZERO).is_some());
	assert!(snapshot.probe(1, IVec3::splat(-2)).is_some());
	assert!(snapshot.probe(0, IVec3::splat(50)).is_none());

	assert_eq!(system.update(Vec3::ZERO).dispatched, 0);
}

#[test]
fn test_budget_limits_dispatch() {
	let mut system = system(config().with_update_budget(10));
	let report = system.update(Vec3::ZERO);
	assert_eq!(report.dispatched, 10);
	assert_eq!(report.schedule.deferred, 118);

	let second = system.update(Vec3::ZERO);
	assert_eq!(second.accepted, 10);
	assert_eq!(second.dispatched, 10);
}

#[test]
fn test_disabled_system_does_no_work() {
	let tracer = Arc::new(CountingTracer::new(SkyTracer::new(Vec3::ONE)));
	let mut system =
		WorldProbeSystem::with_shared(config().with_enabled(false), Arc::clone(&tracer), TraceMode::Inline).unwrap();

	let report = system.update(Vec3::ZERO);
	assert!(!report.enabled);
	assert_eq!(report.dispatched, 0);
	assert_eq!(system.cache().resident_count(0), 0);
	assert_eq!(tracer.count(), 0);
	assert!(!system.snapshot().enabled);
}

#[test]
fn test_toggle_keeps_cache_and_flips_defines() {
	let ctx = GpuContextToken::acquire();
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	system.recompile_programs(&ctx, &mut CountingBackend::default()).unwrap();

	system.set_enabled(false);
	assert!(!system.snapshot().enabled);
	assert_eq!(system.snapshot().radiance(Vec3::ZERO, Vec3::Y), Vec3::ZERO);
	assert!(!system.update(Vec3::splat(40.0)).enabled);
	assert_eq!(system.cache().resident_count(0), 8);

	let mut backend = CountingBackend::default();
	assert_eq!(system.recompile_programs(&ctx, &mut backend).unwrap(), 2);
	assert_eq!(backend.compiled, vec![ProbePass::Composite, ProbePass::Debug]);
	assert_eq!(system.programs().defines(ProbePass::Composite).get("WORLD_PROBES"), Some(0));

	let frame = FrameUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, UVec2::ONE, system.config(), 0);
	assert_eq!(frame.int_flags[0], 0);
}

// =========================================================================
// Streaming
// =========================================================================

#[test]
fn test_moving_away_cancels_in_flight_traces() {
	let mut system = system(config());
	system.update(Vec3::ZERO);
	let report = system.update(Vec3::splat(100.0));

	assert_eq!(report.cancelled, 128);
	assert_eq!(report.completed, 0);
	assert_eq!(report.accepted, 0);
	assert_eq!(report.dispatched, 128);
}

#[test]
fn test_far_level_restores_without_retrace() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);

	// Level 1 moves by one region; level 0 moves its whole window.
	let away = Vec3::new(4.0, 0.0, 0.0);
	let report = system.update(away);
	let far = report.shifts.iter().find(|s| s.level == 1).unwrap();
	assert_eq!(far.retained, 4);

	let back = system.update(Vec3::ZERO);
	let far = back.shifts.iter().find(|s| s.level == 1).unwrap();
	assert_eq!(far.restored, 4);

	// Restored probes are readable at once.
	let snapshot = system.snapshot();
	assert!(snapshot.probe(1, IVec3::splat(-2)).is_some());
	assert_eq!(system.cache().policy(1), Some(RefreshPolicy::ReuseCached));
}

#[test]
fn test_snapshot_is_stable_while_cache_changes() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	let held = system.snapshot();
	assert!(held.probe(0, IVec3::ZERO).is_some());

	system.update(Vec3::splat(100.0));
	system.update(Vec3::ZERO);

	assert!(held.probe(0, IVec3::ZERO).is_some());
	assert_eq!(held.frame, 1);
	assert_ne!(system.snapshot().frame, held.frame);
}

#[test]
fn test_snapshot_radiance_of_uniform_sky() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	let snapshot = system.snapshot();
	for dir in [Vec3::X, Vec3::Y, -Vec3::Z] {
		let radiance = snapshot.radiance(Vec3::new(0.3, 0.2, -0.4), dir);
		assert!((radiance - Vec3::ONE).abs().max_element() < 1e-3, "{radiance}");
	}
}

#[test]
fn test_invalidate_bounds_retraces_touched_probes() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);

	assert_eq!(system.invalidate_bounds(Vec3::splat(0.1), Vec3::splat(0.9)), 2);
	let report = system.update(Vec3::ZERO);
	assert_eq!(report.dispatched, 2);
	// Dirty metadata plus in-flight debug colour for each touched slot
	assert_eq!(report.uploads_queued, 4);
}

#[test]
fn test_invalidated_slot_metadata_reaches_atlas() {
	let ctx = GpuContextToken::acquire();
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	system.drain_uploads(&ctx, &mut CountingWriter::default());

	system.invalidate_bounds(Vec3::splat(0.1), Vec3::splat(0.9));
	system.update(Vec3::ZERO);
	let mut writer = CountingWriter::default();
	let stats = system.drain_uploads(&ctx, &mut writer);
	assert_eq!(stats.invalidations, 2);
	assert_eq!(stats.debug_states, 2);
	assert_eq!(writer.metadata, 2);
}

// =========================================================================
// GPU phase
// =========================================================================

#[test]
fn test_drain_applies_every_upload() {
	let ctx = GpuContextToken::acquire();
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	assert_eq!(system.pending_uploads(), 1 + 128 + 128 + 128);

	let mut writer = CountingWriter::default();
	let stats = system.drain_uploads(&ctx, &mut writer);
	assert_eq!(stats.resets, 1);
	assert_eq!(stats.invalidations, 128);
	assert_eq!(stats.probes, 128);
	assert_eq!(stats.debug_states, 128);
	assert_eq!(stats.skipped_stale, 0);
	assert_eq!(writer.radiance, 128);
	assert_eq!(writer.metadata, 256);
	assert_eq!(system.pending_uploads(), 0);
}

#[test]
fn test_world_probe_uniforms_follow_camera() {
	let mut system = system(config());
	system.update(Vec3::new(10.0, 0.0, 0.0));
	let u = system.world_probe_uniforms();
	assert_eq!(u.camera_position, [10.0, 0.0, 0.0, 1.0]);
	assert_eq!(u.origins[0][0], 8.0);
	assert_eq!(u.origins[1][0], 6.0);
	assert_eq!(system.snapshot().uniforms, u);
}

// =========================================================================
// Reconfiguration
// =========================================================================

#[test]
fn test_reconfigure_budget_only() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	let scope = system.reconfigure(config().with_update_budget(4)).unwrap();
	assert_eq!(scope, InvalidationScope::None);
	assert_eq!(system.invalidate_all(DirtyFlags::MANUAL_INVALIDATE), 128);
	assert_eq!(system.update(Vec3::ZERO).dispatched, 4);
}

#[test]
fn test_reconfigure_policy() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	let scope = system.reconfigure(config().with_near_levels(2)).unwrap();
	assert_eq!(scope, InvalidationScope::Policy);
	assert_eq!(system.cache().policy(1), Some(RefreshPolicy::ForceRefresh));
	assert_eq!(system.update(Vec3::ZERO).dispatched, 0);
}

#[test]
fn test_reconfigure_retrace() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	let scope = system.reconfigure(config().with_max_trace_distance(16.0)).unwrap();
	assert_eq!(scope, InvalidationScope::Retrace);
	assert_eq!(system.trace_stage().params().max_distance, 16.0);
	assert_eq!(system.update(Vec3::ZERO).dispatched, 128);
	assert_eq!(system.cache().layout_version(), 0);
}

#[test]
fn test_reconfigure_rebuild() {
	let ctx = GpuContextToken::acquire();
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);
	system.recompile_programs(&ctx, &mut CountingBackend::default()).unwrap();

	let scope = system.reconfigure(config().with_resolution([8, 8, 8])).unwrap();
	assert_eq!(scope, InvalidationScope::Rebuild);
	assert_eq!(system.cache().layout_version(), 1);
	assert_eq!(system.packer().layout().version, 1);

	let report = system.update(Vec3::ZERO);
	assert_eq!(report.shifts.len(), 2);
	assert_eq!(report.schedule.dirty, 1024);
	assert_eq!(report.dispatched, 1000);
	assert_eq!(system.world_probe_uniforms().level_params[0][2], 1.0);

	let mut backend = CountingBackend::default();
	assert_eq!(system.recompile_programs(&ctx, &mut backend).unwrap(), 3);
}

#[test]
fn test_reconfigure_policy_with_retrace() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);

	let scope = system
		.reconfigure(config().with_near_levels(2).with_max_trace_distance(16.0))
		.unwrap();
	assert_eq!(scope, InvalidationScope::Retrace);
	assert_eq!(system.cache().policy(1), Some(RefreshPolicy::ForceRefresh));
	assert_eq!(system.world_probe_uniforms().level_params[1][3], 0.0);
	assert_eq!(system.trace_stage().params().max_distance, 16.0);
	assert_eq!(system.update(Vec3::ZERO).dispatched, 128);
}

#[test]
fn test_reconfigure_retained_capacity_with_retrace() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);

	let scope = system
		.reconfigure(config().with_retained_regions(0).with_max_trace_distance(16.0))
		.unwrap();
	assert_eq!(scope, InvalidationScope::Retrace);

	system.update(Vec3::new(40.0, 0.0, 0.0));
	assert_eq!(system.cache().retained_count(1), 0);
}

#[test]
fn test_reconfigure_policy_with_budget() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);

	let scope = system
		.reconfigure(config().with_near_levels(2).with_update_budget(4))
		.unwrap();
	assert_eq!(scope, InvalidationScope::Policy);
	assert_eq!(system.cache().policy(1), Some(RefreshPolicy::ForceRefresh));
	assert_eq!(system.invalidate_all(DirtyFlags::MANUAL_INVALIDATE), 128);
	assert_eq!(system.update(Vec3::ZERO).dispatched, 4);
}

#[test]
fn test_reconfigure_rebuild_with_policy() {
	let mut system = system(config());
	settle(&mut system, Vec3::ZERO);

	let scope = system
		.reconfigure(config().with_resolution([8, 8, 8]).with_near_levels(2))
		.unwrap();
	assert_eq!(scope, InvalidationScope::Rebuild);
	assert_eq!(system.cache().policy(1), Some(RefreshPolicy::ForceRefresh));
	assert_eq!(system.world_probe_uniforms().level_params[1][3], 0.0);
}

#[test]
fn test_reconfigure_rejects_invalid_config() {
	let mut system = system(config());
	let err = system.reconfigure(config().with_region_size(3)).unwrap_err();
	assert!(matches!(err, ConfigError::RegionSize { region: 3, .. }));
	assert_eq!(system.config(), &config());
}

#[test]
fn test_new_rejects_invalid_config() {
	let result = WorldProbeSystem::new(config().with_levels(0), SkyTracer::new(Vec3::ONE), TraceMode::Inline);
	assert!(matches!(result, Err(ConfigError::LevelCount { got: 0, .. })));
}
