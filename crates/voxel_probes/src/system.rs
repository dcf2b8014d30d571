//! WorldProbeSystem - per-frame orchestration of the probe clipmap.
//!
//! # Frame
//!
//! ```text
//! update(camera)
//!   │
//!   ├─ 1. shift      addressor.set_camera → cache.on_origin_shift per moved level
//!   │                cancellations → trace stage, reassigned slots → Invalidate uploads,
//!   │                restored far regions → Probe uploads
//!   ├─ 2. write-back trace completions → generation-checked write_back → Probe uploads
//!   ├─ 3. schedule   dirty slots → budgeted, prioritised selection
//!   ├─ 4. dispatch   begin_trace → TraceRequest → trace stage, in-flight debug colour
//!   └─ 5. publish    Arc<FrameSnapshot> for readers
//!
//! GPU thread (with GpuContextToken)
//!   drain_uploads(writer)       AtlasUploadQueue → AtlasWriter
//!   recompile_programs(backend) stale passes → ProgramBackend
//! ```
//!
//! Steps 1-5 never touch the GPU; the two GPU calls may run on the owning
//! thread at any point between updates.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{IVec3, Mat4, UVec2, UVec3, Vec3};
use smallvec::SmallVec;
use tracing::{debug, info, trace};
use web_time::Instant;

use crate::atlas::{
	AtlasLayout, AtlasUpload, AtlasUploadQueue, AtlasUploadSender, AtlasWriter, DebugState, DrainStats,
	RadianceAtlasPacker,
};
use crate::cache::{DirtyFlags, ProbeRegion, ProbeRegionCache, RegionKey, ShiftOutcome, SlotRef, WriteBack};
use crate::clipmap::{ClipmapAddressor, CrossLevelBlender, LevelWindow};
use crate::config::{ClipmapConfig, InvalidationScope};
use crate::constants::MAX_LEVELS;
use crate::error::{ConfigError, ProgramError};
use crate::gpu::{FrameUniforms, GpuContextToken, ProbePrograms, ProgramBackend, WorldProbeUniforms};
use crate::metrics::ProbeMetrics;
use crate::scheduler::{ProbeUpdateScheduler, ScheduleStats, UpdateBudget};
use crate::trace::{ProbeSample, ProbeTracer, TraceMode, TraceParams, TraceRequest, TraceStage};

// =============================================================================
// FrameReport
// =============================================================================

/// What one `update` did.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
	pub frame: u64,
	/// False when the system is disabled and no work ran.
	pub enabled: bool,
	pub shifts: SmallVec<[ShiftOutcome; MAX_LEVELS]>,
	/// In-flight traces cancelled because their slot changed owner.
	pub cancelled: usize,
	pub completed: usize,
	pub accepted: usize,
	/// Late or stale results dropped on write-back.
	pub discarded: usize,
	pub schedule: ScheduleStats,
	pub dispatched: usize,
	pub uploads_queued: usize,
}

impl FrameReport {
	fn disabled(frame: u64) -> Self {
		Self {
			frame,
			enabled: false,
			..Default::default()
		}
	}

	/// Levels whose window moved this frame.
	pub fn moved_levels(&self) -> impl Iterator<Item = u32> + '_ {
		self.shifts.iter().map(|s| s.level)
	}
}

// =============================================================================
// FrameSnapshot
// =============================================================================

/// Frame-stable view of the clipmap for readers.
///
/// Regions share their slot buffers with the cache; later writes copy on
/// write, so a held snapshot never changes.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
	pub frame: u64,
	pub enabled: bool,
	pub layout_version: u32,
	pub uniforms: WorldProbeUniforms,
	addressor: ClipmapAddressor,
	blender: CrossLevelBlender,
	region_size: u32,
	regions: HashMap<RegionKey, ProbeRegion>,
}

impl FrameSnapshot {
	#[inline]
	pub fn camera(&self) -> Vec3 {
		self.addressor.camera()
	}

	#[inline]
	pub fn windows(&self) -> &[LevelWindow] {
		self.addressor.windows()
	}

	#[inline]
	pub fn region_count(&self) -> usize {
		self.regions.len()
	}

	pub fn region(&self, key: RegionKey) -> Option<&ProbeRegion> {
		self.regions.get(&key)
	}

	/// Sample stored for a world cell of a level, if traced.
	pub fn probe(&self, level: u32, cell: IVec3) -> Option<&Arc<ProbeSample>> {
		let key = RegionKey::of_cell(level, cell, self.region_size);
		self.regions.get(&key)?.slot(cell)?.sample.as_ref()
	}

	/// Radiance arriving at `pos` from `dir`, reconstructed from the nearest
	/// probe's SH and blended across levels. Untraced probes contribute zero.
	pub fn radiance(&self, pos: Vec3, dir: Vec3) -> Vec3 {
		if !self.enabled || self.addressor.level_count() == 0 {
			return Vec3::ZERO;
		}
		self.blender.sample(&self.addressor, pos, |level| {
			let window = self.addressor.window(level);
			let coord = self.addressor.world_to_clipmap(pos, level);
			let local = coord.index.clamp(IVec3::ZERO, window.resolution.as_ivec3() - IVec3::ONE);
			self.probe(level, window.cell_of(local))
				.map_or(Vec3::ZERO, |sample| sample.sh.evaluate(dir))
		})
	}
}

// =============================================================================
// WorldProbeSystem
// =============================================================================

/// Owns the clipmap state and drives it once per frame.
pub struct WorldProbeSystem<T: ProbeTracer + 'static> {
	config: ClipmapConfig,
	addressor: ClipmapAddressor,
	blender: CrossLevelBlender,
	cache: ProbeRegionCache,
	scheduler: ProbeUpdateScheduler,
	stage: TraceStage<T>,
	packer: RadianceAtlasPacker,
	uploads: AtlasUploadSender,
	upload_queue: AtlasUploadQueue,
	programs: ProbePrograms,
	metrics: ProbeMetrics,
	frame: u64,
	/// Shift every level on the next update (first frame, after a rebuild).
	shift_all: bool,
	snapshot: Arc<FrameSnapshot>,
}

impl<T: ProbeTracer + 'static> WorldProbeSystem<T> {
	pub fn new(config: ClipmapConfig, tracer: T, mode: TraceMode) -> Result<Self, ConfigError> {
		Self::with_shared(config, Arc::new(tracer), mode)
	}

	pub fn with_shared(config: ClipmapConfig, tracer: Arc<T>, mode: TraceMode) -> Result<Self, ConfigError> {
		config.validate()?;

		let cache = ProbeRegionCache::new(&config);
		let layout = AtlasLayout::from_config(&config, cache.layout_version());
		let upload_queue = AtlasUploadQueue::new();
		let uploads = upload_queue.sender();
		uploads.push(AtlasUpload::Reset(layout));

		let addressor = ClipmapAddressor::new(config.clipmap_levels(), Vec3::ZERO);
		let blender = CrossLevelBlender::new(config.blend_start, config.blend_width);
		let snapshot = Arc::new(FrameSnapshot {
			frame: 0,
			enabled: config.enabled,
			layout_version: cache.layout_version(),
			uniforms: WorldProbeUniforms::new(&addressor, &config, cache.layout_version()),
			addressor: addressor.clone(),
			blender,
			region_size: config.region_size,
			regions: HashMap::new(),
		});

		info!(
			levels = config.levels,
			resolution = ?config.resolution,
			tile = config.oct_tile_size,
			"world probe system created"
		);

		Ok(Self {
			addressor,
			blender,
			scheduler: ProbeUpdateScheduler::new(UpdateBudget::from(&config)),
			stage: TraceStage::with_shared(tracer, mode, TraceParams::from(&config)),
			packer: RadianceAtlasPacker::new(layout),
			uploads,
			upload_queue,
			programs: ProbePrograms::new(&config),
			metrics: ProbeMetrics::new(),
			frame: 0,
			shift_all: true,
			snapshot,
			cache,
			config,
		})
	}

	// -------------------------------------------------------------------------
	// Accessors
	// -------------------------------------------------------------------------

	#[inline]
	pub fn config(&self) -> &ClipmapConfig {
		&self.config
	}

	#[inline]
	pub fn is_enabled(&self) -> bool {
		self.config.enabled
	}

	/// Frames updated so far.
	#[inline]
	pub fn frame(&self) -> u64 {
		self.frame
	}

	#[inline]
	pub fn addressor(&self) -> &ClipmapAddressor {
		&self.addressor
	}

	#[inline]
	pub fn cache(&self) -> &ProbeRegionCache {
		&self.cache
	}

	#[inline]
	pub fn packer(&self) -> &RadianceAtlasPacker {
		&self.packer
	}

	#[inline]
	pub fn trace_stage(&self) -> &TraceStage<T> {
		&self.stage
	}

	#[inline]
	pub fn metrics(&self) -> &ProbeMetrics {
		&self.metrics
	}

	#[inline]
	pub fn programs(&self) -> &ProbePrograms {
		&self.programs
	}

	/// Extra producer handle for the upload queue.
	pub fn upload_sender(&self) -> AtlasUploadSender {
		self.uploads.clone()
	}

	/// Uploads waiting for the GPU phase.
	#[inline]
	pub fn pending_uploads(&self) -> usize {
		self.upload_queue.len()
	}

	/// Last published snapshot.
	#[inline]
	pub fn snapshot(&self) -> Arc<FrameSnapshot> {
		Arc::clone(&self.snapshot)
	}

	// -------------------------------------------------------------------------
	// Frame
	// -------------------------------------------------------------------------

	/// Advance one frame around `camera`.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "world_probes::update"))]
	pub fn update(&mut self, camera: Vec3) -> FrameReport {
		let frame = self.frame;
		self.frame += 1;
		if !self.config.enabled {
			return FrameReport::disabled(frame);
		}

		let start = Instant::now();
		let mut report = FrameReport {
			frame,
			enabled: true,
			..Default::default()
		};

		// 1. Origin shifts
		let moved = self.addressor.set_camera(camera);
		let levels: SmallVec<[u32; MAX_LEVELS]> = if self.shift_all {
			(0..self.addressor.level_count()).collect()
		} else {
			moved
		};
		self.shift_all = false;
		for level in levels {
			let window = *self.addressor.window(level);
			report.shifts.push(self.cache.on_origin_shift(level, window, frame));
		}
		let (cancelled, queued) = self.flush_cache_events(frame);
		report.cancelled = cancelled;
		report.uploads_queued += queued;

		// 2. Write-back
		let completions = self.stage.poll();
		report.completed = completions.len();
		for done in completions {
			self.metrics.record_trace_timing(done.trace_time_us);
			let sample = Arc::new(done.sample);
			match self.cache.write_back(done.tag, Arc::clone(&sample), frame) {
				WriteBack::Accepted => {
					report.accepted += 1;
					self.uploads.push(AtlasUpload::probe(&self.packer, done.tag, sample, frame));
					report.uploads_queued += 1;
				}
				WriteBack::Discarded(_) => report.discarded += 1,
			}
		}

		// 3. Schedule
		let dirty = self.cache.dirty_slots();
		let (selected, stats) = self.scheduler.schedule(&dirty, frame);
		report.schedule = stats;

		// 4. Dispatch
		let mut requests = Vec::with_capacity(selected.len());
		for scheduled in selected {
			let Some(tag) = self.cache.begin_trace(scheduled.slot) else {
				continue;
			};
			let position = self.addressor.window(tag.level).cell_center(tag.cell);
			requests.push(TraceRequest { tag, position });
			self.uploads.push(AtlasUpload::debug_state(
				&self.packer,
				scheduled.slot,
				tag.layout_version,
				DebugState::InFlight,
			));
		}
		report.dispatched = requests.len();
		report.uploads_queued += requests.len();
		self.stage.dispatch(requests);

		// 5. Publish
		self.publish(frame);

		self.metrics.record_schedule(&report.schedule);
		self.metrics.update_from_cache(&self.cache);
		self.metrics.record_update_timing(start.elapsed().as_micros() as u64);

		trace!(
			frame,
			shifted = report.shifts.len(),
			accepted = report.accepted,
			discarded = report.discarded,
			dispatched = report.dispatched,
			deferred = report.schedule.deferred,
			"world probe frame"
		);
		report
	}

	/// Forward cache events: cancellations to the trace stage, metadata
	/// invalidations and restored samples to the upload queue.
	fn flush_cache_events(&mut self, frame: u64) -> (usize, usize) {
		let mut cancelled = 0;
		for tag in self.cache.take_cancellations() {
			if self.stage.cancel(&tag) {
				cancelled += 1;
			}
		}

		let mut queued = 0;
		let layout_version = self.cache.layout_version();
		for slot in self.cache.take_invalidated() {
			let generation = self.cache.slot_state(slot).map_or(0, |s| s.tag.generation);
			self.uploads
				.push(AtlasUpload::invalidate(&self.packer, slot, generation, layout_version));
			queued += 1;
		}
		for slot in self.cache.take_reuploads() {
			let Some(state) = self.cache.slot_state(slot) else {
				continue;
			};
			let Some(sample) = state.sample else {
				continue;
			};
			let updated = state.last_updated_frame.unwrap_or(frame);
			self.uploads.push(AtlasUpload::probe(&self.packer, state.tag, sample, updated));
			queued += 1;
		}
		(cancelled, queued)
	}

	fn publish(&mut self, frame: u64) {
		let mut regions = HashMap::new();
		for level in 0..self.cache.level_count() {
			for region in self.cache.resident_regions(level) {
				regions.insert(region.key, region.clone());
			}
		}
		self.snapshot = Arc::new(FrameSnapshot {
			frame,
			enabled: self.config.enabled,
			layout_version: self.cache.layout_version(),
			uniforms: self.world_probe_uniforms(),
			addressor: self.addressor.clone(),
			blender: self.blender,
			region_size: self.cache.region_size(),
			regions,
		});
	}

	// -------------------------------------------------------------------------
	// Invalidation and reconfiguration
	// -------------------------------------------------------------------------

	/// Mark every probe overlapping a world-space box dirty (voxel edits).
	pub fn invalidate_bounds(&mut self, min: Vec3, max: Vec3) -> usize {
		self.cache.invalidate_bounds(min, max, self.frame)
	}

	/// Mark every resident probe dirty.
	pub fn invalidate_all(&mut self, flags: DirtyFlags) -> usize {
		self.cache.invalidate_all(flags, self.frame)
	}

	/// Environment toggle. Disabling stops all probe work and flips the
	/// shading define and uniform flag; cached probes are kept.
	pub fn set_enabled(&mut self, enabled: bool) {
		if self.config.enabled == enabled {
			return;
		}
		self.config.enabled = enabled;
		self.programs.set_config(&self.config);
		let mut snapshot = (*self.snapshot).clone();
		snapshot.enabled = enabled;
		self.snapshot = Arc::new(snapshot);
		debug!(enabled, "world probes toggled");
	}

	/// Apply a new configuration, invalidating only what the change requires.
	pub fn reconfigure(&mut self, config: ClipmapConfig) -> Result<InvalidationScope, ConfigError> {
		config.validate()?;
		let scope = InvalidationScope::between(&self.config, &config);

		match scope {
			InvalidationScope::Rebuild => {
				self.stage.cancel_all();
				self.cache.reset_layout(&config);
				// Already cancelled wholesale above
				self.cache.take_cancellations();
				let layout = AtlasLayout::from_config(&config, self.cache.layout_version());
				self.packer = RadianceAtlasPacker::new(layout);
				self.uploads.push(AtlasUpload::Reset(layout));
				self.addressor = ClipmapAddressor::new(config.clipmap_levels(), self.addressor.camera());
				self.programs.invalidate_all();
				self.shift_all = true;
			}
			InvalidationScope::Retrace => {
				// Scopes nest: a retrace may carry a policy change too.
				self.cache.apply_policies(&config);
				self.cache.invalidate_all(DirtyFlags::TOPOLOGY_CHANGE, self.frame);
			}
			InvalidationScope::Policy => {
				self.cache.apply_policies(&config);
			}
			InvalidationScope::None => {}
		}

		self.stage.set_params(TraceParams::from(&config));
		self.scheduler.set_budget(UpdateBudget::from(&config));
		self.blender = CrossLevelBlender::new(config.blend_start, config.blend_width);
		self.programs.set_config(&config);
		self.config = config;

		info!(?scope, layout_version = self.cache.layout_version(), "world probes reconfigured");
		Ok(scope)
	}

	// -------------------------------------------------------------------------
	// GPU phase
	// -------------------------------------------------------------------------

	/// Uniform block for binding 0.
	pub fn frame_uniforms(&self, view: Mat4, projection: Mat4, screen_size: UVec2, debug_view: u32) -> FrameUniforms {
		FrameUniforms::new(view, projection, screen_size, &self.config, debug_view)
	}

	/// Uniform block for binding 1.
	pub fn world_probe_uniforms(&self) -> WorldProbeUniforms {
		WorldProbeUniforms::new(&self.addressor, &self.config, self.cache.layout_version())
	}

	/// Apply queued atlas uploads. GPU thread only.
	pub fn drain_uploads<W: AtlasWriter + ?Sized>(&mut self, ctx: &GpuContextToken, writer: &mut W) -> DrainStats {
		self.upload_queue.drain(ctx, writer)
	}

	/// Recompile passes whose defines changed. GPU thread only.
	pub fn recompile_programs<B: ProgramBackend + ?Sized>(
		&mut self,
		ctx: &GpuContextToken,
		backend: &mut B,
	) -> Result<usize, ProgramError> {
		self.programs.recompile(ctx, backend)
	}

	/// Storage slot probed for a world position on its selected level.
	pub fn slot_at(&self, pos: Vec3) -> SlotRef {
		let level = self.addressor.select_level(pos);
		let coord = self.addressor.world_to_clipmap(pos, level);
		let res = self.addressor.window(level).resolution.as_ivec3();
		let local = coord.index.clamp(IVec3::ZERO, res - IVec3::ONE);
		SlotRef::new(level, self.addressor.storage_index(local, level))
	}

	/// Storage resolution of every level.
	#[inline]
	pub fn resolution(&self) -> UVec3 {
		self.config.resolution_vec()
	}
}

#[cfg(test)]
#[path = "system_test.rs"]
mod system_test;
