//! Engine-agnostic metrics collection for probe clipmap statistics.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use voxel_probes::metrics::{ProbeMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // Refresh from the cache after a frame:
//! metrics.update_from_cache(&cache);
//!
//! // Record trace timing:
//! metrics.record_trace_timing(timing_us);
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::cache::ProbeRegionCache;
use crate::constants::MAX_LEVELS;
use crate::scheduler::ScheduleStats;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
	#[cfg(feature = "metrics")]
	{
		COLLECT_METRICS.load(Ordering::Relaxed)
	}
	#[cfg(not(feature = "metrics"))]
	{
		false
	}
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
	buffer: VecDeque<T>,
	capacity: usize,
}

impl<T> RollingWindow<T> {
	pub fn new(capacity: usize) -> Self {
		Self {
			buffer: VecDeque::with_capacity(capacity),
			capacity,
		}
	}

	/// Push a new value, evicting the oldest if at capacity.
	pub fn push(&mut self, value: T) {
		if self.capacity == 0 {
			return;
		}
		if self.buffer.len() >= self.capacity {
			self.buffer.pop_front();
		}
		self.buffer.push_back(value);
	}

	pub fn len(&self) -> usize {
		self.buffer.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buffer.is_empty()
	}

	pub fn clear(&mut self) {
		self.buffer.clear();
	}

	/// Iterate over values (oldest to newest).
	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.buffer.iter()
	}

	pub fn last(&self) -> Option<&T> {
		self.buffer.back()
	}
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
	pub fn sum(&self) -> T {
		self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
	}
}

impl RollingWindow<u64> {
	pub fn average(&self) -> f64 {
		if self.buffer.is_empty() {
			0.0
		} else {
			self.sum() as f64 / self.buffer.len() as f64
		}
	}

	pub fn min_max(&self) -> Option<(u64, u64)> {
		let min = *self.buffer.iter().min()?;
		let max = *self.buffer.iter().max()?;
		Some((min, max))
	}
}

impl Default for RollingWindow<u64> {
	fn default() -> Self {
		Self::new(128) // ~2 seconds at 60fps
	}
}

/// Clipmap statistics updated once per frame.
#[derive(Debug, Clone)]
pub struct ProbeMetrics {
	// Residency
	/// Resident regions per level.
	pub resident_regions: [u32; MAX_LEVELS],
	/// Retained (evicted but kept) regions per level.
	pub retained_regions: [u32; MAX_LEVELS],
	pub in_flight: u32,

	// Scheduling (last frame)
	pub dirty_slots: u32,
	pub scheduled_slots: u32,
	pub deferred_slots: u32,
	pub starved_slots: u32,

	// Cumulative cache counters
	pub regions_recycled: u64,
	pub regions_evicted: u64,
	pub regions_restored: u64,
	pub results_accepted: u64,
	/// Late or stale results dropped on write-back.
	pub results_discarded: u64,

	// Timing
	/// Rolling window of per-probe trace times in microseconds.
	pub trace_timings: RollingWindow<u64>,
	/// Rolling window of `update()` times in microseconds.
	pub update_timings: RollingWindow<u64>,
	pub last_update_us: u64,
}

impl Default for ProbeMetrics {
	fn default() -> Self {
		Self {
			resident_regions: [0; MAX_LEVELS],
			retained_regions: [0; MAX_LEVELS],
			in_flight: 0,
			dirty_slots: 0,
			scheduled_slots: 0,
			deferred_slots: 0,
			starved_slots: 0,
			regions_recycled: 0,
			regions_evicted: 0,
			regions_restored: 0,
			results_accepted: 0,
			results_discarded: 0,
			trace_timings: RollingWindow::new(256),
			update_timings: RollingWindow::new(128),
			last_update_us: 0,
		}
	}
}

impl ProbeMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reset per-frame values and timings.
	pub fn reset(&mut self) {
		self.resident_regions.fill(0);
		self.retained_regions.fill(0);
		self.in_flight = 0;
		self.dirty_slots = 0;
		self.scheduled_slots = 0;
		self.deferred_slots = 0;
		self.starved_slots = 0;
		self.trace_timings.clear();
		self.update_timings.clear();
		self.last_update_us = 0;
		// Cumulative counters mirror the cache and are refreshed from it
	}

	/// Copy residency and cumulative counters from the cache.
	pub fn update_from_cache(&mut self, cache: &ProbeRegionCache) {
		if !is_enabled() {
			return;
		}
		self.resident_regions.fill(0);
		self.retained_regions.fill(0);
		for level in 0..cache.level_count().min(MAX_LEVELS as u32) {
			self.resident_regions[level as usize] = cache.resident_count(level) as u32;
			self.retained_regions[level as usize] = cache.retained_count(level) as u32;
		}
		self.in_flight = cache.in_flight_count() as u32;

		let stats = cache.stats();
		self.regions_recycled = stats.regions_recycled;
		self.regions_evicted = stats.regions_evicted;
		self.regions_restored = stats.regions_restored;
		self.results_accepted = stats.results_accepted;
		self.results_discarded = stats.results_discarded;
	}

	pub fn record_schedule(&mut self, stats: &ScheduleStats) {
		if is_enabled() {
			self.dirty_slots = stats.dirty as u32;
			self.scheduled_slots = stats.selected as u32;
			self.deferred_slots = stats.deferred as u32;
			self.starved_slots = stats.starved as u32;
		}
	}

	pub fn record_trace_timing(&mut self, timing_us: u64) {
		if is_enabled() {
			self.trace_timings.push(timing_us);
		}
	}

	pub fn record_update_timing(&mut self, timing_us: u64) {
		if is_enabled() {
			self.update_timings.push(timing_us);
			self.last_update_us = timing_us;
		}
	}

	pub fn total_resident(&self) -> u32 {
		self.resident_regions.iter().sum()
	}

	pub fn total_retained(&self) -> u32 {
		self.retained_regions.iter().sum()
	}

	pub fn avg_trace_timing_us(&self) -> f64 {
		self.trace_timings.average()
	}

	pub fn avg_update_timing_us(&self) -> f64 {
		self.update_timings.average()
	}
}
