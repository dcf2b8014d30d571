//! Test utilities for trace, cache and system tests.
//!
//! Mock tracers with closed-form answers so probe contents can be checked
//! exactly.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{IVec3, UVec3, Vec3};

use super::types::{ProbeTracer, Ray, RaySample, TraceRequest};
use crate::cache::SlotTag;

// =============================================================================
// Mock Tracers
// =============================================================================

/// Open sky in every direction.
pub struct SkyTracer {
	pub radiance: Vec3,
}

impl SkyTracer {
	pub fn new(radiance: Vec3) -> Self {
		Self { radiance }
	}
}

impl ProbeTracer for SkyTracer {
	fn trace_ray(&self, _ray: &Ray) -> RaySample {
		RaySample::miss(self.radiance)
	}
}

/// Every ray hits a surface at the same distance.
pub struct ConstantHitTracer {
	pub distance: f32,
	pub radiance: Vec3,
}

impl ConstantHitTracer {
	pub fn new(distance: f32, radiance: Vec3) -> Self {
		Self { distance, radiance }
	}
}

impl ProbeTracer for ConstantHitTracer {
	fn trace_ray(&self, ray: &Ray) -> RaySample {
		if self.distance <= ray.max_distance {
			RaySample::hit(self.radiance, self.distance)
		} else {
			RaySample::miss(Vec3::ZERO)
		}
	}
}

/// Infinite floor at `y = height` under an open sky.
pub struct FloorTracer {
	pub height: f32,
	pub floor: Vec3,
	pub sky: Vec3,
}

impl FloorTracer {
	pub fn new(height: f32) -> Self {
		Self {
			height,
			floor: Vec3::new(0.4, 0.3, 0.2),
			sky: Vec3::new(0.5, 0.7, 1.0),
		}
	}
}

impl ProbeTracer for FloorTracer {
	fn trace_ray(&self, ray: &Ray) -> RaySample {
		if ray.direction.y < 0.0 {
			let t = (ray.origin.y - self.height) / -ray.direction.y;
			if t >= 0.0 && t <= ray.max_distance {
				return RaySample::hit(self.floor, t);
			}
		}
		RaySample::miss(self.sky)
	}
}

/// Wraps a tracer and counts rays.
pub struct CountingTracer<T> {
	pub inner: T,
	pub rays: AtomicUsize,
}

impl<T> CountingTracer<T> {
	pub fn new(inner: T) -> Self {
		Self {
			inner,
			rays: AtomicUsize::new(0),
		}
	}

	pub fn count(&self) -> usize {
		self.rays.load(Ordering::Relaxed)
	}
}

impl<T: ProbeTracer> ProbeTracer for CountingTracer<T> {
	fn trace_ray(&self, ray: &Ray) -> RaySample {
		self.rays.fetch_add(1, Ordering::Relaxed);
		self.inner.trace_ray(ray)
	}
}

// =============================================================================
// Fixtures
// =============================================================================

/// A request for a probe at `position` with a recognisable tag.
pub fn request_at(position: Vec3, storage: u32) -> TraceRequest {
	TraceRequest {
		tag: SlotTag {
			level: 0,
			storage: UVec3::new(storage, 0, 0),
			cell: IVec3::new(storage as i32, 0, 0),
			generation: 1,
			layout_version: 0,
		},
		position,
	}
}
