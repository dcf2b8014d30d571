//! Trace inputs and outputs.

use glam::{Vec2, Vec3};

use crate::cache::SlotTag;
use crate::constants::{SH_C0, SH_C1};

/// A ray cast from a probe centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
	pub origin: Vec3,
	/// Unit direction.
	pub direction: Vec3,
	pub max_distance: f32,
}

/// What a ray returned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaySample {
	/// Incoming radiance along the ray (sky radiance on a miss).
	pub radiance: Vec3,
	/// Distance to the first hit, `None` on a miss.
	pub hit_distance: Option<f32>,
}

impl RaySample {
	#[inline]
	pub fn hit(radiance: Vec3, distance: f32) -> Self {
		Self {
			radiance,
			hit_distance: Some(distance),
		}
	}

	#[inline]
	pub fn miss(radiance: Vec3) -> Self {
		Self {
			radiance,
			hit_distance: None,
		}
	}
}

/// External voxel ray tracer.
///
/// Implementations must be callable from rayon workers.
pub trait ProbeTracer: Send + Sync {
	fn trace_ray(&self, ray: &Ray) -> RaySample;
}

impl<T: ProbeTracer + ?Sized> ProbeTracer for Box<T> {
	fn trace_ray(&self, ray: &Ray) -> RaySample {
		(**self).trace_ray(ray)
	}
}

impl<T: ProbeTracer + ?Sized> ProbeTracer for std::sync::Arc<T> {
	fn trace_ray(&self, ray: &Ray) -> RaySample {
		(**self).trace_ray(ray)
	}
}

/// Short-range occlusion term: mean unoccluded direction plus the fraction
/// of rays that escaped the AO radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Visibility {
	/// Octahedral encoding of the bent direction, in `[0, 1]²`.
	pub direction_oct: Vec2,
	/// `[0, 1]`, 1 = fully open.
	pub confidence: f32,
}

impl Default for Visibility {
	fn default() -> Self {
		Self {
			direction_oct: Vec2::splat(0.5),
			confidence: 0.0,
		}
	}
}

/// L1 spherical harmonics, one RGB coefficient per basis function
/// (`Y00, Y1-1, Y10, Y11`).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShL1(pub [Vec3; 4]);

impl ShL1 {
	/// Accumulate `radiance` arriving from `dir` with a solid-angle weight.
	pub fn add(&mut self, dir: Vec3, radiance: Vec3, weight: f32) {
		let basis = [SH_C0, SH_C1 * dir.y, SH_C1 * dir.z, SH_C1 * dir.x];
		for (coeff, b) in self.0.iter_mut().zip(basis) {
			*coeff += radiance * (b * weight);
		}
	}

	/// Reconstruct radiance in direction `dir`.
	pub fn evaluate(&self, dir: Vec3) -> Vec3 {
		let basis = [SH_C0, SH_C1 * dir.y, SH_C1 * dir.z, SH_C1 * dir.x];
		self.0
			.iter()
			.zip(basis)
			.fold(Vec3::ZERO, |acc, (coeff, b)| acc + *coeff * b)
	}
}

/// Everything stored for one probe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbeSample {
	/// `S×S` octahedral texels, row-major; rgb = radiance, a = signed log
	/// distance.
	pub texels: Vec<[f32; 4]>,
	pub visibility: Visibility,
	/// Nearest hit distance, or `-max_distance` when every ray missed.
	pub hit_distance: f32,
	pub sh: ShL1,
}

/// One probe to trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceRequest {
	pub tag: SlotTag,
	/// World-space probe centre.
	pub position: Vec3,
}

/// A finished trace, possibly frames after dispatch.
#[derive(Clone, Debug)]
pub struct TraceCompletion {
	pub tag: SlotTag,
	pub sample: ProbeSample,
	pub trace_time_us: u64,
}
