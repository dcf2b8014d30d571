//! ProbeTraceJob - resumable per-probe trace.
//!
//! One ray per octahedral tile texel. A job can be advanced a few rays at a
//! time (`step`) so a long trace spreads across frames or yields to a
//! cancellation flag between steps.

use glam::Vec3;

use super::types::{ProbeSample, ProbeTracer, Ray, ShL1, TraceRequest, Visibility};
use crate::atlas::encode::encode_signed_distance;
use crate::config::ClipmapConfig;
use crate::octahedral::{oct_encode, texel_direction};

/// Parameters shared by every job of a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceParams {
	pub tile_size: u32,
	pub max_distance: f32,
	pub ao_radius: f32,
}

impl From<&ClipmapConfig> for TraceParams {
	fn from(config: &ClipmapConfig) -> Self {
		Self {
			tile_size: config.oct_tile_size,
			max_distance: config.max_trace_distance,
			ao_radius: config.ao_radius,
		}
	}
}

/// In-progress trace of one probe.
#[derive(Clone, Debug)]
pub struct ProbeTraceJob {
	request: TraceRequest,
	params: TraceParams,
	next_texel: u32,
	texels: Vec<[f32; 4]>,
	nearest_hit: Option<f32>,
	open_direction: Vec3,
	open_rays: u32,
	sh: ShL1,
}

impl ProbeTraceJob {
	pub fn new(request: TraceRequest, params: TraceParams) -> Self {
		let total = (params.tile_size * params.tile_size) as usize;
		Self {
			request,
			params,
			next_texel: 0,
			texels: Vec::with_capacity(total),
			nearest_hit: None,
			open_direction: Vec3::ZERO,
			open_rays: 0,
			sh: ShL1::default(),
		}
	}

	#[inline]
	pub fn request(&self) -> &TraceRequest {
		&self.request
	}

	#[inline]
	pub fn total_rays(&self) -> u32 {
		self.params.tile_size * self.params.tile_size
	}

	#[inline]
	pub fn rays_done(&self) -> u32 {
		self.next_texel
	}

	#[inline]
	pub fn is_done(&self) -> bool {
		self.next_texel >= self.total_rays()
	}

	/// Trace up to `max_rays` more texels. Returns true once every texel is
	/// traced.
	pub fn step<T: ProbeTracer + ?Sized>(&mut self, tracer: &T, max_rays: u32) -> bool {
		let size = self.params.tile_size;
		let end = self.next_texel.saturating_add(max_rays).min(self.total_rays());
		let weight = 4.0 * std::f32::consts::PI / self.total_rays() as f32;

		for texel in self.next_texel..end {
			let dir = texel_direction(texel % size, texel / size, size);
			let ray = Ray {
				origin: self.request.position,
				direction: dir,
				max_distance: self.params.max_distance,
			};
			let sample = tracer.trace_ray(&ray);
			let hit = sample.hit_distance.filter(|d| *d <= self.params.max_distance);

			if let Some(d) = hit {
				self.nearest_hit = Some(self.nearest_hit.map_or(d, |n| n.min(d)));
			}
			if hit.map_or(true, |d| d > self.params.ao_radius) {
				self.open_direction += dir;
				self.open_rays += 1;
			}
			self.sh.add(dir, sample.radiance, weight);

			let alpha = encode_signed_distance(hit, self.params.max_distance);
			self.texels
				.push([sample.radiance.x, sample.radiance.y, sample.radiance.z, alpha]);
		}
		self.next_texel = end;
		self.is_done()
	}

	/// Reduce the traced texels to a sample. Untraced texels (a job finished
	/// early) read as misses with no radiance.
	pub fn finish(mut self) -> ProbeSample {
		let total = self.total_rays() as usize;
		let miss_alpha = encode_signed_distance(None, self.params.max_distance);
		self.texels.resize(total, [0.0, 0.0, 0.0, miss_alpha]);

		let confidence = if total == 0 {
			0.0
		} else {
			self.open_rays as f32 / total as f32
		};
		let bent = self.open_direction.normalize_or_zero();

		ProbeSample {
			texels: self.texels,
			visibility: Visibility {
				direction_oct: oct_encode(bent),
				confidence,
			},
			hit_distance: self.nearest_hit.unwrap_or(-self.params.max_distance),
			sh: self.sh,
		}
	}

	/// Trace every remaining texel and reduce.
	pub fn run_to_completion<T: ProbeTracer + ?Sized>(mut self, tracer: &T) -> ProbeSample {
		let remaining = self.total_rays() - self.next_texel;
		self.step(tracer, remaining);
		self.finish()
	}
}

#[cfg(test)]
#[path = "job_test.rs"]
mod job_test;
