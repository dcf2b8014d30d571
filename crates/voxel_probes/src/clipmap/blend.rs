//! Cross-level blend weight.
//!
//! ```text
//!   probe units from the outermost probe centres
//!   0.5                                         N - 0.5
//!    │◄─ start ─►│◄── width ──►│                   │
//!    │  blend=0  │   ramp 0→1  │      blend = 1    │
//!    └───────────┴─────────────┴───────────────────┘
//!          coarser level ─────────────► this level
//! ```
//!
//! Near the edge of a level's window the sample fades toward the next
//! coarser level so the transition between levels has no visible seam.

use glam::{UVec3, Vec3, Vec4};

use super::address::ClipmapAddressor;

/// Linear interpolation used when blending two levels' samples.
pub trait Lerp: Copy {
	fn lerp_to(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
	#[inline]
	fn lerp_to(self, other: Self, t: f32) -> Self {
		self + (other - self) * t
	}
}

impl Lerp for Vec3 {
	#[inline]
	fn lerp_to(self, other: Self, t: f32) -> Self {
		self.lerp(other, t)
	}
}

impl Lerp for Vec4 {
	#[inline]
	fn lerp_to(self, other: Self, t: f32) -> Self {
		self.lerp(other, t)
	}
}

/// Minimum distance, in probe units, from `local` to the outermost probe
/// centres of an `N`-probe window (faces at `0.5` and `N - 0.5`). Clamped to 0.
#[inline]
pub fn edge_distance(local: Vec3, resolution: UVec3) -> f32 {
	let lo = local - Vec3::splat(0.5);
	let hi = resolution.as_vec3() - Vec3::splat(0.5) - local;
	lo.min(hi).min_element().max(0.0)
}

/// Stateless blend weight between a level and the next coarser one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossLevelBlender {
	pub blend_start: f32,
	pub blend_width: f32,
}

impl CrossLevelBlender {
	pub fn new(blend_start: f32, blend_width: f32) -> Self {
		Self {
			blend_start,
			blend_width,
		}
	}

	/// Weight of level `level` (1 = all this level, 0 = all the coarser one).
	///
	/// The coarsest level has nothing to fade into and always returns 1.
	pub fn weight(&self, local: Vec3, resolution: UVec3, level: u32, max_level: u32) -> f32 {
		if level >= max_level {
			return 1.0;
		}
		let edge = edge_distance(local, resolution);
		if self.blend_width <= 0.0 {
			return if edge >= self.blend_start { 1.0 } else { 0.0 };
		}
		((edge - self.blend_start) / self.blend_width).clamp(0.0, 1.0)
	}

	/// `lerp(coarse, fine, weight)`.
	#[inline]
	pub fn blend<T: Lerp>(&self, coarse: T, fine: T, weight: f32) -> T {
		coarse.lerp_to(fine, weight)
	}

	/// Blend the samples of the level selected for `pos` and the one above it.
	///
	/// `fetch(level)` returns the (already interpolated) sample of a level;
	/// the coarser level is only fetched when its weight is non-zero.
	pub fn sample<T, F>(&self, addressor: &ClipmapAddressor, pos: Vec3, mut fetch: F) -> T
	where
		T: Lerp,
		F: FnMut(u32) -> T,
	{
		let level = addressor.select_level(pos);
		let max_level = addressor.level_count() - 1;
		let window = addressor.window(level);
		let local = addressor.world_to_clipmap(pos, level).local();
		let weight = self.weight(local, window.resolution, level, max_level);

		let fine = fetch(level);
		if weight >= 1.0 {
			return fine;
		}
		let coarse = fetch(level + 1);
		self.blend(coarse, fine, weight)
	}
}

#[cfg(test)]
#[path = "blend_test.rs"]
mod blend_test;
