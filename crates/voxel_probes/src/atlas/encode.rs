//! Texel encodings for the radiance and scalar atlases.
//!
//! Radiance alpha is a signed log distance:
//!
//! ```text
//!   hit at d:  +ln(d + 1)          (>= 0)
//!   miss:      -ln(max_dist + 1)   (< 0)
//! ```

use crate::constants::{META_FLAG_DIRTY, META_FLAG_VALID};
use crate::trace::{ProbeSample, Visibility};

/// Radiance-tile alpha for a ray.
#[inline]
pub fn encode_signed_distance(hit: Option<f32>, max_distance: f32) -> f32 {
	match hit {
		Some(d) => (d.max(0.0) + 1.0).ln(),
		None => -(max_distance + 1.0).ln(),
	}
}

/// Inverse of [`encode_signed_distance`]: `Some(distance)` for hits, `None`
/// for misses.
#[inline]
pub fn decode_signed_distance(alpha: f32) -> Option<f32> {
	if alpha >= 0.0 {
		Some(alpha.exp() - 1.0)
	} else {
		None
	}
}

/// Visibility atlas texel: `(oct.x, oct.y, confidence, 1)`.
#[inline]
pub fn visibility_texel(visibility: &Visibility) -> [f32; 4] {
	[
		visibility.direction_oct.x,
		visibility.direction_oct.y,
		visibility.confidence,
		1.0,
	]
}

/// Distance atlas texel: the signed nearest-hit distance.
#[inline]
pub fn distance_texel(sample: &ProbeSample) -> f32 {
	sample.hit_distance
}

/// Metadata atlas texel: `(generation, last_updated_frame, flags, layout_version)`.
#[inline]
pub fn metadata_texel(generation: u32, last_updated_frame: Option<u64>, flags: u32, layout_version: u32) -> [u32; 4] {
	[
		generation,
		last_updated_frame.map_or(0, |f| f as u32),
		flags,
		layout_version,
	]
}

/// Metadata flags for a slot.
#[inline]
pub fn metadata_flags(valid: bool, dirty: bool) -> u32 {
	let mut flags = 0;
	if valid {
		flags |= META_FLAG_VALID;
	}
	if dirty {
		flags |= META_FLAG_DIRTY;
	}
	flags
}

/// Slot state shown in the debug atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DebugState {
	Empty,
	Dirty,
	InFlight,
	Valid,
}

impl DebugState {
	pub fn color(self) -> [u8; 4] {
		match self {
			DebugState::Empty => [0, 0, 0, 0],
			DebugState::Dirty => [255, 64, 0, 255],
			DebugState::InFlight => [255, 220, 0, 255],
			DebugState::Valid => [0, 200, 80, 255],
		}
	}
}
