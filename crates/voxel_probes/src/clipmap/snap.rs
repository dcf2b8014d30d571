//! Origin snapping.
//!
//! `anchor = floor(camera / spacing) * spacing` per axis. The integer cell is
//! chosen so that `cell * spacing <= p < (cell + 1) * spacing` holds when
//! evaluated in f32, which keeps snapping idempotent even for spacings that
//! are not exactly representable.

use glam::{IVec3, UVec3, Vec3};

/// Integer cell containing `p` on a grid of the given spacing.
#[inline]
pub fn snap_cell_axis(p: f32, spacing: f32) -> i32 {
	let mut cell = (p / spacing).floor() as i32;
	if (cell as f32) * spacing > p {
		cell -= 1;
	} else if ((cell + 1) as f32) * spacing <= p {
		cell += 1;
	}
	cell
}

/// Integer anchor cell of a camera position.
#[inline]
pub fn snap_cell(camera: Vec3, spacing: f32) -> IVec3 {
	IVec3::new(
		snap_cell_axis(camera.x, spacing),
		snap_cell_axis(camera.y, spacing),
		snap_cell_axis(camera.z, spacing),
	)
}

/// World-space anchor: the camera snapped down to a multiple of `spacing`.
#[inline]
pub fn snap(camera: Vec3, spacing: f32) -> Vec3 {
	snap_cell(camera, spacing).as_vec3() * spacing
}

/// Minimum corner of the level window around an anchor.
#[inline]
pub fn origin(anchor: Vec3, resolution: UVec3, spacing: f32) -> Vec3 {
	anchor - (resolution / 2).as_vec3() * spacing
}

/// Integer counterpart of [`origin`].
#[inline]
pub fn origin_cell(anchor_cell: IVec3, resolution: UVec3) -> IVec3 {
	anchor_cell - (resolution / 2).as_ivec3()
}

#[cfg(test)]
#[path = "snap_test.rs"]
mod snap_test;
