//! Octahedral direction mapping.
//!
//! The unit sphere is projected onto the octahedron `|x| + |y| + |z| = 1`,
//! the lower hemisphere folded over the diagonals, and the result mapped to
//! `[0, 1]²`. Each probe tile is `S×S` texels of this square.

use glam::{Vec2, Vec3};

#[inline]
fn sign_not_zero(v: Vec2) -> Vec2 {
	Vec2::new(
		if v.x >= 0.0 { 1.0 } else { -1.0 },
		if v.y >= 0.0 { 1.0 } else { -1.0 },
	)
}

/// Unit direction to octahedral coordinates in `[0, 1]²`.
pub fn oct_encode(dir: Vec3) -> Vec2 {
	let l1 = dir.x.abs() + dir.y.abs() + dir.z.abs();
	if l1 <= f32::EPSILON {
		return Vec2::splat(0.5);
	}
	let n = dir / l1;
	let mut p = Vec2::new(n.x, n.y);
	if n.z < 0.0 {
		p = (Vec2::ONE - Vec2::new(p.y.abs(), p.x.abs())) * sign_not_zero(p);
	}
	p * 0.5 + Vec2::splat(0.5)
}

/// Octahedral coordinates in `[0, 1]²` to a unit direction.
pub fn oct_decode(uv: Vec2) -> Vec3 {
	let f = uv * 2.0 - Vec2::ONE;
	let mut n = Vec3::new(f.x, f.y, 1.0 - f.x.abs() - f.y.abs());
	let t = (-n.z).max(0.0);
	n.x += if n.x >= 0.0 { -t } else { t };
	n.y += if n.y >= 0.0 { -t } else { t };
	n.normalize()
}

/// Direction through the centre of texel `(u, v)` of an `S×S` tile.
#[inline]
pub fn texel_direction(u: u32, v: u32, tile_size: u32) -> Vec3 {
	let uv = (Vec2::new(u as f32, v as f32) + Vec2::splat(0.5)) / tile_size as f32;
	oct_decode(uv)
}

/// Texel of an `S×S` tile containing a direction.
#[inline]
pub fn direction_texel(dir: Vec3, tile_size: u32) -> (u32, u32) {
	let uv = oct_encode(dir) * tile_size as f32;
	let max = (tile_size - 1) as f32;
	(uv.x.clamp(0.0, max) as u32, uv.y.clamp(0.0, max) as u32)
}

#[cfg(test)]
#[path = "octahedral_test.rs"]
mod octahedral_test;
