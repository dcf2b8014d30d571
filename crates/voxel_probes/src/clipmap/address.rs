//! World position ↔ clipmap coordinate transforms and ring-buffer index math.

use glam::{IVec3, UVec3, Vec3};
use smallvec::SmallVec;

use super::level::{ClipmapLevel, LevelWindow};
use crate::constants::MAX_LEVELS;

/// `((index % n) + n) % n` - non-negative for negative indices.
#[inline]
pub fn wrap_index(index: i32, n: u32) -> u32 {
	let n = n as i32;
	(((index % n) + n) % n) as u32
}

/// Component-wise [`wrap_index`].
#[inline]
pub fn wrap_ivec(index: IVec3, n: UVec3) -> UVec3 {
	UVec3::new(
		wrap_index(index.x, n.x),
		wrap_index(index.y, n.y),
		wrap_index(index.z, n.z),
	)
}

/// Floor division (rounds toward negative infinity).
#[inline]
pub fn div_floor(value: i32, divisor: i32) -> i32 {
	let q = value / divisor;
	if (value % divisor != 0) && ((value < 0) != (divisor < 0)) {
		q - 1
	} else {
		q
	}
}

/// Component-wise [`div_floor`].
#[inline]
pub fn div_floor_ivec(value: IVec3, divisor: i32) -> IVec3 {
	IVec3::new(
		div_floor(value.x, divisor),
		div_floor(value.y, divisor),
		div_floor(value.z, divisor),
	)
}

/// Level selection by camera distance.
///
/// `clamp(floor(log2(max(dist, base) / base)), 0, max_level)`; a point at the
/// camera maps to level 0.
pub fn select_level(pos: Vec3, camera: Vec3, base_spacing: f32, max_level: u32) -> u32 {
	let dist = pos.distance(camera);
	let ratio = dist.max(base_spacing) / base_spacing;
	let level = ratio.log2().floor();
	if level <= 0.0 {
		0
	} else {
		(level as u32).min(max_level)
	}
}

/// Integer probe index plus fractional offset inside a level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipmapCoord {
	/// Local index (window relative, may be outside `[0, N)`).
	pub index: IVec3,
	/// Offset inside the cell, each axis in `[0, 1)`.
	pub frac: Vec3,
}

impl ClipmapCoord {
	/// Continuous probe-unit coordinate (`index + frac`).
	#[inline]
	pub fn local(&self) -> Vec3 {
		self.index.as_vec3() + self.frac
	}

	/// True if the index addresses a probe of the level.
	#[inline]
	pub fn in_range(&self, resolution: UVec3) -> bool {
		self.index.cmpge(IVec3::ZERO).all() && self.index.cmplt(resolution.as_ivec3()).all()
	}
}

/// `local = (pos - origin) / spacing`, split into floor and fraction.
#[inline]
pub fn world_to_window(window: &LevelWindow, pos: Vec3) -> ClipmapCoord {
	let local = (pos - window.origin) / window.spacing;
	let floor = local.floor();
	ClipmapCoord {
		index: floor.as_ivec3(),
		frac: local - floor,
	}
}

/// Probe centre of a local index: `origin + (index + 0.5) * spacing`.
#[inline]
pub fn window_to_world(window: &LevelWindow, index: IVec3) -> Vec3 {
	window.origin + (index.as_vec3() + Vec3::splat(0.5)) * window.spacing
}

/// Camera-relative addressing across every level.
///
/// Windows are recomputed from the camera on [`ClipmapAddressor::set_camera`];
/// every query is a pure function of that camera and the level table.
#[derive(Clone, Debug)]
pub struct ClipmapAddressor {
	levels: Vec<ClipmapLevel>,
	camera: Vec3,
	windows: Vec<LevelWindow>,
}

impl ClipmapAddressor {
	pub fn new(levels: Vec<ClipmapLevel>, camera: Vec3) -> Self {
		let windows = levels.iter().map(|l| l.window(camera)).collect();
		Self {
			levels,
			camera,
			windows,
		}
	}

	/// Move the camera; returns the levels whose origin changed.
	pub fn set_camera(&mut self, camera: Vec3) -> SmallVec<[u32; MAX_LEVELS]> {
		self.camera = camera;
		let mut moved = SmallVec::new();
		for (level, window) in self.levels.iter().zip(self.windows.iter_mut()) {
			let next = level.window(camera);
			if next.origin_cell != window.origin_cell {
				moved.push(level.index);
			}
			*window = next;
		}
		moved
	}

	#[inline]
	pub fn camera(&self) -> Vec3 {
		self.camera
	}

	#[inline]
	pub fn levels(&self) -> &[ClipmapLevel] {
		&self.levels
	}

	#[inline]
	pub fn level_count(&self) -> u32 {
		self.levels.len() as u32
	}

	/// Current window of a level.
	#[inline]
	pub fn window(&self, level: u32) -> &LevelWindow {
		&self.windows[level as usize]
	}

	#[inline]
	pub fn windows(&self) -> &[LevelWindow] {
		&self.windows
	}

	/// Finest level whose spacing suits the distance from the camera.
	pub fn select_level(&self, pos: Vec3) -> u32 {
		let base = self.levels[0].base_spacing;
		select_level(pos, self.camera, base, self.level_count() - 1)
	}

	/// Index and fraction of `pos` inside a level.
	pub fn world_to_clipmap(&self, pos: Vec3, level: u32) -> ClipmapCoord {
		world_to_window(self.window(level), pos)
	}

	/// Probe centre of a local index.
	pub fn clipmap_to_world(&self, index: IVec3, level: u32) -> Vec3 {
		window_to_world(self.window(level), index)
	}

	/// Ring-wrapped storage index of a local index.
	pub fn storage_index(&self, index: IVec3, level: u32) -> UVec3 {
		let window = self.window(level);
		window.storage_of_cell(window.cell_of(index))
	}
}

#[cfg(test)]
#[path = "address_test.rs"]
mod address_test;
