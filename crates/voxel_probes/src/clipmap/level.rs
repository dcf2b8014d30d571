//! ClipmapLevel and LevelWindow.
//!
//! A level is immutable configuration. A window is that level placed around
//! a camera for one frame: anchor, origin and the equivalent integer cells.

use glam::{IVec3, UVec3, Vec3};

use super::address::wrap_ivec;
use super::snap;

/// Immutable per-level configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipmapLevel {
	/// Level index (0 = finest).
	pub index: u32,
	/// L0 spacing.
	pub base_spacing: f32,
	/// `base_spacing * 2^index`.
	pub spacing: f32,
	/// Probes per axis (same on every level).
	pub resolution: UVec3,
}

impl ClipmapLevel {
	pub fn new(base_spacing: f32, index: u32, resolution: UVec3) -> Self {
		Self {
			index,
			base_spacing,
			spacing: base_spacing * (1u32 << index) as f32,
			resolution,
		}
	}

	/// World extent spanned by the probe centres: `spacing * (N - 1)`.
	#[inline]
	pub fn coverage(&self) -> Vec3 {
		(self.resolution.as_vec3() - Vec3::ONE) * self.spacing
	}

	/// Total probes on this level.
	#[inline]
	pub fn probe_count(&self) -> usize {
		self.resolution.element_product() as usize
	}

	/// Place the level around a camera position.
	pub fn window(&self, camera: Vec3) -> LevelWindow {
		let anchor_cell = snap::snap_cell(camera, self.spacing);
		let anchor = anchor_cell.as_vec3() * self.spacing;
		LevelWindow {
			level: self.index,
			spacing: self.spacing,
			resolution: self.resolution,
			anchor,
			origin: snap::origin(anchor, self.resolution, self.spacing),
			anchor_cell,
			origin_cell: snap::origin_cell(anchor_cell, self.resolution),
		}
	}
}

/// A level's window for one camera position.
///
/// Global cell `g` covers world `[g * spacing, (g + 1) * spacing)`; the window
/// holds cells `origin_cell .. origin_cell + resolution`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelWindow {
	pub level: u32,
	pub spacing: f32,
	pub resolution: UVec3,
	pub anchor: Vec3,
	pub origin: Vec3,
	pub anchor_cell: IVec3,
	pub origin_cell: IVec3,
}

impl LevelWindow {
	/// One past the last cell of the window.
	#[inline]
	pub fn end_cell(&self) -> IVec3 {
		self.origin_cell + self.resolution.as_ivec3()
	}

	#[inline]
	pub fn contains_cell(&self, cell: IVec3) -> bool {
		cell.cmpge(self.origin_cell).all() && cell.cmplt(self.end_cell()).all()
	}

	/// Local (window-relative) index of a global cell.
	#[inline]
	pub fn local_index(&self, cell: IVec3) -> IVec3 {
		cell - self.origin_cell
	}

	/// Global cell of a local index.
	#[inline]
	pub fn cell_of(&self, local: IVec3) -> IVec3 {
		self.origin_cell + local
	}

	/// Ring offset applied to local indices to reach storage indices.
	#[inline]
	pub fn ring_offset(&self) -> UVec3 {
		wrap_ivec(self.origin_cell, self.resolution)
	}

	/// Physical storage index of a global cell.
	#[inline]
	pub fn storage_of_cell(&self, cell: IVec3) -> UVec3 {
		wrap_ivec(cell, self.resolution)
	}

	/// Global cell currently stored at a storage index.
	pub fn cell_at_storage(&self, storage: UVec3) -> IVec3 {
		let local = wrap_ivec(storage.as_ivec3() - self.origin_cell, self.resolution);
		self.origin_cell + local.as_ivec3()
	}

	/// World-space probe centre of a global cell.
	#[inline]
	pub fn cell_center(&self, cell: IVec3) -> Vec3 {
		self.origin + (self.local_index(cell).as_vec3() + Vec3::splat(0.5)) * self.spacing
	}

	/// Iterate over every global cell in the window (x fastest).
	pub fn cells(&self) -> impl Iterator<Item = IVec3> + '_ {
		let res = self.resolution;
		(0..res.z).flat_map(move |z| {
			(0..res.y).flat_map(move |y| {
				(0..res.x).map(move |x| self.origin_cell + UVec3::new(x, y, z).as_ivec3())
			})
		})
	}
}
