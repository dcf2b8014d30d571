//! RadianceAtlasPacker - storage index → atlas texel.
//!
//! Placement is a pure function of `(storage index, level)`; there is no
//! indirection table:
//!
//! ```text
//!   tileU0 = (x + z * Nx) * S
//!   tileV0 = (y + L * Ny) * S
//!   texel  = (tileU0 + u, tileV0 + v)      u, v ∈ [0, S)
//! ```

use glam::{UVec2, UVec3, Vec3};

use super::layout::AtlasLayout;
use crate::error::LayoutError;
use crate::octahedral::direction_texel;

/// Rectangle of texels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileRect {
	pub origin: UVec2,
	pub size: UVec2,
}

impl TileRect {
	#[inline]
	pub fn contains(&self, texel: UVec2) -> bool {
		texel.cmpge(self.origin).all() && texel.cmplt(self.origin + self.size).all()
	}
}

/// Texel addressing for one [`AtlasLayout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadianceAtlasPacker {
	layout: AtlasLayout,
}

impl RadianceAtlasPacker {
	pub fn new(layout: AtlasLayout) -> Self {
		Self { layout }
	}

	#[inline]
	pub fn layout(&self) -> &AtlasLayout {
		&self.layout
	}

	/// Probe column/row in the scalar atlases; the radiance tile is this
	/// times `S`.
	#[inline]
	pub fn scalar_texel(&self, storage: UVec3, level: u32) -> UVec2 {
		let r = self.layout.resolution;
		UVec2::new(storage.x + storage.z * r.x, storage.y + level * r.y)
	}

	/// Top-left texel of a probe's tile.
	#[inline]
	pub fn tile_origin(&self, storage: UVec3, level: u32) -> UVec2 {
		self.scalar_texel(storage, level) * self.layout.tile_size
	}

	#[inline]
	pub fn tile_rect(&self, storage: UVec3, level: u32) -> TileRect {
		TileRect {
			origin: self.tile_origin(storage, level),
			size: UVec2::splat(self.layout.tile_size),
		}
	}

	/// Radiance texel `(u, v)` of a probe's tile.
	#[inline]
	pub fn texel(&self, storage: UVec3, level: u32, u: u32, v: u32) -> UVec2 {
		self.tile_origin(storage, level) + UVec2::new(u, v)
	}

	/// Radiance texel sampled for a direction.
	#[inline]
	pub fn direction_texel(&self, storage: UVec3, level: u32, dir: Vec3) -> UVec2 {
		let (u, v) = direction_texel(dir, self.layout.tile_size);
		self.texel(storage, level, u, v)
	}

	/// [`Self::texel`] with version and bounds checks.
	pub fn try_texel(&self, version: u32, storage: UVec3, level: u32, u: u32, v: u32) -> Result<UVec2, LayoutError> {
		self.layout.check_version(version)?;
		self.layout.check_slot(storage, level)?;
		let size = self.layout.tile_size;
		if u >= size || v >= size {
			return Err(LayoutError::TexelOutOfTile { u, v, size });
		}
		Ok(self.texel(storage, level, u, v))
	}

	/// [`Self::tile_rect`] with version and bounds checks.
	pub fn try_tile_rect(&self, version: u32, storage: UVec3, level: u32) -> Result<TileRect, LayoutError> {
		self.layout.check_version(version)?;
		self.layout.check_slot(storage, level)?;
		Ok(self.tile_rect(storage, level))
	}

	/// [`Self::scalar_texel`] with version and bounds checks.
	pub fn try_scalar_texel(&self, version: u32, storage: UVec3, level: u32) -> Result<UVec2, LayoutError> {
		self.layout.check_version(version)?;
		self.layout.check_slot(storage, level)?;
		Ok(self.scalar_texel(storage, level))
	}
}

#[cfg(test)]
#[path = "packer_test.rs"]
mod packer_test;
