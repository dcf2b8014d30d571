//! AtlasLayout - atlas dimensions and the layout version.
//!
//! ```text
//!   radiance atlas: W = Nx * Nz * S    H = Ny * levels * S
//!   scalar atlases: W = Nx * Nz        H = Ny * levels
//! ```

use glam::{UVec2, UVec3};

use crate::config::ClipmapConfig;
use crate::error::LayoutError;

/// Shape of every probe atlas for one layout version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtlasLayout {
	pub resolution: UVec3,
	pub tile_size: u32,
	pub levels: u32,
	/// Bumped on every change that moves texels; addressing derived from an
	/// older version is stale.
	pub version: u32,
}

impl AtlasLayout {
	pub fn new(resolution: UVec3, tile_size: u32, levels: u32, version: u32) -> Self {
		Self {
			resolution,
			tile_size,
			levels,
			version,
		}
	}

	pub fn from_config(config: &ClipmapConfig, version: u32) -> Self {
		Self::new(config.resolution_vec(), config.oct_tile_size, config.levels, version)
	}

	/// Radiance atlas size in texels.
	#[inline]
	pub fn radiance_size(&self) -> UVec2 {
		self.scalar_size() * self.tile_size
	}

	/// Size of each scalar atlas (one texel per probe).
	#[inline]
	pub fn scalar_size(&self) -> UVec2 {
		let r = self.resolution;
		UVec2::new(r.x * r.z, r.y * self.levels)
	}

	/// Probes across all levels.
	#[inline]
	pub fn probe_count(&self) -> usize {
		self.resolution.element_product() as usize * self.levels as usize
	}

	/// Fail if addressing was derived from another layout version.
	#[inline]
	pub fn check_version(&self, held: u32) -> Result<(), LayoutError> {
		if held == self.version {
			Ok(())
		} else {
			Err(LayoutError::Stale {
				held,
				current: self.version,
			})
		}
	}

	/// Fail if a storage index or level is outside this layout.
	#[inline]
	pub fn check_slot(&self, storage: UVec3, level: u32) -> Result<(), LayoutError> {
		if level < self.levels && storage.cmplt(self.resolution).all() {
			Ok(())
		} else {
			Err(LayoutError::OutOfBounds {
				index: storage.to_array(),
				level,
				resolution: self.resolution.to_array(),
				levels: self.levels,
			})
		}
	}
}
