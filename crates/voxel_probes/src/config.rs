//! ClipmapConfig - probe grid configuration, validation and invalidation
//! scope.

use std::path::Path;

use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::clipmap::ClipmapLevel;
use crate::constants::*;
use crate::error::ConfigError;

/// How a level treats regions that enter its window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
	/// Every entering region is retraced from scratch.
	ForceRefresh,
	/// Regions that left the window are kept and restored on re-entry until
	/// explicitly invalidated.
	ReuseCached,
}

/// Configuration for the probe clipmap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipmapConfig {
	/// Master toggle. When false no probe work runs and shading must not
	/// sample the atlas.
	pub enabled: bool,

	/// Number of clipmap levels (L0 finest).
	pub levels: u32,

	/// Probes per axis, identical on every level.
	pub resolution: [u32; 3],

	/// Octahedral tile edge in texels.
	pub oct_tile_size: u32,

	/// Probe slots retraced per frame.
	pub atlas_texels_per_update: u32,

	/// L0 probe spacing in world units.
	pub base_spacing: f32,

	/// Cross-level blend band start, in probe units from the grid edge.
	pub blend_start: f32,

	/// Cross-level blend band width, in probe units.
	pub blend_width: f32,

	/// Levels `< near_levels` use [`RefreshPolicy::ForceRefresh`].
	pub near_levels: u32,

	/// Optional per-level override (one entry per level).
	pub level_policies: Vec<RefreshPolicy>,

	/// Streaming region edge, in probes. Must divide every resolution axis.
	pub region_size: u32,

	/// Ray length; misses encode `-ln(max_trace_distance + 1)`.
	pub max_trace_distance: f32,

	/// Hits closer than this count as short-range occlusion.
	pub ao_radius: f32,

	/// Frames after which a dirty slot jumps the queue (0 disables).
	pub starvation_frames: u32,

	/// Evicted far-level regions kept in memory per level.
	pub retained_regions_per_level: usize,

	/// Sky fallback colour straight up.
	pub sky_zenith: [f32; 3],

	/// Sky fallback colour at the horizon.
	pub sky_horizon: [f32; 3],

	/// Tint applied to sky radiance picked up by probes.
	pub sky_tint: [f32; 3],
}

impl Default for ClipmapConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			levels: 4,
			resolution: DEFAULT_RESOLUTION,
			oct_tile_size: DEFAULT_OCT_TILE_SIZE,
			atlas_texels_per_update: DEFAULT_UPDATE_BUDGET,
			base_spacing: DEFAULT_BASE_SPACING,
			blend_start: DEFAULT_BLEND_START,
			blend_width: DEFAULT_BLEND_WIDTH,
			near_levels: DEFAULT_NEAR_LEVELS,
			level_policies: Vec::new(),
			region_size: DEFAULT_REGION_SIZE,
			max_trace_distance: DEFAULT_MAX_TRACE_DISTANCE,
			ao_radius: DEFAULT_AO_RADIUS,
			starvation_frames: DEFAULT_STARVATION_FRAMES,
			retained_regions_per_level: DEFAULT_RETAINED_REGIONS,
			sky_zenith: [0.35, 0.55, 0.95],
			sky_horizon: [0.75, 0.85, 1.0],
			sky_tint: [1.0, 1.0, 1.0],
		}
	}
}

impl ClipmapConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse and validate a TOML document. Missing keys take defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: ClipmapConfig = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Load and validate a TOML file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&source)
	}

	/// Reject configurations that would produce degenerate grids or atlases.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.levels == 0 || self.levels as usize > MAX_LEVELS {
			return Err(ConfigError::LevelCount {
				got: self.levels,
				max: MAX_LEVELS,
			});
		}
		if self.resolution.iter().any(|&n| n == 0) {
			return Err(ConfigError::Resolution(self.resolution));
		}
		if self.resolution.iter().any(|&n| n > MAX_RESOLUTION) {
			return Err(ConfigError::ResolutionTooLarge {
				got: self.resolution,
				max: MAX_RESOLUTION,
			});
		}
		if self.oct_tile_size == 0 {
			return Err(ConfigError::OctTileSize);
		}
		let [nx, ny, nz] = self.resolution.map(u64::from);
		let tile = u64::from(self.oct_tile_size);
		let width = nx * nz * tile;
		let height = ny * u64::from(self.levels) * tile;
		if width > u64::from(MAX_ATLAS_DIMENSION) || height > u64::from(MAX_ATLAS_DIMENSION) {
			return Err(ConfigError::AtlasTooLarge {
				width,
				height,
				max: MAX_ATLAS_DIMENSION,
			});
		}
		if !(self.base_spacing.is_finite() && self.base_spacing > 0.0) {
			return Err(ConfigError::BaseSpacing(self.base_spacing));
		}
		if self.region_size == 0 || self.resolution.iter().any(|&n| n % self.region_size != 0) {
			return Err(ConfigError::RegionSize {
				region: self.region_size,
				resolution: self.resolution,
			});
		}
		if !(self.max_trace_distance.is_finite() && self.max_trace_distance > 0.0) {
			return Err(ConfigError::MaxTraceDistance(self.max_trace_distance));
		}
		if !(self.ao_radius.is_finite() && self.ao_radius >= 0.0) {
			return Err(ConfigError::AoRadius(self.ao_radius));
		}
		if !(self.blend_start.is_finite() && self.blend_width.is_finite() && self.blend_width >= 0.0) {
			return Err(ConfigError::Blend {
				start: self.blend_start,
				width: self.blend_width,
			});
		}
		if !self.level_policies.is_empty() && self.level_policies.len() != self.levels as usize {
			return Err(ConfigError::PolicyCount {
				got: self.level_policies.len(),
				levels: self.levels,
			});
		}
		Ok(())
	}

	/// Resolution as a vector.
	#[inline]
	pub fn resolution_vec(&self) -> UVec3 {
		UVec3::from_array(self.resolution)
	}

	/// Coarsest level index.
	#[inline]
	pub fn max_level(&self) -> u32 {
		self.levels.saturating_sub(1)
	}

	/// Immutable description of one level.
	#[inline]
	pub fn level(&self, index: u32) -> ClipmapLevel {
		ClipmapLevel::new(self.base_spacing, index, self.resolution_vec())
	}

	/// All levels, finest first.
	pub fn clipmap_levels(&self) -> Vec<ClipmapLevel> {
		(0..self.levels).map(|l| self.level(l)).collect()
	}

	/// Refresh policy for a level (override first, then the near/far split).
	pub fn refresh_policy(&self, level: u32) -> RefreshPolicy {
		if let Some(policy) = self.level_policies.get(level as usize) {
			return *policy;
		}
		if level < self.near_levels {
			RefreshPolicy::ForceRefresh
		} else {
			RefreshPolicy::ReuseCached
		}
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn with_levels(mut self, levels: u32) -> Self {
		self.levels = levels;
		self
	}

	pub fn with_resolution(mut self, resolution: [u32; 3]) -> Self {
		self.resolution = resolution;
		self
	}

	pub fn with_oct_tile_size(mut self, size: u32) -> Self {
		self.oct_tile_size = size;
		self
	}

	pub fn with_update_budget(mut self, slots: u32) -> Self {
		self.atlas_texels_per_update = slots;
		self
	}

	pub fn with_base_spacing(mut self, spacing: f32) -> Self {
		self.base_spacing = spacing;
		self
	}

	pub fn with_blend(mut self, start: f32, width: f32) -> Self {
		self.blend_start = start;
		self.blend_width = width;
		self
	}

	pub fn with_near_levels(mut self, near_levels: u32) -> Self {
		self.near_levels = near_levels;
		self
	}

	pub fn with_level_policies(mut self, policies: Vec<RefreshPolicy>) -> Self {
		self.level_policies = policies;
		self
	}

	pub fn with_region_size(mut self, size: u32) -> Self {
		self.region_size = size;
		self
	}

	pub fn with_max_trace_distance(mut self, distance: f32) -> Self {
		self.max_trace_distance = distance;
		self
	}

	pub fn with_starvation_frames(mut self, frames: u32) -> Self {
		self.starvation_frames = frames;
		self
	}

	pub fn with_retained_regions(mut self, count: usize) -> Self {
		self.retained_regions_per_level = count;
		self
	}
}

/// How much cached probe state a configuration change invalidates.
///
/// Ordered weakest to strongest; when several fields change the strongest
/// scope applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvalidationScope {
	/// Nothing cached depends on the changed fields.
	None,
	/// Refresh policies changed. Retained pools of levels that switched to
	/// forced refresh are dropped.
	Policy,
	/// Stored samples are numerically stale. Every resident slot is retraced,
	/// addressing is untouched.
	Retrace,
	/// Atlas layout or probe positions changed. Layout version bumps and the
	/// cache is rebuilt from scratch.
	Rebuild,
}

impl InvalidationScope {
	/// Total function from a config diff to the scope it invalidates.
	pub fn between(old: &ClipmapConfig, new: &ClipmapConfig) -> Self {
		let mut scope = InvalidationScope::None;

		let layout_changed = old.levels != new.levels
			|| old.resolution != new.resolution
			|| old.oct_tile_size != new.oct_tile_size
			|| old.region_size != new.region_size
			|| old.base_spacing.to_bits() != new.base_spacing.to_bits();
		if layout_changed {
			return InvalidationScope::Rebuild;
		}

		if old.max_trace_distance.to_bits() != new.max_trace_distance.to_bits()
			|| old.ao_radius.to_bits() != new.ao_radius.to_bits()
		{
			scope = scope.max(InvalidationScope::Retrace);
		}

		let policy_changed = old.near_levels != new.near_levels
			|| old.level_policies != new.level_policies
			|| old.retained_regions_per_level != new.retained_regions_per_level;
		if policy_changed {
			scope = scope.max(InvalidationScope::Policy);
		}

		scope
	}
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
