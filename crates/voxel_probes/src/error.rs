//! Error types.
//!
//! Configuration errors are fatal and surface before any frame runs. Layout
//! errors are recoverable: the holder re-derives its addressing from the
//! current layout and retries.

use std::path::PathBuf;

use thiserror::Error;

/// Rejected clipmap configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("levels must be in 1..={max}, got {got}")]
	LevelCount { got: u32, max: usize },

	#[error("resolution must be positive on every axis, got {0:?}")]
	Resolution([u32; 3]),

	#[error("oct_tile_size must be positive")]
	OctTileSize,

	#[error("resolution {got:?} exceeds {max} probes on some axis")]
	ResolutionTooLarge { got: [u32; 3], max: u32 },

	#[error("radiance atlas would be {width}x{height} texels, limit is {max}")]
	AtlasTooLarge { width: u64, height: u64, max: u32 },

	#[error("base_spacing must be finite and positive, got {0}")]
	BaseSpacing(f32),

	#[error("region_size {region} must be positive and divide resolution {resolution:?}")]
	RegionSize { region: u32, resolution: [u32; 3] },

	#[error("max_trace_distance must be finite and positive, got {0}")]
	MaxTraceDistance(f32),

	#[error("ao_radius must be finite and non-negative, got {0}")]
	AoRadius(f32),

	#[error("blend_start and blend_width must be finite with blend_width >= 0, got ({start}, {width})")]
	Blend { start: f32, width: f32 },

	#[error("level_policies lists {got} entries for {levels} levels")]
	PolicyCount { got: usize, levels: u32 },

	#[error("failed to read config file {}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config TOML")]
	Parse(#[from] toml::de::Error),
}

/// Atlas addressing failure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
	#[error("atlas layout version {held} is stale (current {current})")]
	Stale { held: u32, current: u32 },

	#[error("storage index {index:?} at level {level} is outside {resolution:?} x {levels} levels")]
	OutOfBounds {
		index: [u32; 3],
		level: u32,
		resolution: [u32; 3],
		levels: u32,
	},

	#[error("texel ({u}, {v}) is outside the {size}x{size} tile")]
	TexelOutOfTile { u: u32, v: u32, size: u32 },
}

/// Failure reported by a program backend.
#[derive(Debug, Error)]
pub enum ProgramError {
	#[error("failed to compile {pass} program: {message}")]
	Compile { pass: &'static str, message: String },
}
