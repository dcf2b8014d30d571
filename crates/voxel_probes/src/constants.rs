//! Grid, atlas and uniform-block constants for the probe clipmap.
//!
//! # Clipmap Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PROBE CLIPMAP (one axis)                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  L2  ●───────────●───────────●───────────●───────────●   spacing = 4s   │
//! │  L1  ●─────●─────●─────●─────●─────●─────●─────●─────●   spacing = 2s   │
//! │  L0  ●──●──●──●──●──●──●──●──●──●──●──●──●──●──●──●──●   spacing = s    │
//! │                          ▲                                              │
//! │                        camera                                           │
//! │                                                                         │
//! │  Every level holds the same N probes per axis; only the spacing grows. │
//! │  anchor = floor(camera / spacing) * spacing                             │
//! │  origin = anchor - (N / 2) * spacing                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Atlas Layout
//!
//! ```text
//!          U →  (x + z * Nx) * S
//!        ┌──────┬──────┬──────┬─── ··· ───┐
//!   V    │ z=0  │ z=0  │      │           │  level 0 rows: y ∈ [0, Ny)
//!   ↓    │ x=0  │ x=1  │ ...  │           │
//!        ├──────┼──────┼──────┼─── ··· ───┤
//!        │      │      │      │           │  level 1 rows: y + Ny
//!        └──────┴──────┴──────┴─── ··· ───┘
//!   (y + L * Ny) * S
//! ```
//!
//! One `S×S` octahedral tile per probe in the radiance atlas; one texel per
//! probe in every scalar atlas.

/// Maximum number of clipmap levels (bounded by the uniform block arrays).
pub const MAX_LEVELS: usize = 8;

/// Largest probe count per axis a level may have.
pub const MAX_RESOLUTION: u32 = 256;

/// Largest edge, in texels, of any probe atlas.
pub const MAX_ATLAS_DIMENSION: u32 = 16384;

/// Default probes per axis on every level.
pub const DEFAULT_RESOLUTION: [u32; 3] = [16, 16, 16];

/// Default octahedral tile edge in texels.
pub const DEFAULT_OCT_TILE_SIZE: u32 = 8;

/// Default edge of a streaming region, in probes.
pub const DEFAULT_REGION_SIZE: u32 = 4;

/// Default finest-level probe spacing in world units.
pub const DEFAULT_BASE_SPACING: f32 = 1.0;

/// Default number of probe slots retraced per frame.
pub const DEFAULT_UPDATE_BUDGET: u32 = 256;

/// Default ray length in world units.
pub const DEFAULT_MAX_TRACE_DISTANCE: f32 = 64.0;

/// Default radius for the short-range occlusion term.
pub const DEFAULT_AO_RADIUS: f32 = 2.0;

/// Default cross-level blend band start, in probe units.
pub const DEFAULT_BLEND_START: f32 = 1.0;

/// Default cross-level blend band width, in probe units.
pub const DEFAULT_BLEND_WIDTH: f32 = 2.0;

/// Levels below this index force a full refresh of entering regions.
pub const DEFAULT_NEAR_LEVELS: u32 = 2;

/// Frames a slot may stay dirty before it is promoted ahead of all others.
pub const DEFAULT_STARVATION_FRAMES: u32 = 16;

/// Evicted far-level regions kept for reuse, per level.
pub const DEFAULT_RETAINED_REGIONS: usize = 64;

/// Uniform binding point of the per-frame block.
pub const FRAME_UNIFORM_BINDING: u32 = 0;

/// Uniform binding point of the world-probe block.
pub const WORLD_PROBE_UNIFORM_BINDING: u32 = 1;

/// Real spherical harmonic band 0 constant: 1 / (2 * sqrt(pi)).
pub const SH_C0: f32 = 0.282_094_8;

/// Real spherical harmonic band 1 constant: sqrt(3) / (2 * sqrt(pi)).
pub const SH_C1: f32 = 0.488_602_5;

/// Metadata texel flag: slot holds a sample valid for its current world cell.
pub const META_FLAG_VALID: u32 = 1 << 0;

/// Metadata texel flag: slot is dirty and waiting for a retrace.
pub const META_FLAG_DIRTY: u32 = 1 << 1;

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
