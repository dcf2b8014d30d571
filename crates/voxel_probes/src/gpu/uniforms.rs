//! std140 uniform blocks shared with the probe shaders.
//!
//! ```text
//! binding 0  FrameUniforms        352 bytes
//! binding 1  WorldProbeUniforms   416 bytes
//! ```
//!
//! Every member is a 16-byte-aligned `vec4`/`ivec4`/`uvec4`/`mat4` (or an
//! array of them), so the Rust `#[repr(C)]` layout and std140 agree without
//! explicit padding fields. 3-vectors are widened to 4 components.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3};

use crate::clipmap::ClipmapAddressor;
use crate::config::{ClipmapConfig, RefreshPolicy};
use crate::constants::MAX_LEVELS;

/// Camera and global toggles (binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
	pub view: [[f32; 4]; 4],
	pub projection: [[f32; 4]; 4],
	pub view_projection: [[f32; 4]; 4],
	pub inverse_view_projection: [[f32; 4]; 4],
	/// `(w, h, 1/w, 1/h)`.
	pub screen_size: [f32; 4],
	/// `(Nx, Ny, Nz, levels)`.
	pub probe_grid: [u32; 4],
	/// `(world probes enabled, oct tile size, debug view, region size)`.
	pub int_flags: [i32; 4],
	/// `(blend_start, blend_width, max_trace_distance, ao_radius)`.
	pub float_flags: [f32; 4],
	pub sky_zenith: [f32; 4],
	pub sky_horizon: [f32; 4],
}

/// Per-level clipmap placement (binding 1).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct WorldProbeUniforms {
	pub sky_tint: [f32; 4],
	/// `(x, y, z, 1)`.
	pub camera_position: [f32; 4],
	/// World-space window origin per level, `w = 1` for active levels.
	pub origins: [[f32; 4]; MAX_LEVELS],
	/// Ring offset per level, `w` unused.
	pub ring_offsets: [[i32; 4]; MAX_LEVELS],
	/// `(spacing, 1/spacing, layout_version, policy)` per level; policy is
	/// 0 for forced refresh, 1 for reuse.
	pub level_params: [[f32; 4]; MAX_LEVELS],
}

const _: () = assert!(std::mem::size_of::<FrameUniforms>() == 352);
const _: () = assert!(std::mem::offset_of!(FrameUniforms, screen_size) == 256);
const _: () = assert!(std::mem::offset_of!(FrameUniforms, probe_grid) == 272);
const _: () = assert!(std::mem::offset_of!(FrameUniforms, sky_horizon) == 336);
const _: () = assert!(std::mem::size_of::<WorldProbeUniforms>() == 416);
const _: () = assert!(std::mem::offset_of!(WorldProbeUniforms, origins) == 32);
const _: () = assert!(std::mem::offset_of!(WorldProbeUniforms, ring_offsets) == 160);
const _: () = assert!(std::mem::offset_of!(WorldProbeUniforms, level_params) == 288);

#[inline]
fn vec4(v: [f32; 3], w: f32) -> [f32; 4] {
	[v[0], v[1], v[2], w]
}

impl FrameUniforms {
	/// Build the frame block. `debug_view` selects a probe debug
	/// visualisation (0 = off).
	pub fn new(view: Mat4, projection: Mat4, screen_size: UVec2, config: &ClipmapConfig, debug_view: u32) -> Self {
		let view_projection = projection * view;
		let size = screen_size.max(UVec2::ONE).as_vec2();
		let [nx, ny, nz] = config.resolution;
		Self {
			view: view.to_cols_array_2d(),
			projection: projection.to_cols_array_2d(),
			view_projection: view_projection.to_cols_array_2d(),
			inverse_view_projection: view_projection.inverse().to_cols_array_2d(),
			screen_size: [size.x, size.y, 1.0 / size.x, 1.0 / size.y],
			probe_grid: [nx, ny, nz, config.levels],
			int_flags: [
				config.enabled as i32,
				config.oct_tile_size as i32,
				debug_view as i32,
				config.region_size as i32,
			],
			float_flags: [
				config.blend_start,
				config.blend_width,
				config.max_trace_distance,
				config.ao_radius,
			],
			sky_zenith: vec4(config.sky_zenith, 1.0),
			sky_horizon: vec4(config.sky_horizon, 1.0),
		}
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		bytemuck::bytes_of(self)
	}
}

impl WorldProbeUniforms {
	/// Build the probe block from the current windows. Levels past
	/// `addressor.level_count()` stay zeroed.
	pub fn new(addressor: &ClipmapAddressor, config: &ClipmapConfig, layout_version: u32) -> Self {
		let mut uniforms = Self::zeroed();
		uniforms.sky_tint = vec4(config.sky_tint, 1.0);
		uniforms.camera_position = camera4(addressor.camera());

		for window in addressor.windows().iter().take(MAX_LEVELS) {
			let i = window.level as usize;
			uniforms.origins[i] = window.origin.extend(1.0).to_array();
			let ring = window.ring_offset().as_ivec3();
			uniforms.ring_offsets[i] = [ring.x, ring.y, ring.z, 0];
			let policy = match config.refresh_policy(window.level) {
				RefreshPolicy::ForceRefresh => 0.0,
				RefreshPolicy::ReuseCached => 1.0,
			};
			uniforms.level_params[i] = [window.spacing, 1.0 / window.spacing, layout_version as f32, policy];
		}
		uniforms
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		bytemuck::bytes_of(self)
	}
}

#[inline]
fn camera4(camera: Vec3) -> [f32; 4] {
	camera.extend(1.0).to_array()
}

#[cfg(test)]
#[path = "uniforms_test.rs"]
mod uniforms_test;
