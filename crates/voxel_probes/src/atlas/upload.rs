//! Atlas uploads - hand-off from the cache to the GPU-owning thread.
//!
//! The cache and scheduler produce [`AtlasUpload`]s on any thread and push
//! them through an [`AtlasUploadSender`]. The thread that owns the GPU
//! context drains the queue into an [`AtlasWriter`], proving ownership with
//! a [`GpuContextToken`]. Uploads built for an older layout version than the
//! last applied `Reset` are skipped.

use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, Sender};
use glam::UVec2;

use super::encode::{distance_texel, metadata_flags, metadata_texel, visibility_texel, DebugState};
use super::layout::AtlasLayout;
use super::packer::{RadianceAtlasPacker, TileRect};
use crate::cache::{SlotRef, SlotTag};
use crate::gpu::GpuContextToken;
use crate::trace::ProbeSample;

/// A freshly traced (or restored) probe.
#[derive(Clone, Debug)]
pub struct ProbeUpload {
	pub slot: SlotRef,
	pub layout_version: u32,
	pub tile: TileRect,
	pub scalar_texel: UVec2,
	pub sample: Arc<ProbeSample>,
	pub visibility: [f32; 4],
	pub distance: f32,
	pub metadata: [u32; 4],
	pub debug: [u8; 4],
}

/// A slot whose world cell changed and holds nothing valid yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InvalidateUpload {
	pub slot: SlotRef,
	pub layout_version: u32,
	pub scalar_texel: UVec2,
	pub metadata: [u32; 4],
	pub debug: [u8; 4],
}

/// Debug-atlas state change with no data attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugUpload {
	pub slot: SlotRef,
	pub layout_version: u32,
	pub scalar_texel: UVec2,
	pub debug: [u8; 4],
}

/// One unit of GPU work.
#[derive(Clone, Debug)]
pub enum AtlasUpload {
	Probe(ProbeUpload),
	Invalidate(InvalidateUpload),
	Debug(DebugUpload),
	/// (Re)allocate every atlas for a new layout.
	Reset(AtlasLayout),
}

impl AtlasUpload {
	/// Upload of a valid sample for the slot named by `tag`.
	pub fn probe(packer: &RadianceAtlasPacker, tag: SlotTag, sample: Arc<ProbeSample>, frame: u64) -> Self {
		AtlasUpload::Probe(ProbeUpload {
			slot: tag.slot(),
			layout_version: tag.layout_version,
			tile: packer.tile_rect(tag.storage, tag.level),
			scalar_texel: packer.scalar_texel(tag.storage, tag.level),
			visibility: visibility_texel(&sample.visibility),
			distance: distance_texel(&sample),
			metadata: metadata_texel(tag.generation, Some(frame), metadata_flags(true, false), tag.layout_version),
			debug: DebugState::Valid.color(),
			sample,
		})
	}

	/// Metadata invalidation for a reassigned slot.
	pub fn invalidate(packer: &RadianceAtlasPacker, slot: SlotRef, generation: u32, layout_version: u32) -> Self {
		AtlasUpload::Invalidate(InvalidateUpload {
			slot,
			layout_version,
			scalar_texel: packer.scalar_texel(slot.storage, slot.level),
			metadata: metadata_texel(generation, None, metadata_flags(false, true), layout_version),
			debug: DebugState::Dirty.color(),
		})
	}

	/// Debug colour for a slot, e.g. when its trace is dispatched.
	pub fn debug_state(packer: &RadianceAtlasPacker, slot: SlotRef, layout_version: u32, state: DebugState) -> Self {
		AtlasUpload::Debug(DebugUpload {
			slot,
			layout_version,
			scalar_texel: packer.scalar_texel(slot.storage, slot.level),
			debug: state.color(),
		})
	}

	/// Layout version the upload was built for.
	pub fn layout_version(&self) -> u32 {
		match self {
			AtlasUpload::Probe(p) => p.layout_version,
			AtlasUpload::Invalidate(i) => i.layout_version,
			AtlasUpload::Debug(d) => d.layout_version,
			AtlasUpload::Reset(layout) => layout.version,
		}
	}
}

/// Texture writes issued while draining the queue.
///
/// Implemented by the renderer backend. Byte slices are tightly packed:
/// `rgba32f` for radiance and visibility, `r32f` for distance, `rgba32u` for
/// metadata and `rgba8` for debug.
pub trait AtlasWriter {
	fn reallocate(&mut self, ctx: &GpuContextToken, layout: &AtlasLayout);
	fn write_radiance(&mut self, ctx: &GpuContextToken, rect: TileRect, rgba32f: &[u8]);
	fn write_visibility(&mut self, ctx: &GpuContextToken, texel: UVec2, rgba32f: &[u8]);
	fn write_distance(&mut self, ctx: &GpuContextToken, texel: UVec2, r32f: &[u8]);
	fn write_metadata(&mut self, ctx: &GpuContextToken, texel: UVec2, rgba32u: &[u8]);
	fn write_debug(&mut self, ctx: &GpuContextToken, texel: UVec2, rgba8: &[u8]);
}

/// Producer side of the upload queue. Cheap to clone and `Send`.
#[derive(Clone, Debug)]
pub struct AtlasUploadSender(Sender<AtlasUpload>);

impl AtlasUploadSender {
	pub fn push(&self, upload: AtlasUpload) {
		// Ignore send error (queue dropped = renderer gone)
		let _ = self.0.send(upload);
	}
}

/// Statistics from one drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
	pub probes: usize,
	pub invalidations: usize,
	pub debug_states: usize,
	pub resets: usize,
	/// Uploads built for an older layout.
	pub skipped_stale: usize,
}

/// Consumer side of the upload queue, owned by the GPU phase.
#[derive(Debug)]
pub struct AtlasUploadQueue {
	sender: Sender<AtlasUpload>,
	receiver: Receiver<AtlasUpload>,
	layout_version: Option<u32>,
}

impl AtlasUploadQueue {
	pub fn new() -> Self {
		let (sender, receiver) = channel::unbounded();
		Self {
			sender,
			receiver,
			layout_version: None,
		}
	}

	pub fn sender(&self) -> AtlasUploadSender {
		AtlasUploadSender(self.sender.clone())
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.receiver.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.receiver.is_empty()
	}

	/// Layout version of the last applied reset.
	#[inline]
	pub fn layout_version(&self) -> Option<u32> {
		self.layout_version
	}

	/// Apply every queued upload. Must run on the GPU-owning thread.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "atlas_upload::drain"))]
	pub fn drain<W: AtlasWriter + ?Sized>(&mut self, ctx: &GpuContextToken, writer: &mut W) -> DrainStats {
		let mut stats = DrainStats::default();
		while let Ok(upload) = self.receiver.try_recv() {
			if let AtlasUpload::Reset(layout) = &upload {
				writer.reallocate(ctx, layout);
				self.layout_version = Some(layout.version);
				stats.resets += 1;
				continue;
			}
			if self.layout_version.is_some_and(|v| v != upload.layout_version()) {
				stats.skipped_stale += 1;
				continue;
			}
			match upload {
				AtlasUpload::Probe(p) => {
					writer.write_radiance(ctx, p.tile, bytemuck::cast_slice(&p.sample.texels));
					writer.write_visibility(ctx, p.scalar_texel, bytemuck::bytes_of(&p.visibility));
					writer.write_distance(ctx, p.scalar_texel, bytemuck::bytes_of(&p.distance));
					writer.write_metadata(ctx, p.scalar_texel, bytemuck::bytes_of(&p.metadata));
					writer.write_debug(ctx, p.scalar_texel, bytemuck::bytes_of(&p.debug));
					stats.probes += 1;
				}
				AtlasUpload::Invalidate(i) => {
					writer.write_metadata(ctx, i.scalar_texel, bytemuck::bytes_of(&i.metadata));
					writer.write_debug(ctx, i.scalar_texel, bytemuck::bytes_of(&i.debug));
					stats.invalidations += 1;
				}
				AtlasUpload::Debug(d) => {
					writer.write_debug(ctx, d.scalar_texel, bytemuck::bytes_of(&d.debug));
					stats.debug_states += 1;
				}
				AtlasUpload::Reset(_) => {}
			}
		}
		stats
	}
}

impl Default for AtlasUploadQueue {
	fn default() -> Self {
		Self::new()
	}
}
