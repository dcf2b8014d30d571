//! Probe atlases: layout, texel addressing, texel encodings and the upload
//! queue drained on the GPU-owning thread.

pub mod encode;
pub mod layout;
pub mod packer;
pub mod upload;

pub use encode::{
	decode_signed_distance, distance_texel, encode_signed_distance, metadata_flags, metadata_texel, visibility_texel,
	DebugState,
};
pub use layout::AtlasLayout;
pub use packer::{RadianceAtlasPacker, TileRect};
pub use upload::{
	AtlasUpload, AtlasUploadQueue, AtlasUploadSender, AtlasWriter, DebugUpload, DrainStats, InvalidateUpload, ProbeUpload,
};
