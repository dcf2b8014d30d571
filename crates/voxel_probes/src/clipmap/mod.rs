//! Camera-centred clipmap geometry: snapping, per-level windows, world ↔
//! clipmap addressing and the cross-level blend.

pub mod address;
pub mod blend;
pub mod level;
pub mod snap;

pub use address::{select_level, wrap_index, wrap_ivec, ClipmapAddressor, ClipmapCoord};
pub use blend::{CrossLevelBlender, Lerp};
pub use level::{ClipmapLevel, LevelWindow};
pub use snap::{origin, snap};
