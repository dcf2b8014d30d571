//! GPU-facing contracts: the context token, uniform blocks and program
//! defines. Nothing here talks to a graphics API; the renderer implements
//! [`ProgramBackend`] and [`crate::atlas::AtlasWriter`].

pub mod context;
pub mod programs;
pub mod uniforms;

pub use context::GpuContextToken;
pub use programs::{DefineSet, ProbePass, ProbePrograms, ProgramBackend};
pub use uniforms::{FrameUniforms, WorldProbeUniforms};
