//! voxel_probes - Camera-centred world-space light probe clipmap
//!
//! This crate keeps a set of nested probe grids (a clipmap) centred on the
//! camera, streams them as the camera moves, retraces a budgeted number of
//! probes per frame against an external voxel tracer and packs the results
//! into GPU atlases addressed by formula.
//!
//! # Features
//!
//! - **Origin snapping**: per-level anchors on the spacing grid, ring-buffer
//!   storage so a moving camera never moves stored probes
//! - **Region streaming**: near levels recycle storage and retrace, far
//!   levels keep evicted regions and restore them without tracing
//! - **Budgeted scheduling**: deterministic priority order with a starvation
//!   guard
//! - **Async tracing**: resumable, cancellable per-probe jobs on rayon with
//!   generation-checked write-back
//! - **GPU contracts**: std140 uniform blocks, formula-addressed atlases and
//!   program defines, with GPU writes gated by [`gpu::GpuContextToken`]
//!
//! # Example
//!
//! ```ignore
//! use voxel_probes::{ClipmapConfig, TraceMode, WorldProbeSystem};
//!
//! let config = ClipmapConfig::load(Path::new("probes.toml"))?;
//! let mut probes = WorldProbeSystem::new(config, my_tracer, TraceMode::Async)?;
//!
//! // Each frame
//! let report = probes.update(camera_position);
//!
//! // On the thread that owns the GPU context
//! probes.drain_uploads(&ctx, &mut atlas_writer);
//! probes.recompile_programs(&ctx, &mut backend)?;
//! let uniforms = probes.world_probe_uniforms();
//! ```

pub mod config;
pub mod constants;
pub mod error;

pub use config::{ClipmapConfig, InvalidationScope, RefreshPolicy};
pub use error::{ConfigError, LayoutError, ProgramError};

// Clipmap geometry: snapping, addressing, blending
pub mod clipmap;
pub use clipmap::{ClipmapAddressor, ClipmapLevel, CrossLevelBlender, LevelWindow};

// Octahedral direction mapping
pub mod octahedral;
pub use octahedral::{oct_decode, oct_encode};

// CPU-side probe storage
pub mod cache;
pub use cache::{DirtyFlags, ProbeRegionCache, RegionKey, SlotRef, SlotTag};

// Per-frame update selection
pub mod scheduler;
pub use scheduler::{ProbeUpdateScheduler, UpdateBudget};

// Probe tracing
pub mod trace;
pub use trace::{ProbeSample, ProbeTracer, Ray, RaySample, TraceMode, TraceStage};

// Atlas layout, encodings and uploads
pub mod atlas;
pub use atlas::{AtlasLayout, AtlasUpload, AtlasUploadQueue, AtlasWriter, RadianceAtlasPacker};

// GPU-facing contracts
pub mod gpu;
pub use gpu::{FrameUniforms, GpuContextToken, ProbePrograms, ProgramBackend, WorldProbeUniforms};

// Metrics collection
pub mod metrics;

// Frame orchestration
pub mod system;
pub use system::{FrameReport, FrameSnapshot, WorldProbeSystem};
