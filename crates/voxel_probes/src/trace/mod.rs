//! Probe tracing: the external tracer interface, resumable per-probe jobs
//! and the dispatch stage.

pub mod job;
pub mod stage;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use job::{ProbeTraceJob, TraceParams};
pub use stage::{TraceMode, TraceStage};
pub use types::{ProbeSample, ProbeTracer, Ray, RaySample, ShL1, TraceCompletion, TraceRequest, Visibility};
