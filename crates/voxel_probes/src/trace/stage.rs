//! TraceStage - dispatch probe traces and collect completions.
//!
//! # Modes
//!
//! ```text
//!   Async:   dispatch ──► rayon::spawn(job) ──► channel ──► poll (later frame)
//!                          │
//!                          └── cancel flag checked between steps
//!
//!   Inline:  dispatch ──► par_iter(jobs) ──► pending ──► poll (same frame)
//! ```
//!
//! Async mode never blocks the caller; completions may arrive any number of
//! frames after dispatch. Inline mode is synchronous and deterministic, for
//! tests and single-threaded targets. Either way a result that outlived its
//! slot is rejected by the cache's generation check, cancellation only saves
//! the work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, Sender, TryRecvError};
use rayon::prelude::*;
use web_time::Instant;

use super::job::{ProbeTraceJob, TraceParams};
use super::types::{ProbeTracer, TraceCompletion, TraceRequest};
use crate::cache::SlotTag;

/// How traces are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceMode {
	/// Background jobs on rayon's pool.
	#[default]
	Async,
	/// Traced during `dispatch`, completions returned by the next `poll`.
	Inline,
}

/// Rays traced between cancellation checks.
const RAYS_PER_STEP: u32 = 16;

/// Probe trace dispatcher.
pub struct TraceStage<T: ProbeTracer + 'static> {
	tracer: Arc<T>,
	mode: TraceMode,
	params: TraceParams,
	sender: Sender<TraceCompletion>,
	receiver: Receiver<TraceCompletion>,
	/// Cancellation flag per outstanding request.
	in_flight: HashMap<SlotTag, Arc<AtomicBool>>,
	/// Inline completions waiting for `poll`.
	pending: Vec<TraceCompletion>,
}

impl<T: ProbeTracer + 'static> TraceStage<T> {
	pub fn new(tracer: T, mode: TraceMode, params: TraceParams) -> Self {
		Self::with_shared(Arc::new(tracer), mode, params)
	}

	/// Create using a tracer shared with other owners.
	pub fn with_shared(tracer: Arc<T>, mode: TraceMode, params: TraceParams) -> Self {
		let (sender, receiver) = channel::unbounded();
		Self {
			tracer,
			mode,
			params,
			sender,
			receiver,
			in_flight: HashMap::new(),
			pending: Vec::new(),
		}
	}

	#[inline]
	pub fn mode(&self) -> TraceMode {
		self.mode
	}

	#[inline]
	pub fn tracer(&self) -> &Arc<T> {
		&self.tracer
	}

	#[inline]
	pub fn params(&self) -> TraceParams {
		self.params
	}

	/// Parameters for jobs dispatched from now on.
	pub fn set_params(&mut self, params: TraceParams) {
		self.params = params;
	}

	/// Requests dispatched and neither completed nor cancelled.
	#[inline]
	pub fn in_flight_count(&self) -> usize {
		self.in_flight.len()
	}

	/// Start tracing a batch of probes.
	#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "trace_stage::dispatch"))]
	pub fn dispatch(&mut self, requests: Vec<TraceRequest>) {
		if requests.is_empty() {
			return;
		}
		match self.mode {
			TraceMode::Async => {
				for request in requests {
					let cancel = Arc::new(AtomicBool::new(false));
					self.in_flight.insert(request.tag, Arc::clone(&cancel));
					let tracer = Arc::clone(&self.tracer);
					let sender = self.sender.clone();
					let params = self.params;
					rayon::spawn(move || {
						if let Some(done) = run_job(tracer.as_ref(), request, params, &cancel) {
							// Ignore send error (stage dropped)
							let _ = sender.send(done);
						}
					});
				}
			}
			TraceMode::Inline => {
				let tracer = self.tracer.as_ref();
				let params = self.params;
				let never = AtomicBool::new(false);
				let done: Vec<TraceCompletion> = requests
					.into_par_iter()
					.filter_map(|request| run_job(tracer, request, params, &never))
					.collect();
				for completion in &done {
					self.in_flight.insert(completion.tag, Arc::new(AtomicBool::new(false)));
				}
				self.pending.extend(done);
			}
		}
	}

	/// Raise the cancellation flag of an outstanding request.
	pub fn cancel(&mut self, tag: &SlotTag) -> bool {
		match self.in_flight.remove(tag) {
			Some(flag) => {
				flag.store(true, Ordering::Relaxed);
				self.pending.retain(|c| c.tag != *tag);
				true
			}
			None => false,
		}
	}

	/// Cancel everything outstanding.
	pub fn cancel_all(&mut self) {
		for flag in self.in_flight.values() {
			flag.store(true, Ordering::Relaxed);
		}
		self.in_flight.clear();
		self.pending.clear();
	}

	/// Collect completions (non-blocking). Results of cancelled requests that
	/// raced the flag are dropped here.
	pub fn poll(&mut self) -> Vec<TraceCompletion> {
		let mut out = std::mem::take(&mut self.pending);
		loop {
			match self.receiver.try_recv() {
				Ok(done) => out.push(done),
				Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
			}
		}
		out.retain(|done| self.in_flight.remove(&done.tag).is_some());
		out
	}
}

/// Run one job to completion unless cancelled (called on worker thread).
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "trace_stage::run_job"))]
fn run_job<T: ProbeTracer + ?Sized>(
	tracer: &T,
	request: TraceRequest,
	params: TraceParams,
	cancel: &AtomicBool,
) -> Option<TraceCompletion> {
	let start = Instant::now();
	let mut job = ProbeTraceJob::new(request, params);
	loop {
		if cancel.load(Ordering::Relaxed) {
			return None;
		}
		if job.step(tracer, RAYS_PER_STEP) {
			break;
		}
	}
	Some(TraceCompletion {
		tag: request.tag,
		sample: job.finish(),
		trace_time_us: start.elapsed().as_micros() as u64,
	})
}

#[cfg(test)]
#[path = "stage_test.rs"]
mod stage_test;
