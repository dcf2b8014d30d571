use std::time::Duration;

use glam::Vec3;

use super::*;
use crate::trace::test_utils::*;

fn params() -> TraceParams {
	TraceParams {
		tile_size: 4,
		max_distance: 16.0,
		ao_radius: 1.0,
	}
}

fn requests(count: u32) -> Vec<TraceRequest> {
	(0..count)
		.map(|i| request_at(Vec3::new(i as f32, 0.5, 0.0), i))
		.collect()
}

/// Poll until `count` completions arrived or the deadline passed.
fn poll_until<T: ProbeTracer + 'static>(stage: &mut TraceStage<T>, count: usize) -> Vec<TraceCompletion> {
	let deadline = Instant::now() + Duration::from_secs(10);
	let mut out = Vec::new();
	while out.len() < count && Instant::now() < deadline {
		out.extend(stage.poll());
		std::thread::sleep(Duration::from_millis(1));
	}
	out
}

#[test]
fn test_inline_completes_on_next_poll() {
	let mut stage = TraceStage::new(FloorTracer::new(0.0), TraceMode::Inline, params());
	stage.dispatch(requests(5));
	assert_eq!(stage.in_flight_count(), 5);

	let mut done = stage.poll();
	done.sort_by_key(|d| d.tag.storage.x);
	assert_eq!(done.len(), 5);
	for (i, d) in done.iter().enumerate() {
		assert_eq!(d.tag.storage.x, i as u32);
		assert_eq!(d.sample.texels.len(), 16);
	}
	assert_eq!(stage.in_flight_count(), 0);
	assert!(stage.poll().is_empty());
}

#[test]
fn test_inline_cancel_drops_pending() {
	let mut stage = TraceStage::new(SkyTracer::new(Vec3::ONE), TraceMode::Inline, params());
	let batch = requests(3);
	let victim = batch[1].tag;
	stage.dispatch(batch);

	assert!(stage.cancel(&victim));
	assert!(!stage.cancel(&victim), "second cancel is a no-op");

	let done = stage.poll();
	assert_eq!(done.len(), 2);
	assert!(done.iter().all(|d| d.tag != victim));
}

#[test]
fn test_async_matches_inline() {
	let mut inline = TraceStage::new(FloorTracer::new(0.0), TraceMode::Inline, params());
	let mut background = TraceStage::new(FloorTracer::new(0.0), TraceMode::Async, params());
	inline.dispatch(requests(8));
	background.dispatch(requests(8));

	let mut expected = inline.poll();
	let mut got = poll_until(&mut background, 8);
	assert_eq!(got.len(), 8);
	expected.sort_by_key(|d| d.tag.storage.x);
	got.sort_by_key(|d| d.tag.storage.x);
	for (a, b) in expected.iter().zip(&got) {
		assert_eq!(a.tag, b.tag);
		assert_eq!(a.sample, b.sample);
	}
	assert_eq!(background.in_flight_count(), 0);
}

#[test]
fn test_async_cancelled_results_never_surface() {
	let mut stage = TraceStage::new(FloorTracer::new(0.0), TraceMode::Async, params());
	let batch = requests(4);
	let victim = batch[0].tag;
	stage.dispatch(batch);
	stage.cancel(&victim);

	let done = poll_until(&mut stage, 3);
	// Give a racing worker time to deliver before the final check.
	std::thread::sleep(Duration::from_millis(20));
	let late = stage.poll();
	assert!(done.iter().chain(&late).all(|d| d.tag != victim));
	assert_eq!(stage.in_flight_count(), 0);
}

#[test]
fn test_cancel_all() {
	let mut stage = TraceStage::new(SkyTracer::new(Vec3::ONE), TraceMode::Inline, params());
	stage.dispatch(requests(3));
	stage.cancel_all();
	assert_eq!(stage.in_flight_count(), 0);
	assert!(stage.poll().is_empty());
}
