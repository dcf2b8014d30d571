use super::*;
use crate::constants::SH_C0;
use crate::octahedral::oct_decode;
use crate::trace::test_utils::*;

fn params(tile_size: u32) -> TraceParams {
	TraceParams {
		tile_size,
		max_distance: 16.0,
		ao_radius: 2.0,
	}
}

#[test]
fn test_sky_only_probe() {
	let sky = Vec3::new(0.2, 0.4, 0.8);
	let job = ProbeTraceJob::new(request_at(Vec3::ZERO, 0), params(4));
	let sample = job.run_to_completion(&SkyTracer::new(sky));

	assert_eq!(sample.texels.len(), 16);
	let miss_alpha = -(17.0f32).ln();
	for texel in &sample.texels {
		assert_eq!(&texel[..3], &sky.to_array()[..]);
		assert!((texel[3] - miss_alpha).abs() < 1e-6);
	}
	assert_eq!(sample.hit_distance, -16.0, "all misses store -max_distance");
	assert_eq!(sample.visibility.confidence, 1.0);

	let band0 = sky * SH_C0 * 4.0 * std::f32::consts::PI;
	assert!((sample.sh.0[0] - band0).length() < 1e-4);
}

#[test]
fn test_constant_hit_probe() {
	let job = ProbeTraceJob::new(request_at(Vec3::ZERO, 0), params(4));
	let sample = job.run_to_completion(&ConstantHitTracer::new(3.0, Vec3::ONE));

	assert_eq!(sample.hit_distance, 3.0);
	for texel in &sample.texels {
		assert!((texel[3] - 4.0f32.ln()).abs() < 1e-6, "hits store +ln(d + 1)");
	}
	assert_eq!(sample.visibility.confidence, 1.0, "hits beyond the AO radius are open");
}

#[test]
fn test_fully_occluded_probe() {
	let job = ProbeTraceJob::new(request_at(Vec3::ZERO, 0), params(4));
	let sample = job.run_to_completion(&ConstantHitTracer::new(0.5, Vec3::ONE));

	assert_eq!(sample.visibility.confidence, 0.0);
	assert_eq!(sample.visibility.direction_oct, glam::Vec2::splat(0.5));
	assert_eq!(sample.hit_distance, 0.5);
}

#[test]
fn test_floor_bends_visibility_upward() {
	let job = ProbeTraceJob::new(request_at(Vec3::new(0.0, 0.5, 0.0), 0), params(8));
	let sample = job.run_to_completion(&FloorTracer::new(0.0));

	let bent = oct_decode(sample.visibility.direction_oct);
	assert!(bent.y > 0.9, "bent direction {bent} should point up");
	assert!(sample.visibility.confidence > 0.3 && sample.visibility.confidence < 0.7);
	assert!(sample.hit_distance >= 0.5);
}

#[test]
fn test_steps_resume_where_they_left_off() {
	let tracer = CountingTracer::new(FloorTracer::new(-1.0));
	let mut job = ProbeTraceJob::new(request_at(Vec3::ZERO, 0), params(6));

	assert!(!job.step(&tracer, 10));
	assert_eq!(job.rays_done(), 10);
	assert!(!job.step(&tracer, 20));
	assert!(job.step(&tracer, 100));
	assert!(job.is_done());
	assert_eq!(tracer.count(), 36, "no texel traced twice");

	let stepped = job.finish();
	let whole = ProbeTraceJob::new(request_at(Vec3::ZERO, 0), params(6)).run_to_completion(&FloorTracer::new(-1.0));
	assert_eq!(stepped, whole);
}

#[test]
fn test_early_finish_pads_with_misses() {
	let mut job = ProbeTraceJob::new(request_at(Vec3::ZERO, 0), params(4));
	job.step(&ConstantHitTracer::new(1.0, Vec3::ONE), 3);
	let sample = job.finish();
	assert_eq!(sample.texels.len(), 16);
	assert_eq!(sample.texels[15], [0.0, 0.0, 0.0, -(17.0f32).ln()]);
}
