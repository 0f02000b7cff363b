//! Benchmarks for the hot DSP primitives.
//!
//! These run on every sample of every voice and strip, so per-sample cost
//! here multiplies across the whole console.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mezcla_core::{
    Biquad, CoeffRamp, EnvelopeFollower, FormantResonator, SmoothedParam, lowpass_coefficients,
};

fn bench_biquad(c: &mut Criterion) {
    let mut biquad = Biquad::new();
    biquad.set_coeffs(lowpass_coefficients(1000.0, 0.707, 48000.0));

    c.bench_function("biquad_process_1k", |b| {
        b.iter(|| {
            let mut acc = 0.0_f32;
            for i in 0..1000 {
                acc += biquad.process(black_box(i as f32 * 0.001));
            }
            acc
        })
    });
}

fn bench_coeff_ramp(c: &mut Criterion) {
    let from = lowpass_coefficients(200.0, 0.707, 48000.0);
    let to = lowpass_coefficients(8000.0, 0.707, 48000.0);

    c.bench_function("coeff_ramp_period", |b| {
        let mut ramp = CoeffRamp::new(from);
        b.iter(|| {
            ramp.retarget(black_box(to), 32);
            let mut last = from;
            for _ in 0..32 {
                last = ramp.advance();
            }
            last
        })
    });
}

fn bench_resonator(c: &mut Criterion) {
    let mut resonator = FormantResonator::new(48000.0);
    resonator.set_parameters(800.0, 80.0);

    c.bench_function("resonator_process_1k", |b| {
        b.iter(|| {
            let mut acc = 0.0_f32;
            for i in 0..1000 {
                acc += resonator.process(black_box(i as f32 * 0.001));
            }
            acc
        })
    });
}

fn bench_follower(c: &mut Criterion) {
    let mut follower = EnvelopeFollower::new(48000.0);

    c.bench_function("follower_process_1k", |b| {
        b.iter(|| {
            let mut level = 0.0;
            for i in 0..1000 {
                level = follower.process(black_box((i % 100) as f32 * 0.01));
            }
            level
        })
    });
}

fn bench_smoothed_param(c: &mut Criterion) {
    let mut param = SmoothedParam::with_config(0.0, 48000.0, 5.0);

    c.bench_function("smoothed_param_advance_1k", |b| {
        b.iter(|| {
            param.set_target(black_box(1.0));
            let mut v = 0.0;
            for _ in 0..1000 {
                v = param.advance();
            }
            param.set_target(0.0);
            v
        })
    });
}

criterion_group!(
    benches,
    bench_biquad,
    bench_coeff_ramp,
    bench_resonator,
    bench_follower,
    bench_smoothed_param
);
criterion_main!(benches);
