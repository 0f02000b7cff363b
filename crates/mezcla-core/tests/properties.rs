//! Property-based tests for mezcla-core DSP primitives.
//!
//! Tests filter stability, resonator pole placement, and parameter
//! convergence using proptest for randomized input generation.

use mezcla_core::{
    Biquad, CoeffRamp, FormantResonator, SmoothedParam, high_shelf_coefficients,
    low_shelf_coefficients, lowpass_coefficients, peaking_coefficients,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// For any EQ-band configuration in the clamped ranges, the biquad
    /// produces finite output for random finite input.
    #[test]
    fn eq_biquads_are_stable(
        freq in 20.0f32..20000.0f32,
        gain_db in -12.0f32..12.0f32,
        q in 0.5f32..5.0f32,
        variant in 0usize..4,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let sr = 48000.0;
        let coeffs = match variant % 4 {
            0 => low_shelf_coefficients(freq.min(500.0), gain_db, sr),
            1 => peaking_coefficients(freq, q, gain_db, sr),
            2 => high_shelf_coefficients(freq.max(1000.0), gain_db, sr),
            _ => lowpass_coefficients(freq, q, sr),
        };

        let mut biquad = Biquad::new();
        biquad.set_coeffs(coeffs);
        for &sample in &input {
            let out = biquad.process(sample);
            prop_assert!(
                out.is_finite(),
                "variant {} (freq={}, gain={}, q={}) produced {}",
                variant % 4, freq, gain_db, q, out
            );
        }
    }

    /// Biquad coefficient sets from the cookbook constructors always satisfy
    /// the stability triangle |a2| < 1, |a1| < 1 + a2.
    #[test]
    fn cookbook_coefficients_in_stability_triangle(
        freq in 20.0f32..20000.0f32,
        q in 0.5f32..5.0f32,
        gain_db in -12.0f32..12.0f32,
    ) {
        let sr = 48000.0;
        for coeffs in [
            lowpass_coefficients(freq, q, sr),
            peaking_coefficients(freq, q, gain_db, sr),
        ] {
            prop_assert!(coeffs.a2.abs() < 1.0);
            prop_assert!(coeffs.a1.abs() < 1.0 + coeffs.a2 + 1e-6);
        }
    }

    /// Resonator coefficients stay inside the stability triangle over the
    /// full clamped (f, BW) plane, at several sample rates.
    #[test]
    fn resonator_stable_over_clamped_plane(
        freq in 1.0f32..96000.0f32,
        bw in 0.1f32..96000.0f32,
        sr_idx in 0usize..5,
    ) {
        let sr = [44100.0, 48000.0, 88200.0, 96000.0, 192000.0][sr_idx];
        let mut res = FormantResonator::new(sr);
        res.set_parameters(freq, bw);

        prop_assert!(res.radius() < 1.0);

        // Impulse response stays finite for 512 samples.
        let mut out = res.process(1.0);
        for _ in 0..511 {
            out = res.process(0.0);
            prop_assert!(out.is_finite());
        }
    }

    /// SmoothedParam converges toward any target from any start.
    #[test]
    fn smoothed_param_converges(
        start in -10.0f32..10.0f32,
        target in -10.0f32..10.0f32,
        time_ms in 1.0f32..50.0f32,
    ) {
        let mut param = SmoothedParam::with_config(start, 48000.0, time_ms);
        param.set_target(target);

        // 10 time constants is plenty to settle.
        let samples = (time_ms / 1000.0 * 48000.0 * 10.0) as usize;
        for _ in 0..samples {
            param.advance();
        }

        let tolerance = 0.01 * (target - start).abs().max(0.01);
        prop_assert!(
            (param.get() - target).abs() < tolerance,
            "start={} target={} got={}", start, target, param.get()
        );
    }

    /// Interpolating between any two stable lowpass coefficient sets keeps
    /// the filter bounded — the property the control-rate update scheme
    /// relies on.
    #[test]
    fn coefficient_interpolation_stays_bounded(
        f_from in 20.0f32..18000.0f32,
        f_to in 20.0f32..18000.0f32,
        input in prop::array::uniform32(-1.0f32..=1.0f32),
    ) {
        let sr = 48000.0;
        let mut ramp = CoeffRamp::new(lowpass_coefficients(f_from, 0.707, sr));
        ramp.retarget(lowpass_coefficients(f_to, 0.707, sr), 32);

        let mut biquad = Biquad::new();
        for &sample in &input {
            biquad.set_coeffs(ramp.advance());
            let out = biquad.process(sample);
            prop_assert!(out.is_finite());
            prop_assert!(out.abs() < 100.0);
        }
    }
}
