//! Biquad (bi-quadratic) filter structure.
//!
//! Provides a generic second-order IIR filter plus the coefficient
//! constructors needed by the console strip EQ (low shelf, peaking,
//! high shelf) and the voice filter (lowpass).
//!
//! Coefficient calculation uses the RBJ Audio EQ Cookbook formulas.
//!
//! # Control-rate updates
//!
//! Coefficients are never recomputed per sample. The owner recomputes a
//! [`BiquadCoeffs`] target once per control period and feeds it to a
//! [`CoeffRamp`], which interpolates the coefficient vector linearly across
//! the period. Interpolating between two stable coefficient sets keeps the
//! filter stable throughout the sweep.

use core::f32::consts::PI;
use libm::{cosf, powf, sinf, sqrtf};

/// Normalized biquad coefficient vector (a0 divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    /// Feedforward coefficients
    pub b0: f32,
    /// Feedforward z^-1
    pub b1: f32,
    /// Feedforward z^-2
    pub b2: f32,
    /// Feedback z^-1 (already normalized by a0)
    pub a1: f32,
    /// Feedback z^-2 (already normalized by a0)
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Passthrough coefficients: `y[n] = x[n]`.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Build from raw cookbook output, normalizing by `a0`.
    #[inline]
    pub fn from_raw(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }
}

/// Generic biquad filter state.
///
/// Implements the Direct Form I structure:
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone)]
pub struct Biquad {
    coeffs: BiquadCoeffs,

    /// Input delay line: x[n-1], x[n-2]
    x1: f32,
    x2: f32,

    /// Output delay line: y[n-1], y[n-2]
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Creates a new biquad with passthrough coefficients.
    pub fn new() -> Self {
        Self {
            coeffs: BiquadCoeffs::IDENTITY,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Replace the coefficient set without touching filter state.
    ///
    /// Leaving the delay lines intact lets the owner sweep coefficients
    /// without clicks.
    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    /// Current coefficient set.
    #[inline]
    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Processes a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = self.coeffs;
        let output =
            c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = crate::math::flush_denormal(output);

        output
    }

    /// Clears the delay lines without changing coefficients.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear interpolation of a biquad coefficient vector across a control period.
///
/// The owner calls [`retarget`](Self::retarget) once per control period with
/// freshly computed coefficients, then [`advance`](Self::advance) once per
/// sample. Between updates the five coefficients move in equal per-sample
/// steps toward the target, reaching it exactly at the end of the period.
#[derive(Debug, Clone)]
pub struct CoeffRamp {
    current: BiquadCoeffs,
    step: BiquadCoeffs,
    remaining: u32,
}

impl CoeffRamp {
    /// Create a ramp resting at the given coefficients.
    pub fn new(initial: BiquadCoeffs) -> Self {
        Self {
            current: initial,
            step: BiquadCoeffs {
                b0: 0.0,
                b1: 0.0,
                b2: 0.0,
                a1: 0.0,
                a2: 0.0,
            },
            remaining: 0,
        }
    }

    /// Set a new target to be reached over `steps` samples.
    pub fn retarget(&mut self, target: BiquadCoeffs, steps: u32) {
        if steps == 0 {
            self.snap(target);
            return;
        }
        let n = steps as f32;
        self.step = BiquadCoeffs {
            b0: (target.b0 - self.current.b0) / n,
            b1: (target.b1 - self.current.b1) / n,
            b2: (target.b2 - self.current.b2) / n,
            a1: (target.a1 - self.current.a1) / n,
            a2: (target.a2 - self.current.a2) / n,
        };
        self.remaining = steps;
    }

    /// Jump to the target immediately. Used at prepare time and on reset.
    pub fn snap(&mut self, target: BiquadCoeffs) {
        self.current = target;
        self.remaining = 0;
    }

    /// Advance one sample and return the interpolated coefficients.
    #[inline]
    pub fn advance(&mut self) -> BiquadCoeffs {
        if self.remaining > 0 {
            self.current.b0 += self.step.b0;
            self.current.b1 += self.step.b1;
            self.current.b2 += self.step.b2;
            self.current.a1 += self.step.a1;
            self.current.a2 += self.step.a2;
            self.remaining -= 1;
        }
        self.current
    }

    /// Current coefficients without advancing.
    #[inline]
    pub fn current(&self) -> BiquadCoeffs {
        self.current
    }
}

/// Lowpass coefficients (RBJ cookbook).
///
/// # Arguments
///
/// * `frequency` - Cutoff frequency in Hz
/// * `q` - Q factor (0.707 for Butterworth response)
/// * `sample_rate` - Sample rate in Hz
pub fn lowpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> BiquadCoeffs {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega / (2.0 * q);

    BiquadCoeffs::from_raw(
        (1.0 - cos_omega) / 2.0,
        1.0 - cos_omega,
        (1.0 - cos_omega) / 2.0,
        1.0 + alpha,
        -2.0 * cos_omega,
        1.0 - alpha,
    )
}

/// Peaking EQ coefficients (RBJ cookbook).
///
/// Boosts or cuts around a center frequency. `gain_db` positive = boost.
pub fn peaking_coefficients(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> BiquadCoeffs {
    let a = powf(10.0, gain_db / 40.0); // sqrt(10^(dB/20))
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega / (2.0 * q);

    BiquadCoeffs::from_raw(
        1.0 + alpha * a,
        -2.0 * cos_omega,
        1.0 - alpha * a,
        1.0 + alpha / a,
        -2.0 * cos_omega,
        1.0 - alpha / a,
    )
}

/// Low-shelf coefficients (RBJ cookbook, shelf slope S = 1).
pub fn low_shelf_coefficients(frequency: f32, gain_db: f32, sample_rate: f32) -> BiquadCoeffs {
    let a = powf(10.0, gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    // alpha for S = 1: sin(w)/2 * sqrt((A + 1/A) * (1/S - 1) + 2) = sin(w)/2 * sqrt(2)
    let alpha = sin_omega * 0.5 * core::f32::consts::SQRT_2;
    let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;

    BiquadCoeffs::from_raw(
        a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
        2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
        a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
        (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
        -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
        (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
    )
}

/// High-shelf coefficients (RBJ cookbook, shelf slope S = 1).
pub fn high_shelf_coefficients(frequency: f32, gain_db: f32, sample_rate: f32) -> BiquadCoeffs {
    let a = powf(10.0, gain_db / 40.0);
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let sin_omega = sinf(omega);
    let alpha = sin_omega * 0.5 * core::f32::consts::SQRT_2;
    let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;

    BiquadCoeffs::from_raw(
        a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
        a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
        (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
        2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
        (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_by_default() {
        let mut biquad = Biquad::new();
        for i in 0..10 {
            let input = i as f32 * 0.1;
            let output = biquad.process(input);
            assert!((output - input).abs() < 0.0001);
        }
    }

    #[test]
    fn clear_zeroes_state() {
        let mut biquad = Biquad::new();
        biquad.set_coeffs(lowpass_coefficients(1000.0, 0.707, 48000.0));
        for _ in 0..10 {
            biquad.process(1.0);
        }
        biquad.clear();
        assert_eq!(biquad.x1, 0.0);
        assert_eq!(biquad.x2, 0.0);
        assert_eq!(biquad.y1, 0.0);
        assert_eq!(biquad.y2, 0.0);
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut biquad = Biquad::new();
        biquad.set_coeffs(lowpass_coefficients(1000.0, 0.707, 44100.0));

        let mut output = 0.0;
        for _ in 0..1000 {
            output = biquad.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.05);
    }

    #[test]
    fn peaking_unity_at_zero_gain() {
        let mut biquad = Biquad::new();
        biquad.set_coeffs(peaking_coefficients(1000.0, 1.0, 0.0, 44100.0));

        let mut output = 0.0;
        for _ in 0..1000 {
            output = biquad.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.05, "DC should pass at 0 dB gain");
    }

    #[test]
    fn shelves_finite_and_boost_dc() {
        // A +6 dB low shelf should lift DC by ~6 dB; a +6 dB high shelf
        // should leave DC roughly alone.
        let mut low = Biquad::new();
        low.set_coeffs(low_shelf_coefficients(200.0, 6.0, 48000.0));
        let mut high = Biquad::new();
        high.set_coeffs(high_shelf_coefficients(5000.0, 6.0, 48000.0));

        let mut low_out = 0.0;
        let mut high_out = 0.0;
        for _ in 0..4000 {
            low_out = low.process(1.0);
            high_out = high.process(1.0);
        }

        let target = crate::math::db_to_linear(6.0);
        assert!(
            (low_out - target).abs() < 0.1,
            "low shelf DC gain {low_out}, expected ~{target}"
        );
        assert!(
            (high_out - 1.0).abs() < 0.1,
            "high shelf DC gain {high_out}, expected ~1"
        );
    }

    #[test]
    fn coeff_ramp_reaches_target() {
        let start = BiquadCoeffs::IDENTITY;
        let target = lowpass_coefficients(500.0, 0.707, 48000.0);

        let mut ramp = CoeffRamp::new(start);
        ramp.retarget(target, 32);

        let mut last = start;
        for _ in 0..32 {
            last = ramp.advance();
        }

        assert!((last.b0 - target.b0).abs() < 1e-6);
        assert!((last.a1 - target.a1).abs() < 1e-6);
        assert!((last.a2 - target.a2).abs() < 1e-6);

        // Further advances hold the target
        let held = ramp.advance();
        assert_eq!(held, last);
    }

    #[test]
    fn coeff_ramp_is_monotonic_between_updates() {
        let start = lowpass_coefficients(200.0, 0.707, 48000.0);
        let target = lowpass_coefficients(2000.0, 0.707, 48000.0);

        let mut ramp = CoeffRamp::new(start);
        ramp.retarget(target, 32);

        let mut prev = ramp.current().b0;
        for _ in 0..32 {
            let c = ramp.advance();
            assert!(c.b0 >= prev, "b0 should move monotonically");
            prev = c.b0;
        }
    }

    #[test]
    fn swept_filter_stays_finite() {
        // Sweep cutoff across the audio band while processing noise-ish input;
        // interpolated coefficients must never blow up.
        let mut biquad = Biquad::new();
        let mut ramp = CoeffRamp::new(lowpass_coefficients(100.0, 0.707, 48000.0));

        let mut x = 0.123_f32;
        for period in 0..64 {
            let freq = 100.0 + period as f32 * 300.0;
            ramp.retarget(lowpass_coefficients(freq, 0.707, 48000.0), 32);
            for _ in 0..32 {
                biquad.set_coeffs(ramp.advance());
                // cheap deterministic pseudo-noise
                x = (x * 75.88 + 0.13).fract() * 2.0 - 1.0;
                let y = biquad.process(x);
                assert!(y.is_finite());
                assert!(y.abs() < 100.0, "filter output runaway: {y}");
            }
        }
    }
}
