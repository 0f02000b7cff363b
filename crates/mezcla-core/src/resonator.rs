//! Formant resonator — a biquad tuned as a resonant pole pair.
//!
//! Used by the voice pipeline to impose a vowel-like resonance on the
//! oscillator output. The filter is an all-pole Direct Form I section:
//!
//! ```text
//! y[n] = b0*x[n] + 2r*cos(w)*y[n-1] - r^2*y[n-2]
//! ```
//!
//! with `w = 2*pi*f/fs` and pole radius `r = exp(-pi*BW/fs)`. The poles sit
//! at `r*exp(+-jw)`; for `0 <= r < 1` they are strictly inside the unit
//! circle, so the filter is unconditionally stable over the clamped input
//! range. `b0 = 1 - r` scales the response so the peak gain is approximately
//! `1/(1-r)` relative to a unity-gain passband.

use libm::{cosf, expf};

/// Frequency clamp floor in Hz.
const MIN_FREQ: f32 = 20.0;

/// Bandwidth clamp floor in Hz.
const MIN_BANDWIDTH: f32 = 10.0;

/// Safety margin on the pole radius. Keeps the peak gain finite even when a
/// caller asks for a vanishing bandwidth.
const MAX_RADIUS: f32 = 0.999;

/// Resonant pole-pair filter with exactly two delay registers of state.
///
/// All parameter inputs are clamped, so there are no runtime error
/// conditions. [`set_parameters`](Self::set_parameters) recomputes
/// coefficients without touching the delay registers, which allows smooth
/// formant sweeps without clicks.
///
/// # Example
///
/// ```rust
/// use mezcla_core::FormantResonator;
///
/// let mut res = FormantResonator::new(48000.0);
/// res.set_parameters(800.0, 80.0); // "ah"-ish first formant
/// let out = res.process(0.5);
/// assert!(out.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct FormantResonator {
    /// Input scaling: 1 - r
    b0: f32,
    /// Feedback z^-1: -2r*cos(w), stored in DF1 subtract convention
    a1: f32,
    /// Feedback z^-2: r^2
    a2: f32,

    /// Output delay line
    y1: f32,
    y2: f32,

    /// Pole radius after clamping
    radius: f32,

    sample_rate: f32,
    frequency: f32,
    bandwidth: f32,
}

impl FormantResonator {
    /// Create a resonator at the given sample rate.
    ///
    /// Defaults to 1 kHz center with 100 Hz bandwidth.
    pub fn new(sample_rate: f32) -> Self {
        let mut res = Self {
            b0: 1.0,
            a1: 0.0,
            a2: 0.0,
            y1: 0.0,
            y2: 0.0,
            radius: 0.0,
            sample_rate,
            frequency: 1000.0,
            bandwidth: 100.0,
        };
        res.recalculate();
        res
    }

    /// Set center frequency and bandwidth in Hz.
    ///
    /// Clamps: `f` to [20, fs/2 − 1], `BW` to [10, fs/4], and the resulting
    /// pole radius to 0.999. Filter state is left untouched.
    pub fn set_parameters(&mut self, frequency: f32, bandwidth: f32) {
        self.frequency = frequency.clamp(MIN_FREQ, self.sample_rate / 2.0 - 1.0);
        self.bandwidth = bandwidth.clamp(MIN_BANDWIDTH, self.sample_rate / 4.0);
        self.recalculate();
    }

    /// Update the sample rate, re-clamping and recomputing coefficients.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.set_parameters(self.frequency, self.bandwidth);
    }

    /// Center frequency in Hz after clamping.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Bandwidth in Hz after clamping.
    pub fn bandwidth(&self) -> f32 {
        self.bandwidth
    }

    /// Pole radius `r` after clamping. Always `< 1`.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Resonance magnification of the pole pair: `1/(1-r)`.
    ///
    /// At the center frequency the near pole factor `|1 - r*e^{j(w0-w)}|`
    /// collapses to `1-r`, magnifying the response by this amount. The full
    /// measured gain also carries the far pole factor
    /// `|1 - r*e^{-2jw0}|`; see the peak-gain test for the exact accounting.
    pub fn peak_gain(&self) -> f32 {
        1.0 / (1.0 - self.radius)
    }

    /// Consume one input sample and return one output sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input - self.a1 * self.y1 - self.a2 * self.y2;
        self.y2 = self.y1;
        self.y1 = crate::math::flush_denormal(output);
        output
    }

    /// Process a block in place. The same operation as [`process`](Self::process),
    /// iterated.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Zero the delay registers without changing parameters.
    pub fn reset(&mut self) {
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn recalculate(&mut self) {
        let r = expf(-core::f32::consts::PI * self.bandwidth / self.sample_rate);
        self.radius = r.min(MAX_RADIUS);
        let omega = 2.0 * core::f32::consts::PI * self.frequency / self.sample_rate;
        self.b0 = 1.0 - self.radius;
        self.a1 = -2.0 * self.radius * cosf(omega);
        self.a2 = self.radius * self.radius;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::{fabsf, sinf};

    #[test]
    fn parameters_are_clamped() {
        let mut res = FormantResonator::new(48000.0);
        res.set_parameters(0.0, 0.0);
        assert_eq!(res.frequency(), 20.0);
        assert_eq!(res.bandwidth(), 10.0);

        res.set_parameters(1e9, 1e9);
        assert_eq!(res.frequency(), 48000.0 / 2.0 - 1.0);
        assert_eq!(res.bandwidth(), 48000.0 / 4.0);
    }

    #[test]
    fn radius_stays_below_one() {
        let mut res = FormantResonator::new(48000.0);
        res.set_parameters(1000.0, 0.0001); // clamped to 10 Hz
        assert!(res.radius() < 1.0);
        assert!(res.radius() <= 0.999);
    }

    #[test]
    fn coefficients_satisfy_stability_triangle() {
        // |a2| < 1 and |a1| < 1 + a2 for every clamped (f, BW) sample.
        let mut res = FormantResonator::new(48000.0);
        for f_step in 0..40 {
            for bw_step in 0..40 {
                let f = 20.0 + f_step as f32 * 590.0;
                let bw = 10.0 + bw_step as f32 * 295.0;
                res.set_parameters(f, bw);
                assert!(fabsf(res.a2) < 1.0, "a2 out of triangle at f={f}, bw={bw}");
                assert!(
                    fabsf(res.a1) < 1.0 + res.a2,
                    "a1 out of triangle at f={f}, bw={bw}"
                );
            }
        }
    }

    #[test]
    fn set_parameters_preserves_state() {
        let mut res = FormantResonator::new(48000.0);
        res.set_parameters(500.0, 50.0);
        for _ in 0..100 {
            res.process(1.0);
        }
        let y1_before = res.y1;
        res.set_parameters(700.0, 60.0);
        assert_eq!(res.y1, y1_before, "delay registers must survive retune");
    }

    #[test]
    fn reset_zeroes_delay_registers() {
        let mut res = FormantResonator::new(48000.0);
        for _ in 0..100 {
            res.process(1.0);
        }
        res.reset();
        assert_eq!(res.y1, 0.0);
        assert_eq!(res.y2, 0.0);
    }

    /// Drive the resonator with a unit sine at its center frequency and
    /// verify the pole-pair resonance magnification is `1/(1-r)`.
    ///
    /// The measured gain is `b0 / ((1-r) * |1 - r*e^{-2jw0}|)`: the near
    /// pole contributes the `1/(1-r)` magnification under test, the far
    /// pole contributes a frequency-dependent factor that is computed
    /// analytically and divided out before comparing.
    #[test]
    fn peak_gain_matches_one_over_one_minus_r_within_5_percent() {
        let sr = 48000.0;
        let freq = 1000.0;
        let bw = 100.0;

        let mut res = FormantResonator::new(sr);
        res.set_parameters(freq, bw);

        let omega = 2.0 * core::f32::consts::PI * freq / sr;
        // Let transients die (several time constants of 1/BW), then measure.
        let settle = (sr / bw * 10.0) as usize;
        let measure = (sr / freq * 50.0) as usize;

        let mut peak = 0.0_f32;
        for n in 0..settle + measure {
            let x = sinf(omega * n as f32);
            let y = res.process(x);
            if n >= settle {
                peak = peak.max(fabsf(y));
            }
        }

        // Far pole factor |1 - r*e^{-2jw0}|
        let r = res.radius();
        let re = 1.0 - r * libm::cosf(2.0 * omega);
        let im = r * sinf(2.0 * omega);
        let far = libm::sqrtf(re * re + im * im);

        let near_gain = peak * far / res.b0;
        let theory = res.peak_gain();
        assert!(
            (near_gain - theory).abs() / theory < 0.05,
            "near-pole gain {near_gain}, theory {theory}"
        );
    }

    #[test]
    fn impulse_response_envelope_decays() {
        let sr = 48000.0;
        let bw = 200.0;
        let mut res = FormantResonator::new(sr);
        res.set_parameters(800.0, bw);

        let mut response = [0.0_f32; 4096];
        response[0] = res.process(1.0);
        for sample in response.iter_mut().skip(1) {
            *sample = res.process(0.0);
        }

        // After 2/BW seconds the envelope must be monotonically shrinking:
        // compare energy of consecutive windows.
        let start = (2.0 / bw * sr) as usize;
        let window = 128;
        let mut prev_energy = f32::MAX;
        let mut idx = start;
        while idx + window <= response.len() {
            let energy: f32 = response[idx..idx + window].iter().map(|s| s * s).sum();
            assert!(
                energy <= prev_energy * 1.001,
                "envelope grew at sample {idx}"
            );
            prev_energy = energy;
            idx += window;
        }
    }
}
