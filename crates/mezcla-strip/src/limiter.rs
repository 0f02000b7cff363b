//! Lookahead peak limiter — the strip's safety ceiling.
//!
//! The input is delayed by one control period while a scan of the lookahead
//! window drives the gain computer, so reduction is already in place when a
//! transient reaches the output. Attack is therefore instant (it comes free
//! with the lookahead); release follows a one-pole exponential. A final
//! clamp enforces the ceiling as a hard guarantee regardless of smoothing
//! state.
//!
//! Lookahead is fixed at one control period so that identical event streams
//! produce identical output at every device block size.
//!
//! Reference: Zölzer, "DAFX: Digital Audio Effects" (2nd ed.), Ch. 4 —
//! brickwall limiter topology with lookahead.

use libm::expf;
use mezcla_core::{CONTROL_PERIOD, db_to_linear};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

/// Lookahead limiter with a hard ceiling.
///
/// # Defaults
///
/// Threshold 0 dB (ceiling at full scale), release 100 ms — transparent for
/// in-range material.
///
/// # Example
///
/// ```rust
/// use mezcla_strip::Limiter;
///
/// let mut lim = Limiter::new(48000.0);
/// lim.set_threshold_db(-6.0);
/// for _ in 0..256 {
///     let (l, _r) = lim.process_stereo(0.9, 0.9);
///     assert!(l.abs() <= 0.502); // -6 dB ceiling
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Limiter {
    /// Ceiling in dB, clamped to [-30, 0].
    threshold_db: f32,
    /// Ceiling as linear amplitude.
    ceiling: f32,
    release_ms: f32,
    release_coeff: f32,

    /// Circular lookahead buffers, `CONTROL_PERIOD + 1` samples long.
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,

    /// Smoothed gain, 1.0 = no reduction.
    gain: f32,

    sample_rate: f32,
}

impl Limiter {
    /// Create a limiter at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        let len = CONTROL_PERIOD + 1;
        Self {
            threshold_db: 0.0,
            ceiling: 1.0,
            release_ms: 100.0,
            release_coeff: release_coeff(100.0, sample_rate),
            buffer_l: vec![0.0; len],
            buffer_r: vec![0.0; len],
            write_pos: 0,
            gain: 1.0,
            sample_rate,
        }
    }

    /// Set the ceiling in dB, clamped to [-30, 0].
    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold_db = db.clamp(-30.0, 0.0);
        self.ceiling = db_to_linear(self.threshold_db);
    }

    /// Ceiling in dB.
    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    /// Set the release time in milliseconds, clamped to [10, 500].
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.clamp(10.0, 500.0);
        self.release_coeff = release_coeff(self.release_ms, self.sample_rate);
    }

    /// Update sample rate. Lookahead stays one control period of samples.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.release_coeff = release_coeff(self.release_ms, sample_rate);
    }

    /// Latency introduced by the lookahead delay, in samples.
    pub fn latency_samples(&self) -> usize {
        CONTROL_PERIOD
    }

    /// Process one stereo pair with linked gain reduction.
    #[inline]
    pub fn process_stereo(&mut self, l: f32, r: f32) -> (f32, f32) {
        let len = self.buffer_l.len();

        self.buffer_l[self.write_pos] = l;
        self.buffer_r[self.write_pos] = r;

        // Peak across the whole window, both channels (linked stereo).
        let mut peak = 0.0_f32;
        for i in 0..len {
            let pl = self.buffer_l[i].abs();
            let pr = self.buffer_r[i].abs();
            peak = peak.max(pl).max(pr);
        }

        // Instant attack downward, exponential release upward.
        let target = if peak > self.ceiling && peak > 1e-9 {
            self.ceiling / peak
        } else {
            1.0
        };
        self.gain = if target < self.gain {
            target
        } else {
            self.release_coeff * self.gain + (1.0 - self.release_coeff) * target
        };

        // Output the delayed sample, gain-reduced, hard-clamped at the
        // ceiling.
        let read_pos = (self.write_pos + 1) % len;
        let out_l = (self.buffer_l[read_pos] * self.gain).clamp(-self.ceiling, self.ceiling);
        let out_r = (self.buffer_r[read_pos] * self.gain).clamp(-self.ceiling, self.ceiling);

        self.write_pos = read_pos;
        (out_l, out_r)
    }

    /// Process one mono sample (left buffer drives everything).
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let (out, _) = self.process_stereo(x, x);
        out
    }

    /// Clear buffers and return to unity gain.
    pub fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        self.gain = 1.0;
    }
}

/// One-pole release coefficient: `exp(-1 / (ms * fs / 1000))`.
#[inline]
fn release_coeff(release_ms: f32, sample_rate: f32) -> f32 {
    let tau = release_ms * sample_rate / 1000.0;
    if tau < 1.0 { 0.0 } else { expf(-1.0 / tau) }
}
