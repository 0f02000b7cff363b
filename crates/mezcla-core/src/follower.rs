//! Envelope follower for tracking signal level.
//!
//! Feeds the console strip's dynamics sections: the compressor detects with
//! RMS ballistics, the limiter with peak ballistics.

use libm::{expf, sqrtf};

/// Level detection mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionMode {
    /// Track the rectified peak amplitude.
    #[default]
    Peak,
    /// Track the root-mean-square level. Smoother, matches perceived
    /// loudness; standard for compressor detectors.
    Rms,
}

/// Envelope follower with separate attack and release times.
///
/// Exponential smoothing of either the rectified input (peak mode) or the
/// squared input (RMS mode, square root taken on output):
///
/// ```text
/// env[n] = coeff * env[n-1] + (1 - coeff) * detect(x[n])
/// ```
///
/// where `coeff` is the attack coefficient while the detector output is
/// rising and the release coefficient while it is falling.
///
/// # Example
///
/// ```rust
/// use mezcla_core::{DetectionMode, EnvelopeFollower};
///
/// let mut env = EnvelopeFollower::new(48000.0);
/// env.set_mode(DetectionMode::Rms);
/// env.set_attack_ms(5.0);
/// env.set_release_ms(50.0);
/// let level = env.process(0.5);
/// assert!(level >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Smoothed detector state. Amplitude in peak mode, mean square in RMS
    /// mode.
    state: f32,
    mode: DetectionMode,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: f32,
    attack_ms: f32,
    release_ms: f32,
}

impl EnvelopeFollower {
    /// Create a follower with 10 ms attack / 100 ms release in peak mode.
    pub fn new(sample_rate: f32) -> Self {
        let mut follower = Self {
            state: 0.0,
            mode: DetectionMode::Peak,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
            attack_ms: 10.0,
            release_ms: 100.0,
        };
        follower.recalculate_coefficients();
        follower
    }

    /// Select peak or RMS detection. Resets nothing; the state carries over.
    pub fn set_mode(&mut self, mode: DetectionMode) {
        self.mode = mode;
    }

    /// Current detection mode.
    pub fn mode(&self) -> DetectionMode {
        self.mode
    }

    /// Set attack time in milliseconds (floored at 0.1).
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.attack_ms = attack_ms.max(0.1);
        self.recalculate_coefficients();
    }

    /// Attack time in milliseconds.
    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Set release time in milliseconds (floored at 1.0).
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.release_ms = release_ms.max(1.0);
        self.recalculate_coefficients();
    }

    /// Release time in milliseconds.
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Update sample rate and recalculate coefficients.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coefficients();
    }

    /// Process one sample and return the current level (linear amplitude,
    /// always non-negative — RMS mode returns the square root of the tracked
    /// mean square).
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let detected = match self.mode {
            DetectionMode::Peak => input.abs(),
            DetectionMode::Rms => input * input,
        };

        let coeff = if detected > self.state {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.state = coeff * self.state + (1.0 - coeff) * detected;

        self.level()
    }

    /// Current level without consuming input.
    #[inline]
    pub fn level(&self) -> f32 {
        match self.mode {
            DetectionMode::Peak => self.state,
            DetectionMode::Rms => sqrtf(self.state.max(0.0)),
        }
    }

    /// Reset the detector to silence.
    pub fn reset(&mut self) {
        self.state = 0.0;
    }

    fn recalculate_coefficients(&mut self) {
        // coeff = exp(-1 / (time_ms * fs / 1000))
        self.attack_coeff = expf(-1.0 / (self.attack_ms * self.sample_rate / 1000.0));
        self.release_coeff = expf(-1.0 / (self.release_ms * self.sample_rate / 1000.0));
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_rises_to_input_level() {
        let mut env = EnvelopeFollower::new(48000.0);
        env.set_attack_ms(1.0);

        let mut level = 0.0;
        for _ in 0..500 {
            level = env.process(1.0);
        }
        assert!(level > 0.9, "envelope should rise, got {level}");
    }

    #[test]
    fn falls_after_signal_stops() {
        let mut env = EnvelopeFollower::new(48000.0);
        env.set_attack_ms(1.0);
        env.set_release_ms(10.0);

        for _ in 0..500 {
            env.process(1.0);
        }
        let mut level = 0.0;
        for _ in 0..1000 {
            level = env.process(0.0);
        }
        assert!(level < 0.15, "envelope should fall, got {level}");
    }

    #[test]
    fn rectifies_negative_input() {
        let mut env = EnvelopeFollower::new(48000.0);
        env.set_attack_ms(1.0);
        assert!(env.process(-0.5) > 0.0);
    }

    #[test]
    fn rms_of_full_scale_sine_is_minus_3_db() {
        let mut env = EnvelopeFollower::new(48000.0);
        env.set_mode(DetectionMode::Rms);
        env.set_attack_ms(5.0);
        env.set_release_ms(5.0);

        let omega = 2.0 * core::f32::consts::PI * 1000.0 / 48000.0;
        let mut level = 0.0;
        for n in 0..48000 {
            level = env.process(libm::sinf(omega * n as f32));
        }

        let expected = core::f32::consts::FRAC_1_SQRT_2; // 1/sqrt(2)
        assert!(
            (level - expected).abs() < 0.02,
            "sine RMS {level}, expected ~{expected}"
        );
    }

    #[test]
    fn rms_of_dc_equals_amplitude() {
        let mut env = EnvelopeFollower::new(48000.0);
        env.set_mode(DetectionMode::Rms);
        env.set_attack_ms(1.0);

        let mut level = 0.0;
        for _ in 0..2000 {
            level = env.process(0.5);
        }
        assert!((level - 0.5).abs() < 0.01);
    }

    #[test]
    fn reset_clears_state() {
        let mut env = EnvelopeFollower::new(48000.0);
        for _ in 0..100 {
            env.process(1.0);
        }
        env.reset();
        assert_eq!(env.level(), 0.0);
    }
}
