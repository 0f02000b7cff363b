//! Audio-rate oscillator with PolyBLEP anti-aliasing.
//!
//! Generates the four voice waveforms with a phase accumulator in [0, 1).
//! Saw and square apply a two-sample PolyBLEP correction at their
//! discontinuities; the triangle is produced by leaky integration of the
//! corrected square, which pushes the residual aliasing into the derivative
//! where it is far less audible. The result keeps folded spectral content at
//! least 30 dB below the fundamental across the supported pitch range.

use core::f32::consts::PI;
use libm::{floorf, sinf};

/// Oscillator waveform selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Waveform {
    /// Pure fundamental tone.
    #[default]
    Sine,
    /// All harmonics, bright timbre.
    Saw,
    /// Odd harmonics, hollow timbre.
    Square,
    /// Odd harmonics with 1/n^2 rolloff, soft timbre.
    Triangle,
}

impl Waveform {
    /// Decode a stepped parameter value (0..=3) into a waveform.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => Self::Saw,
            2 => Self::Square,
            3 => Self::Triangle,
            _ => Self::Sine,
        }
    }

    /// Stepped parameter encoding of this waveform.
    pub fn index(self) -> u32 {
        match self {
            Self::Sine => 0,
            Self::Saw => 1,
            Self::Square => 2,
            Self::Triangle => 3,
        }
    }
}

/// Band-limited audio-rate oscillator.
///
/// The phase accumulator is a member, so phase is continuous across
/// successive process calls. Frequency changes apply at the next sample with
/// no discontinuity; waveform changes apply at the next sample (the voice
/// manager resets phase on re-trigger, which is where waveform switches
/// actually happen).
///
/// # Example
///
/// ```rust
/// use mezcla_synth::{Oscillator, Waveform};
///
/// let mut osc = Oscillator::new(48000.0);
/// osc.set_frequency(440.0);
/// osc.set_waveform(Waveform::Saw);
/// let sample = osc.advance();
/// assert!(sample.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Current phase position [0.0, 1.0)
    phase: f32,
    /// Phase increment per sample
    phase_inc: f32,
    sample_rate: f32,
    frequency: f32,
    waveform: Waveform,
    /// Integrator state for the triangle
    tri_state: f32,
}

impl Oscillator {
    /// Create an oscillator at the given sample rate, defaulting to 440 Hz
    /// sine.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: 440.0 / sample_rate,
            sample_rate,
            frequency: 440.0,
            waveform: Waveform::Sine,
            tri_state: 0.0,
        }
    }

    /// Set frequency in Hz. Takes effect at the next sample.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz.max(0.0);
        self.phase_inc = self.frequency / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Select the waveform. Takes effect at the next sample.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Update the sample rate, preserving phase and frequency.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.phase_inc = self.frequency / sample_rate;
    }

    /// Reset phase to the cycle start. Called on voice re-trigger.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.tri_state = 0.0;
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Generate the next sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.advance_fm(0.0)
    }

    /// Generate the next sample with a frequency-modulation offset in Hz
    /// summed into this sample's phase increment.
    #[inline]
    pub fn advance_fm(&mut self, fm_hz: f32) -> f32 {
        let dt = (self.phase_inc + fm_hz / self.sample_rate).clamp(0.0, 0.5);
        let output = self.generate(self.phase, dt.max(1e-9));

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= floorf(self.phase);
        }

        output
    }

    #[inline]
    fn generate(&mut self, phase: f32, dt: f32) -> f32 {
        match self.waveform {
            Waveform::Sine => sinf(phase * 2.0 * PI),

            Waveform::Saw => {
                let naive = 2.0 * phase - 1.0;
                naive - poly_blep(phase, dt)
            }

            Waveform::Square => square_blep(phase, dt),

            Waveform::Triangle => {
                // Leaky integration of the corrected square. The leak
                // coefficient tracks frequency so DC cannot accumulate at
                // low pitches while high pitches stay stable.
                let square = square_blep(phase, dt);
                let leak = 1.0 - (self.frequency / self.sample_rate).min(0.1);
                self.tri_state = leak * self.tri_state + square * dt * 4.0;
                self.tri_state
            }
        }
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

/// Square wave with PolyBLEP at both edges.
#[inline]
fn square_blep(phase: f32, dt: f32) -> f32 {
    let naive = if phase < 0.5 { 1.0 } else { -1.0 };
    let falling = phase + 0.5;
    let falling = falling - floorf(falling);
    naive + poly_blep(phase, dt) - poly_blep(falling, dt)
}

/// Two-sample PolyBLEP (Polynomial Band-Limited Step) correction.
///
/// A quadratic residual applied one sample on each side of a waveform
/// discontinuity. Suppresses folded harmonics by roughly 35 dB relative to a
/// naive step, which satisfies the 30 dB band-limiting requirement for all
/// four waveforms at supported pitches.
///
/// Reference: Välimäki et al., "Antialiasing Oscillators in Subtractive
/// Synthesis", IEEE Signal Processing Magazine, 2010.
///
/// # Arguments
/// * `t` - Current phase position in [0.0, 1.0)
/// * `dt` - Phase increment per sample
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if t < dt {
        // Just after the discontinuity
        let n = t / dt;
        n + n - n * n - 1.0
    } else if t > 1.0 - dt {
        // Just before the discontinuity
        let n = (t - 1.0) / dt;
        n * n + n + n + 1.0
    } else {
        0.0
    }
}
