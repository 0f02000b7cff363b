//! Low-frequency oscillator for modulation.
//!
//! Supplies the voice modulation matrix with periodic control signals.
//! Phase accumulation keeps the output alias-free at sub-audio rates.

use libm::sinf;

/// LFO waveform type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoWaveform {
    /// Smooth sinusoidal modulation.
    #[default]
    Sine,
    /// Linear up/down ramps.
    Triangle,
    /// Rising ramp with abrupt reset.
    Saw,
    /// Binary high/low modulation.
    Square,
}

/// Low-frequency oscillator producing bipolar values in [-1, 1].
///
/// # Example
///
/// ```rust
/// use mezcla_core::{Lfo, LfoWaveform};
///
/// let mut lfo = Lfo::new(48000.0, 2.0);
/// lfo.set_waveform(LfoWaveform::Triangle);
/// let value = lfo.advance();
/// assert!((-1.0..=1.0).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    /// Current phase position [0.0, 1.0)
    phase: f32,
    /// Phase increment per sample
    phase_inc: f32,
    sample_rate: f32,
    frequency: f32,
    waveform: LfoWaveform,
    /// Last generated value, readable without advancing
    value: f32,
}

impl Lfo {
    /// Create a new LFO at the given sample rate and frequency.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: freq_hz / sample_rate,
            sample_rate,
            frequency: freq_hz,
            waveform: LfoWaveform::Sine,
            value: 0.0,
        }
    }

    /// Set frequency in Hz. Clamped to [0, 40] — anything faster belongs to
    /// the audio-rate oscillator.
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.frequency = freq_hz.clamp(0.0, 40.0);
        self.phase_inc = self.frequency / self.sample_rate;
    }

    /// Current frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Select the waveform. Takes effect at the next sample.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    /// Update sample rate, preserving phase.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.phase_inc = self.frequency / sample_rate;
    }

    /// Reset phase to the start of the cycle.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.value = 0.0;
    }

    /// Generate the next value and advance the phase.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.value = match self.waveform {
            LfoWaveform::Sine => sinf(self.phase * 2.0 * core::f32::consts::PI),
            LfoWaveform::Triangle => {
                // 0..0.5 rises -1 -> 1, 0.5..1 falls back
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
            LfoWaveform::Saw => 2.0 * self.phase - 1.0,
            LfoWaveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        self.value
    }

    /// Advance the phase by `n` samples and return the value at the new
    /// position. Control-rate callers use this instead of looping.
    #[inline]
    pub fn advance_by(&mut self, n: u32) -> f32 {
        if n == 0 {
            return self.value;
        }
        self.phase += self.phase_inc * (n - 1) as f32;
        self.phase -= libm::floorf(self.phase);
        self.advance()
    }

    /// Last generated value without advancing.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(48000.0, 1.0)
    }
}
