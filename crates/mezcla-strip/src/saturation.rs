//! Saturation stages of the console strip.
//!
//! Two distinct stages share this module:
//!
//! - [`Drive`] — the optional "density" stage: tanh soft clipping blended in
//!   by a configurable amount, off by default.
//! - [`console_saturate`] — the always-on console stage whose character is
//!   selected by [`ConsoleMode`]: Pure is a bit-exact identity, Classic and
//!   Color add slope-normalized tanh curvature of increasing strength.

use libm::tanhf;
use mezcla_core::SmoothedParam;

/// Console saturation character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Identity — no coloration at all.
    #[default]
    Pure,
    /// Mild curvature; a few tenths of a dB of peak compression.
    Classic,
    /// Pronounced curvature for obvious glue.
    Color,
}

impl ConsoleMode {
    /// Decode a stepped parameter value (0..=2).
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => Self::Classic,
            2 => Self::Color,
            _ => Self::Pure,
        }
    }
}

/// Apply the console saturation curve for `mode`.
///
/// Curves are slope-normalized (`tanh(k*x)/k`), so quiet material passes at
/// unity gain and only peaks are bent. Pure mode returns the input sample
/// unchanged — bit-exact, so an idle console does not dirty the signal.
#[inline]
pub fn console_saturate(mode: ConsoleMode, x: f32) -> f32 {
    match mode {
        ConsoleMode::Pure => x,
        ConsoleMode::Classic => tanhf(1.2 * x) / 1.2,
        ConsoleMode::Color => tanhf(2.5 * x) / 2.5,
    }
}

/// Optional drive stage: tanh soft clipping blended by amount.
///
/// At amount 0 the stage is a pass-through; at amount 1 the signal is fully
/// replaced by `tanh(g*x)/tanh(g)` with up to 10x input gain, which is
/// peak-normalized so full-scale input still peaks at full scale.
#[derive(Debug, Clone)]
pub struct Drive {
    amount: SmoothedParam,
}

impl Drive {
    /// Create a drive stage at the given sample rate, amount 0.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            amount: SmoothedParam::standard(0.0, sample_rate),
        }
    }

    /// Set the drive amount target in [0, 1].
    pub fn set_amount(&mut self, amount: f32) {
        self.amount.set_target(amount.clamp(0.0, 1.0));
    }

    /// Current amount target.
    pub fn amount(&self) -> f32 {
        self.amount.target()
    }

    /// True once the smoothed amount has reached its target.
    pub fn is_settled(&self) -> bool {
        self.amount.is_settled()
    }

    /// Update sample rate; snaps the smoothed amount.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let target = self.amount.target();
        self.amount = SmoothedParam::standard(target, sample_rate);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let amount = self.amount.advance();
        Self::shape(x, amount)
    }

    /// Process one stereo pair; the smoothed amount advances once.
    #[inline]
    pub fn process_stereo(&mut self, l: f32, r: f32) -> (f32, f32) {
        let amount = self.amount.advance();
        (Self::shape(l, amount), Self::shape(r, amount))
    }

    #[inline]
    fn shape(x: f32, amount: f32) -> f32 {
        if amount <= 0.0 {
            return x;
        }
        let gain = 1.0 + amount * 9.0;
        let wet = tanhf(x * gain) / tanhf(gain);
        x + (wet - x) * amount
    }
}
