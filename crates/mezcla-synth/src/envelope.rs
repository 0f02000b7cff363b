//! ADSR envelope generator for amplitude and filter modulation.
//!
//! Five-state machine with time-deterministic phases: each phase tracks a
//! linear progress counter derived from its configured time, and the output
//! level is shaped by the selected curve. Shaping only changes the contour
//! of the transition — the moment a phase ends depends on its time alone,
//! so Linear, Exponential and SCurve envelopes with the same ADSR settings
//! change state on exactly the same samples.

use libm::expf;
use mezcla_core::SILENCE_FLOOR;

/// ADSR envelope states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeState {
    /// Envelope is inactive — output is zero.
    #[default]
    Off,
    /// Output ramps from the trigger level toward the velocity peak.
    Attack,
    /// Output falls from the peak toward the sustain level.
    Decay,
    /// Output holds at the sustain level while the gate is held.
    Sustain,
    /// Output decays toward zero after gate release.
    Release,
}

/// Transition contour applied within each phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeCurve {
    /// Straight-line transitions.
    Linear,
    /// Convex exponential approach — the classic analog response.
    #[default]
    Exponential,
    /// Smoothstep ease-in/ease-out.
    SCurve,
}

impl EnvelopeCurve {
    /// Decode a stepped parameter value (0..=2).
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Self::Linear,
            2 => Self::SCurve,
            _ => Self::Exponential,
        }
    }

    /// Shape normalized progress `p` in [0, 1] into a transition fraction in
    /// [0, 1]. All curves are exact at both endpoints, so phases begin and
    /// end on their configured levels regardless of shape.
    #[inline]
    fn shape(self, p: f32) -> f32 {
        match self {
            Self::Linear => p,
            Self::Exponential => {
                // Normalized 1 - e^{-5p}: covers 1 - e^-1 of the distance at
                // p = 0.2, i.e. one time constant per fifth of the phase.
                const NORM: f32 = 1.0 / (1.0 - 0.006_737_947); // 1 - e^-5
                (1.0 - expf(-5.0 * p)) * NORM
            }
            Self::SCurve => p * p * (3.0 - 2.0 * p),
        }
    }
}

/// ADSR envelope generator.
///
/// # Behavior
///
/// - `gate_on(velocity)` enters ATTACK from the *current* output level, so a
///   retrigger mid-release never clicks.
/// - Velocity scales the attack peak and shortens the attack time according
///   to the configured sensitivity.
/// - RELEASE ends when the output falls below the −80 dBFS silence floor.
/// - The current level doubles as a modulation source; read it with
///   [`level`](Self::level) after each [`advance`](Self::advance).
///
/// # Example
///
/// ```rust
/// use mezcla_synth::{AdsrEnvelope, EnvelopeState};
///
/// let mut env = AdsrEnvelope::new(48000.0);
/// env.set_attack_ms(5.0);
/// env.set_sustain(0.7);
/// env.gate_on(1.0);
/// for _ in 0..1000 { env.advance(); }
/// env.gate_off();
/// assert_eq!(env.state(), EnvelopeState::Release);
/// ```
#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    state: EnvelopeState,
    /// Current output level
    level: f32,
    sample_rate: f32,
    curve: EnvelopeCurve,

    attack_ms: f32,
    decay_ms: f32,
    sustain: f32,
    release_ms: f32,

    /// Peak the attack aims for (velocity-scaled)
    peak: f32,
    /// Velocity sensitivity: 0 = ignore velocity, 1 = full scaling
    velocity_sensitivity: f32,

    /// Linear progress through the current phase, [0, 1]
    progress: f32,
    /// Progress increment per sample for the current phase
    progress_inc: f32,
    /// Level at the start of the current phase
    phase_start_level: f32,
    /// Level the current phase is heading toward
    phase_target_level: f32,
}

impl Default for AdsrEnvelope {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl AdsrEnvelope {
    /// Create an envelope with 10 ms attack, 100 ms decay, 0.7 sustain,
    /// 200 ms release.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            state: EnvelopeState::Off,
            level: 0.0,
            sample_rate,
            curve: EnvelopeCurve::default(),
            attack_ms: 10.0,
            decay_ms: 100.0,
            sustain: 0.7,
            release_ms: 200.0,
            peak: 1.0,
            velocity_sensitivity: 0.0,
            progress: 0.0,
            progress_inc: 0.0,
            phase_start_level: 0.0,
            phase_target_level: 0.0,
        }
    }

    /// Set attack time in milliseconds (floored at 0.1).
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.max(0.1);
    }

    /// Attack time in milliseconds.
    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    /// Set decay time in milliseconds (floored at 0.1).
    pub fn set_decay_ms(&mut self, ms: f32) {
        self.decay_ms = ms.max(0.1);
    }

    /// Set sustain level (clamped to [0, 1]).
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.clamp(0.0, 1.0);
    }

    /// Sustain level.
    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// Set release time in milliseconds (floored at 0.1).
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.max(0.1);
    }

    /// Release time in milliseconds.
    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Select the transition curve.
    pub fn set_curve(&mut self, curve: EnvelopeCurve) {
        self.curve = curve;
    }

    /// Set velocity sensitivity in [0, 1].
    ///
    /// At 0 every note peaks at 1.0 with the configured attack time. At 1,
    /// velocity scales the peak linearly and halves the attack time at full
    /// velocity.
    pub fn set_velocity_sensitivity(&mut self, sensitivity: f32) {
        self.velocity_sensitivity = sensitivity.clamp(0.0, 1.0);
    }

    /// Update the sample rate. Takes effect at the next phase transition.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Trigger the envelope with a normalized velocity in [0, 1].
    ///
    /// The attack starts from the current output level.
    pub fn gate_on(&mut self, velocity: f32) {
        let velocity = velocity.clamp(0.0, 1.0);
        let sens = self.velocity_sensitivity;
        self.peak = 1.0 - sens * (1.0 - velocity);

        let attack_ms = self.attack_ms * (1.0 - 0.5 * sens * velocity);
        self.enter_phase(EnvelopeState::Attack, self.level, self.peak, attack_ms);
    }

    /// Release the envelope. No-op when already off.
    pub fn gate_off(&mut self) {
        if self.state != EnvelopeState::Off && self.state != EnvelopeState::Release {
            self.enter_phase(EnvelopeState::Release, self.level, 0.0, self.release_ms);
        }
    }

    /// Force the envelope to OFF and zero the output.
    pub fn reset(&mut self) {
        self.state = EnvelopeState::Off;
        self.level = 0.0;
        self.progress = 0.0;
        self.progress_inc = 0.0;
        self.phase_start_level = 0.0;
        self.phase_target_level = 0.0;
    }

    /// Current state.
    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current output level without advancing.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// True while the envelope produces output.
    pub fn is_active(&self) -> bool {
        self.state != EnvelopeState::Off
    }

    /// True while the gate is held (attack, decay or sustain).
    pub fn is_held(&self) -> bool {
        matches!(
            self.state,
            EnvelopeState::Attack | EnvelopeState::Decay | EnvelopeState::Sustain
        )
    }

    /// Advance one sample and return the output level.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Off => {
                self.level = 0.0;
            }

            EnvelopeState::Attack => {
                self.step_transition();
                if self.progress >= 1.0 {
                    let peak = self.peak;
                    self.level = peak;
                    self.enter_phase(EnvelopeState::Decay, peak, self.sustain * peak, self.decay_ms);
                }
            }

            EnvelopeState::Decay => {
                self.step_transition();
                if self.progress >= 1.0 {
                    self.level = self.phase_target_level;
                    self.state = EnvelopeState::Sustain;
                }
            }

            EnvelopeState::Sustain => {
                self.level = self.sustain * self.peak;
            }

            EnvelopeState::Release => {
                self.step_transition();
                if self.progress >= 1.0 || self.level < SILENCE_FLOOR {
                    self.level = 0.0;
                    self.state = EnvelopeState::Off;
                }
            }
        }

        self.level
    }

    /// Advance `n` samples, returning the final level. Control-rate callers
    /// that only need the level at period boundaries use this; amplitude
    /// envelopes advance per sample instead.
    pub fn advance_by(&mut self, n: u32) -> f32 {
        let mut level = self.level;
        for _ in 0..n {
            level = self.advance();
        }
        level
    }

    fn enter_phase(&mut self, state: EnvelopeState, from: f32, to: f32, time_ms: f32) {
        self.state = state;
        self.phase_start_level = from;
        self.phase_target_level = to;
        self.progress = 0.0;
        let samples = (time_ms * self.sample_rate / 1000.0).max(1.0);
        self.progress_inc = 1.0 / samples;
    }

    #[inline]
    fn step_transition(&mut self) {
        self.progress = (self.progress + self.progress_inc).min(1.0);
        let shaped = self.curve.shape(self.progress);
        self.level =
            self.phase_start_level + (self.phase_target_level - self.phase_start_level) * shaped;
    }
}
