//! Modulation matrix: routes sources to destinations at control rate.
//!
//! A fixed-capacity array of connections evaluated once per control period.
//! Each enabled connection reads its source, shapes it through a curve,
//! scales it by the connection amount, and accumulates onto its
//! destination's offset. Offsets for one destination sum linearly.
//!
//! The audio thread never edits connections: the control thread builds a new
//! matrix and swaps it in as a snapshot. Between control-rate evaluations a
//! [`ModOffsetRamp`] bridges old and new offsets with a linear ramp so
//! destinations move without zipper noise.

use libm::sqrtf;
use mezcla_core::CONTROL_PERIOD;

/// Maximum number of connections in a matrix.
pub const MAX_CONNECTIONS: usize = 64;

/// Number of modulation destinations (see [`ModDestination`]).
pub const NUM_DESTINATIONS: usize = 6;

/// Modulation source identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModSource {
    /// Per-voice LFO 1 (bipolar).
    Lfo1,
    /// Per-voice LFO 2 (bipolar).
    Lfo2,
    /// Amplitude envelope level (unipolar).
    EnvAmp,
    /// Filter envelope level (unipolar).
    EnvFilter,
    /// Note velocity (unipolar).
    Velocity,
    /// Keyboard position, centered at middle C (bipolar).
    KeyTrack,
    /// Macro slot (unipolar), index 0..=7.
    Macro(u8),
}

/// Modulation destination identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModDestination {
    /// Oscillator pitch in semitones (both oscillators).
    OscPitch,
    /// Voice filter cutoff, normalized offset.
    FilterCutoff,
    /// Voice filter resonance offset.
    FilterResonance,
    /// Voice amplitude offset.
    Amplitude,
    /// LFO 1 rate offset in Hz.
    Lfo1Rate,
    /// LFO 2 rate offset in Hz.
    Lfo2Rate,
}

impl ModDestination {
    /// Dense index into a [`ModOffsets`] array.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::OscPitch => 0,
            Self::FilterCutoff => 1,
            Self::FilterResonance => 2,
            Self::Amplitude => 3,
            Self::Lfo1Rate => 4,
            Self::Lfo2Rate => 5,
        }
    }
}

/// Transfer curve applied to a source value before scaling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModCurve {
    /// Pass the source through unchanged.
    #[default]
    Linear,
    /// Square the magnitude — gentle near zero, steep near full.
    Exponential,
    /// Square root of the magnitude — steep near zero.
    Logarithmic,
    /// Smoothstep — eased at both ends.
    SCurve,
}

impl ModCurve {
    /// Shape a magnitude in [0, 1].
    #[inline]
    fn shape(self, x: f32) -> f32 {
        match self {
            Self::Linear => x,
            Self::Exponential => x * x,
            Self::Logarithmic => sqrtf(x),
            Self::SCurve => x * x * (3.0 - 2.0 * x),
        }
    }
}

/// One modulation routing.
#[derive(Clone, Copy, Debug)]
pub struct ModConnection {
    /// Source of modulation.
    pub source: ModSource,
    /// Destination the scaled value accumulates onto.
    pub destination: ModDestination,
    /// Scaling in [-1, 1]; negative inverts.
    pub amount: f32,
    /// Shaping curve applied to the source magnitude.
    pub curve: ModCurve,
    /// When set, the source is re-centered around its midpoint before
    /// shaping, so modulation swings both ways.
    pub bipolar: bool,
    /// Disabled connections are skipped without being removed.
    pub enabled: bool,
}

impl ModConnection {
    /// Create an enabled linear connection.
    pub fn new(source: ModSource, destination: ModDestination, amount: f32) -> Self {
        Self {
            source,
            destination,
            amount: amount.clamp(-1.0, 1.0),
            curve: ModCurve::Linear,
            bipolar: false,
            enabled: true,
        }
    }

    /// Builder-style curve selection.
    pub fn with_curve(mut self, curve: ModCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Builder-style bipolar flag.
    pub fn with_bipolar(mut self, bipolar: bool) -> Self {
        self.bipolar = bipolar;
        self
    }
}

/// Current values of every modulation source for one voice.
///
/// Sources are stored in their natural polarity; [`get_unipolar`]
/// normalizes bipolar sources to [0, 1] for connection evaluation.
///
/// [`get_unipolar`]: Self::get_unipolar
#[derive(Debug, Clone, Default)]
pub struct ModSources {
    /// LFO 1 value in [-1, 1].
    pub lfo1: f32,
    /// LFO 2 value in [-1, 1].
    pub lfo2: f32,
    /// Amplitude envelope level in [0, 1].
    pub env_amp: f32,
    /// Filter envelope level in [0, 1].
    pub env_filter: f32,
    /// Velocity in [0, 1].
    pub velocity: f32,
    /// Key tracking in [-1, 1], centered at middle C.
    pub key_track: f32,
    /// Macro slots in [0, 1].
    pub macros: [f32; 8],
}

impl ModSources {
    /// All sources at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source value normalized to [0, 1].
    #[inline]
    pub fn get_unipolar(&self, source: ModSource) -> f32 {
        match source {
            ModSource::Lfo1 => (self.lfo1 + 1.0) * 0.5,
            ModSource::Lfo2 => (self.lfo2 + 1.0) * 0.5,
            ModSource::EnvAmp => self.env_amp,
            ModSource::EnvFilter => self.env_filter,
            ModSource::Velocity => self.velocity,
            ModSource::KeyTrack => (self.key_track + 1.0) * 0.5,
            ModSource::Macro(i) => self.macros[usize::from(i) % 8],
        }
    }

    /// Set key tracking from a MIDI note, centered at middle C (note 60).
    pub fn set_key_track_from_note(&mut self, note: u8) {
        self.key_track = ((f32::from(note) - 60.0) / 60.0).clamp(-1.0, 1.0);
    }
}

/// Accumulated per-destination modulation offsets.
pub type ModOffsets = [f32; NUM_DESTINATIONS];

/// Modulation matrix with a fixed number of connection slots.
///
/// # Example
///
/// ```rust
/// use mezcla_synth::{ModConnection, ModDestination, ModMatrix, ModSource, ModSources};
///
/// let mut matrix = ModMatrix::new();
/// matrix.add(ModConnection::new(
///     ModSource::EnvFilter,
///     ModDestination::FilterCutoff,
///     0.8,
/// ));
///
/// let mut sources = ModSources::new();
/// sources.env_filter = 0.5;
/// let offsets = matrix.evaluate(&sources);
/// assert!((offsets[ModDestination::FilterCutoff.index()] - 0.4).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct ModMatrix {
    connections: [Option<ModConnection>; MAX_CONNECTIONS],
    count: usize,
}

impl Default for ModMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl ModMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self {
            connections: [None; MAX_CONNECTIONS],
            count: 0,
        }
    }

    /// Add a connection. Returns `false` when the matrix is full.
    pub fn add(&mut self, connection: ModConnection) -> bool {
        if self.count >= MAX_CONNECTIONS {
            return false;
        }
        self.connections[self.count] = Some(connection);
        self.count += 1;
        true
    }

    /// Remove a connection by index, shifting later slots down.
    pub fn remove(&mut self, index: usize) -> Option<ModConnection> {
        if index >= self.count {
            return None;
        }
        let removed = self.connections[index].take();
        for i in index..self.count - 1 {
            self.connections[i] = self.connections[i + 1].take();
        }
        self.count -= 1;
        removed
    }

    /// Remove every connection.
    pub fn clear(&mut self) {
        self.connections = [None; MAX_CONNECTIONS];
        self.count = 0;
    }

    /// Number of connections.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when no connections are present.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate over the connections.
    pub fn iter(&self) -> impl Iterator<Item = &ModConnection> {
        self.connections[..self.count].iter().filter_map(|c| c.as_ref())
    }

    /// Evaluate every enabled connection against the given source values.
    ///
    /// Multiple connections targeting one destination sum linearly. Called
    /// once per control period; destinations clamp the result when applying
    /// it to their base value.
    pub fn evaluate(&self, sources: &ModSources) -> ModOffsets {
        let mut offsets = [0.0; NUM_DESTINATIONS];

        for connection in self.iter() {
            if !connection.enabled {
                continue;
            }
            let unipolar = sources.get_unipolar(connection.source);
            let value = if connection.bipolar {
                let centered = (unipolar - 0.5) * 2.0;
                let shaped = connection.curve.shape(centered.abs());
                shaped * centered.signum()
            } else {
                connection.curve.shape(unipolar)
            };
            offsets[connection.destination.index()] += value * connection.amount;
        }

        offsets
    }
}

/// Linear ramp between control-rate offset evaluations.
///
/// Holds the per-destination offsets currently in effect and steps them
/// toward the most recent evaluation over one control period, eliminating
/// stair-stepping on heavily modulated destinations.
#[derive(Debug, Clone, Default)]
pub struct ModOffsetRamp {
    current: ModOffsets,
    step: ModOffsets,
}

impl ModOffsetRamp {
    /// Create a ramp at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply freshly evaluated offsets; the ramp reaches them after
    /// [`CONTROL_PERIOD`] calls to [`advance`](Self::advance).
    pub fn retarget(&mut self, target: &ModOffsets) {
        for i in 0..NUM_DESTINATIONS {
            self.step[i] = (target[i] - self.current[i]) / CONTROL_PERIOD as f32;
        }
    }

    /// Jump to the given offsets immediately (voice trigger).
    pub fn snap(&mut self, target: &ModOffsets) {
        self.current = *target;
        self.step = [0.0; NUM_DESTINATIONS];
    }

    /// Advance one sample and return the interpolated offsets.
    #[inline]
    pub fn advance(&mut self) -> &ModOffsets {
        for i in 0..NUM_DESTINATIONS {
            self.current[i] += self.step[i];
        }
        &self.current
    }

    /// Offsets currently in effect.
    #[inline]
    pub fn current(&self) -> &ModOffsets {
        &self.current
    }
}
