//! Mezcla Engine - the real-time synthesis and mixing core
//!
//! This crate assembles the voice pipeline (`mezcla-synth`) and the console
//! strips (`mezcla-strip`) into a complete engine with:
//!
//! - **Event queue**: lock-free SPSC ring for sample-accurate note and
//!   parameter events, with a NoteOff reserve lane so stuck notes are
//!   impossible ([`event`])
//! - **Parameter store**: atomic `f32` base values, audio-side smoothing,
//!   string ids resolved to dense indices on the control thread
//!   ([`params`])
//! - **Mixing console**: stable-order channel summation, mute/solo
//!   arbitration via snapshot swap, master-bus processing ([`console`])
//! - **Meters**: last-writer-wins atomic peak/RMS/gain-reduction cells
//!   ([`meter`])
//! - **Presets**: JSON parameter + modulation snapshots ([`preset`])
//! - **Driver adapter**: a cpal output stream that invokes the processor
//!   and records deadline misses ([`driver`], behind the `driver` feature)
//!
//! # Threading contract
//!
//! [`EngineHandle`] lives on the control thread; [`AudioProcessor::process`]
//! runs on the audio thread and never allocates, locks, logs, or blocks.
//! Everything they share is an atomic cell, a lock-free ring, or an
//! `arc-swap` snapshot. UI threads read meters through the handle at their
//! own cadence.
//!
//! # Quick Start
//!
//! ```rust
//! use mezcla_engine::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.prepare(48000.0, 128)?;
//!
//! engine.handle_mut().note_on(0, 60, 0.9, 0);
//!
//! let mut left = [0.0_f32; 128];
//! let mut right = [0.0_f32; 128];
//! engine.process(&mut left, &mut right);
//! # Ok::<(), mezcla_engine::Error>(())
//! ```

pub mod console;
#[cfg(feature = "driver")]
pub mod driver;
mod engine;
pub mod event;
pub mod meter;
pub mod params;
pub mod preset;
pub mod telemetry;

pub use console::{ChannelFlags, ConsoleSnapshot, MixConsole};
#[cfg(feature = "driver")]
pub use driver::AudioDriver;
pub use engine::{AudioProcessor, Engine, EngineConfig, EngineHandle};
pub use event::{Event, TimedEvent};
pub use meter::{MeterBank, MeterKind, MeterTarget};
pub use params::{ParamSpec, ParamTable};
pub use preset::{ModulationEntry, Preset};
pub use telemetry::Telemetry;

// Re-exported so hosts can build modulation patches and presets without
// depending on the DSP crates directly.
pub use mezcla_synth::{
    ModConnection, ModCurve, ModDestination, ModMatrix, ModSource, NoteId,
};

/// Engine error type. Only `prepare`-time configuration can fail; the audio
/// path is infallible by construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Block size outside 32..=2048 or not a power of two.
    #[error("invalid block size {0} (expected a power of two in 32..=2048)")]
    InvalidBlockSize(usize),

    /// Sample rate outside the supported range.
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f32),

    /// Preset (de)serialization failure.
    #[error("preset JSON error: {0}")]
    PresetJson(#[from] serde_json::Error),

    /// No audio output device available.
    #[cfg(feature = "driver")]
    #[error("no audio output device available")]
    NoDevice,

    /// Audio stream setup or runtime error.
    #[cfg(feature = "driver")]
    #[error("audio stream error: {0}")]
    Stream(String),
}
