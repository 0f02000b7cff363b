//! Mezcla Synth - the per-voice synthesis pipeline
//!
//! This crate provides the building blocks of one polyphonic voice and the
//! manager that allocates voices to notes:
//!
//! - [`Oscillator`] - band-limited waveform generation (PolyBLEP)
//! - [`AdsrEnvelope`] - five-state envelope with selectable curve shapes
//! - [`ModMatrix`] - source-to-destination modulation routing, evaluated at
//!   control rate with ramped offsets
//! - [`Voice`] - oscillators + filter + envelopes + LFOs + formant resonator
//! - [`VoiceManager`] - preallocated voice pool with deterministic stealing
//!
//! Everything here runs on the audio thread: no allocation, no locking, no
//! I/O. Configuration values arrive as a plain [`SynthParams`] snapshot each
//! control period; note events arrive through the manager's `note_on` /
//! `note_off` entry points.
//!
//! # no_std Support
//!
//! `no_std` compatible behind the default `std` feature, like `mezcla-core`.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod envelope;
pub mod mod_matrix;
pub mod oscillator;
pub mod voice;

pub use envelope::{AdsrEnvelope, EnvelopeCurve, EnvelopeState};
pub use mod_matrix::{
    MAX_CONNECTIONS, ModConnection, ModCurve, ModDestination, ModMatrix, ModOffsetRamp, ModOffsets,
    ModSource, ModSources, NUM_DESTINATIONS,
};
pub use oscillator::{Oscillator, Waveform};
pub use voice::{
    NoteId, SynthParams, Voice, VoiceManager, VoiceState, cents_to_ratio, midi_to_freq,
};
