//! Mezcla Core - DSP primitives for the synthesis and mixing engine
//!
//! This crate provides the foundational building blocks shared by the voice
//! pipeline and the console strip, designed for real-time audio processing
//! with zero allocation in the audio path.
//!
//! # Core Abstractions
//!
//! ## Filters
//!
//! - [`Biquad`] - Second-order IIR filter (Direct Form I)
//! - [`BiquadCoeffs`] - Normalized coefficient vector with RBJ cookbook constructors
//! - [`CoeffRamp`] - Linear coefficient interpolation between control-rate updates
//! - [`FormantResonator`] - Resonant pole pair, stable for r < 1
//!
//! ## Parameter Smoothing
//!
//! Zipper-free parameter changes for click-free automation:
//!
//! - [`SmoothedParam`] - Exponential smoothing (RC-like response)
//!
//! ## Modulation & Dynamics
//!
//! - [`Lfo`] - Low-frequency oscillator (4 waveforms)
//! - [`EnvelopeFollower`] - Amplitude detection with peak or RMS ballistics
//!
//! ## Utilities
//!
//! - Math functions: [`db_to_linear`], [`linear_to_db`], [`soft_clip`],
//!   [`pan_gains`], etc.
//!
//! # Control Rate
//!
//! Expensive recomputation (filter coefficients, modulation routing, compressor
//! gain) happens once every [`CONTROL_PERIOD`] samples; the types in this crate
//! provide the interpolation needed to bridge updates without zipper noise.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! mezcla-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations in audio processing paths
//! - **No dependencies on std**: Pure `no_std` with `libm` for math
//! - **Clamped inputs**: DSP primitives never fail at runtime

#![cfg_attr(not(feature = "std"), no_std)]

pub mod biquad;
pub mod follower;
pub mod lfo;
pub mod math;
pub mod param;
pub mod resonator;

// Re-export main types at crate root
pub use biquad::{
    Biquad, BiquadCoeffs, CoeffRamp, high_shelf_coefficients, low_shelf_coefficients,
    lowpass_coefficients, peaking_coefficients,
};
pub use follower::{DetectionMode, EnvelopeFollower};
pub use lfo::{Lfo, LfoWaveform};
pub use math::{
    SILENCE_DB, SILENCE_FLOOR, db_to_linear, flush_denormal, linear_to_db, ms_to_samples,
    pan_gains, samples_to_ms, soft_clip,
};
pub use param::SmoothedParam;
pub use resonator::FormantResonator;

/// Number of audio samples per control-rate update.
///
/// Modulation routing, biquad coefficients, and compressor gain reduction are
/// recomputed once per control period and interpolated in between. 32 samples
/// is ~1.5 kHz at 48 kHz — well above the audible zipper range once ramped.
pub const CONTROL_PERIOD: usize = 32;
