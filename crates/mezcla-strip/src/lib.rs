//! Mezcla Strip - the per-channel console DSP chain
//!
//! Every mixer channel runs the same fixed-order chain:
//!
//! ```text
//! silence short-circuit -> input trim -> drive -> console saturation
//!   -> 3-band EQ -> compressor -> limiter -> pan -> output trim -> meter
//! ```
//!
//! The order is immutable at runtime — there is no effect graph and no
//! dynamic dispatch on the audio path, just the [`ChannelStrip`] struct
//! calling its stages in sequence.
//!
//! Expensive work runs at control rate: EQ biquad coefficients and the
//! compressor's gain reduction are recomputed every
//! [`CONTROL_PERIOD`](mezcla_core::CONTROL_PERIOD) samples and linearly
//! interpolated in between, which is what lets dozens of strips share one
//! audio callback.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod compressor;
pub mod eq;
pub mod limiter;
pub mod saturation;
pub mod strip;

pub use compressor::Compressor;
pub use eq::ThreeBandEq;
pub use limiter::Limiter;
pub use saturation::{ConsoleMode, Drive, console_saturate};
pub use strip::{ChannelStrip, StripMeters};
