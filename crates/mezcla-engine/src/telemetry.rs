//! Telemetry counters.
//!
//! The audio thread never logs — it bumps relaxed atomic counters, and the
//! control thread reads and reports them at whatever cadence it likes
//! (typically via `tracing` alongside its own events).

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide failure and pressure counters. All operations are lock-free
/// and relaxed; exact cross-counter consistency is not needed.
#[derive(Debug, Default)]
pub struct Telemetry {
    dropped_events: AtomicU64,
    unknown_params: AtomicU64,
    xruns: AtomicU64,
    forced_voice_frees: AtomicU64,
}

impl Telemetry {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A droppable event was rejected by a full queue.
    #[inline]
    pub fn count_dropped_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }

    /// A write or read referenced an unknown parameter or channel id.
    #[inline]
    pub fn count_unknown_param(&self) {
        self.unknown_params.fetch_add(1, Ordering::Relaxed);
    }

    /// The audio callback missed its deadline.
    #[inline]
    pub fn count_xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Voices forced FREE by the all-notes-off deadline.
    #[inline]
    pub fn count_forced_frees(&self, n: u64) {
        if n > 0 {
            self.forced_voice_frees.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Total dropped droppable events.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Total unknown-id references.
    pub fn unknown_params(&self) -> u64 {
        self.unknown_params.load(Ordering::Relaxed)
    }

    /// Total deadline misses.
    pub fn xruns(&self) -> u64 {
        self.xruns.load(Ordering::Relaxed)
    }

    /// Total voices forced FREE after all-notes-off.
    pub fn forced_voice_frees(&self) -> u64 {
        self.forced_voice_frees.load(Ordering::Relaxed)
    }
}
