//! Lock-free meter publishing.
//!
//! Peak, RMS and compressor gain reduction per channel (plus the master
//! bus) live in atomic cells written once per block by the audio thread and
//! read by UI threads at their own cadence. Last writer wins; there is no
//! back-pressure and no history.

use crate::params::AtomicF32;
use mezcla_strip::StripMeters;

/// Which measurement to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterKind {
    /// Block peak of |L|, |R|.
    Peak,
    /// Block RMS across both channels.
    Rms,
    /// Compressor gain reduction in dB (non-positive).
    GainReduction,
}

/// Which strip to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterTarget {
    /// A mixer channel by stable id.
    Channel(usize),
    /// The master bus.
    Master,
}

#[derive(Debug)]
struct MeterCells {
    peak: AtomicF32,
    rms: AtomicF32,
    gain_reduction_db: AtomicF32,
}

impl MeterCells {
    fn new() -> Self {
        Self {
            peak: AtomicF32::new(0.0),
            rms: AtomicF32::new(0.0),
            gain_reduction_db: AtomicF32::new(0.0),
        }
    }

    fn publish(&self, meters: StripMeters) {
        self.peak.store(meters.peak);
        self.rms.store(meters.rms);
        self.gain_reduction_db.store(meters.gain_reduction_db);
    }

    fn read(&self, kind: MeterKind) -> f32 {
        match kind {
            MeterKind::Peak => self.peak.load(),
            MeterKind::Rms => self.rms.load(),
            MeterKind::GainReduction => self.gain_reduction_db.load(),
        }
    }
}

/// All meter cells for one engine instance.
#[derive(Debug)]
pub struct MeterBank {
    channels: Vec<MeterCells>,
    master: MeterCells,
}

impl MeterBank {
    /// Create cells for `channels` mixer channels plus the master.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| MeterCells::new()).collect(),
            master: MeterCells::new(),
        }
    }

    /// Number of channel slots.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Publish one channel's block meters (audio thread).
    pub fn publish_channel(&self, channel: usize, meters: StripMeters) {
        if let Some(cells) = self.channels.get(channel) {
            cells.publish(meters);
        }
    }

    /// Publish the master meters (audio thread).
    pub fn publish_master(&self, meters: StripMeters) {
        self.master.publish(meters);
    }

    /// Read a meter. Unknown channels read 0.0 — the caller counts the
    /// telemetry, the reader stays infallible.
    pub fn read(&self, target: MeterTarget, kind: MeterKind) -> f32 {
        match target {
            MeterTarget::Channel(ch) => self
                .channels
                .get(ch)
                .map_or(0.0, |cells| cells.read(kind)),
            MeterTarget::Master => self.master.read(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_read() {
        let bank = MeterBank::new(2);
        bank.publish_channel(
            1,
            StripMeters {
                peak: 0.8,
                rms: 0.4,
                gain_reduction_db: -3.0,
            },
        );
        bank.publish_master(StripMeters {
            peak: 0.9,
            rms: 0.5,
            gain_reduction_db: 0.0,
        });

        assert_eq!(bank.read(MeterTarget::Channel(1), MeterKind::Peak), 0.8);
        assert_eq!(bank.read(MeterTarget::Channel(1), MeterKind::Rms), 0.4);
        assert_eq!(
            bank.read(MeterTarget::Channel(1), MeterKind::GainReduction),
            -3.0
        );
        assert_eq!(bank.read(MeterTarget::Master, MeterKind::Peak), 0.9);
    }

    #[test]
    fn unknown_channel_reads_zero() {
        let bank = MeterBank::new(2);
        assert_eq!(bank.read(MeterTarget::Channel(99), MeterKind::Peak), 0.0);
    }

    #[test]
    fn last_writer_wins() {
        let bank = MeterBank::new(1);
        for i in 0..10 {
            bank.publish_channel(
                0,
                StripMeters {
                    peak: i as f32 / 10.0,
                    rms: 0.0,
                    gain_reduction_db: 0.0,
                },
            );
        }
        assert_eq!(bank.read(MeterTarget::Channel(0), MeterKind::Peak), 0.9);
    }
}
