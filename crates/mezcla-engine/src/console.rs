//! The mixing console: channel strips, solo arbitration, bus summation.
//!
//! Channels are processed in stable id order, summed onto the master bus,
//! and the master runs the same strip chain in stereo. Mute and solo flags
//! travel in a [`ConsoleSnapshot`] that the control thread swaps in whole
//! (double-buffered via `arc-swap`), so the audio thread never sees a
//! half-updated flag set and solo arbitration costs one scan per block
//! instead of a branch per sample.

use crate::meter::MeterBank;
use mezcla_strip::ChannelStrip;

/// Per-channel console flags, set from the control thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelFlags {
    /// Channel muted by the user.
    pub mute: bool,
    /// Channel soloed. Any solo mutes every non-soloed channel.
    pub solo: bool,
}

/// Control-plane console state, swapped atomically between blocks.
///
/// `active_channels` realizes channel add/remove: the strip pool is
/// preallocated at prepare time, and a snapshot swap changes how many of
/// them participate, keeping channel ids stable for the whole session.
#[derive(Debug, Clone)]
pub struct ConsoleSnapshot {
    /// One flag set per preallocated channel.
    pub flags: Vec<ChannelFlags>,
    /// Channels currently in the mix, 0..=flags.len().
    pub active_channels: usize,
}

impl ConsoleSnapshot {
    /// All channels active, nothing muted or soloed.
    pub fn new(channels: usize) -> Self {
        Self {
            flags: vec![ChannelFlags::default(); channels],
            active_channels: channels,
        }
    }

    /// True when any active channel is soloed.
    pub fn any_solo(&self) -> bool {
        self.flags[..self.active_channels].iter().any(|f| f.solo)
    }

    /// The mute state a channel actually gets this block: solo anywhere
    /// mutes every non-soloed channel, otherwise the channel's own flag
    /// applies.
    pub fn effective_mute(&self, channel: usize) -> bool {
        if self.any_solo() {
            !self.flags[channel].solo
        } else {
            self.flags[channel].mute
        }
    }
}

/// Channel strips plus the master strip and the summing bus.
#[derive(Debug)]
pub struct MixConsole {
    strips: Vec<ChannelStrip>,
    master: ChannelStrip,
    /// Per-strip scratch output.
    strip_l: Vec<f32>,
    strip_r: Vec<f32>,
    /// Master bus accumulators.
    sum_l: Vec<f32>,
    sum_r: Vec<f32>,
}

impl MixConsole {
    /// Create `channels` strips plus the master. Scratch buffers are sized
    /// by [`prepare`](Self::prepare).
    pub fn new(sample_rate: f32, channels: usize) -> Self {
        Self {
            strips: (0..channels).map(|_| ChannelStrip::new(sample_rate)).collect(),
            master: ChannelStrip::new(sample_rate),
            strip_l: Vec::new(),
            strip_r: Vec::new(),
            sum_l: Vec::new(),
            sum_r: Vec::new(),
        }
    }

    /// Allocate scratch for the block size and propagate the sample rate.
    /// Control-thread only.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) {
        for strip in &mut self.strips {
            strip.set_sample_rate(sample_rate);
            strip.reset();
        }
        self.master.set_sample_rate(sample_rate);
        self.master.reset();

        self.strip_l = vec![0.0; block_size];
        self.strip_r = vec![0.0; block_size];
        self.sum_l = vec![0.0; block_size];
        self.sum_r = vec![0.0; block_size];
    }

    /// Number of preallocated channels.
    pub fn channel_count(&self) -> usize {
        self.strips.len()
    }

    /// Mutable access to a channel strip (parameter pushing).
    pub fn strip_mut(&mut self, channel: usize) -> &mut ChannelStrip {
        &mut self.strips[channel]
    }

    /// Read access to a channel strip.
    pub fn strip(&self, channel: usize) -> &ChannelStrip {
        &self.strips[channel]
    }

    /// Mutable access to the master strip.
    pub fn master_mut(&mut self) -> &mut ChannelStrip {
        &mut self.master
    }

    /// Read access to the master strip.
    pub fn master(&self) -> &ChannelStrip {
        &self.master
    }

    /// Process one block.
    ///
    /// `buses` is the channel-major voice bus (`block_size` samples per
    /// channel, `len` of them valid). Channel strips run in stable id
    /// order, their outputs sum onto the master bus, the master strip
    /// processes the sum, and all meters publish.
    #[allow(clippy::too_many_arguments)]
    pub fn process_block(
        &mut self,
        buses: &[f32],
        len: usize,
        block_size: usize,
        snapshot: &ConsoleSnapshot,
        meters: &MeterBank,
        out_l: &mut [f32],
        out_r: &mut [f32],
    ) {
        let active = snapshot.active_channels.min(self.strips.len());
        let any_solo = snapshot.any_solo();

        self.sum_l[..len].fill(0.0);
        self.sum_r[..len].fill(0.0);

        for ch in 0..active {
            let strip = &mut self.strips[ch];
            strip.set_muted(snapshot.effective_mute(ch));

            let bus = &buses[ch * block_size..ch * block_size + len];
            strip.process_block(bus, &mut self.strip_l[..len], &mut self.strip_r[..len], any_solo);

            for i in 0..len {
                self.sum_l[i] += self.strip_l[i];
                self.sum_r[i] += self.strip_r[i];
            }

            meters.publish_channel(ch, strip.meters());
        }

        // Inactive channels meter silence.
        for ch in active..self.strips.len() {
            meters.publish_channel(ch, Default::default());
        }

        self.master.process_block_stereo(
            &self.sum_l[..len],
            &self.sum_r[..len],
            &mut out_l[..len],
            &mut out_r[..len],
            false,
        );
        meters.publish_master(self.master.meters());
    }
}
