//! The channel strip: every mixer channel's fixed-order DSP chain.
//!
//! Order, immutable at runtime:
//!
//! 1. Silence short-circuit (idle channels cost one peak scan)
//! 2. Input trim
//! 3. Drive saturation (optional)
//! 4. Console saturation (mode-dependent, Pure = identity)
//! 5. Three-band EQ (control-rate coefficients)
//! 6. Compressor (control-rate gain, interpolated)
//! 7. Limiter (one-control-period lookahead, hard ceiling)
//! 8. Pan (equal-power for the mono channel path, balance for the stereo
//!    master path)
//! 9. Output trim
//! 10. Meter capture
//!
//! Mute clears the output buffer before the meter capture, so a muted
//! channel meters silence while its dynamics keep tracking for a seamless
//! unmute.

use crate::compressor::Compressor;
use crate::eq::ThreeBandEq;
use crate::limiter::Limiter;
use crate::saturation::{ConsoleMode, Drive, console_saturate};
use mezcla_core::{CONTROL_PERIOD, SILENCE_FLOOR, SmoothedParam, db_to_linear, pan_gains};

/// Block meter capture: published by the console after each block.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripMeters {
    /// Peak of |L|, |R| over the block.
    pub peak: f32,
    /// RMS over both channels of the block.
    pub rms: f32,
    /// Compressor gain reduction in dB (non-positive).
    pub gain_reduction_db: f32,
}

/// One console channel's processing chain.
///
/// Channel strips are mono-in/stereo-out ([`process_block`]); the master
/// strip reuses the same chain in stereo ([`process_block_stereo`]), where
/// the pan stage acts as a balance control so a centered mix passes at
/// unity.
///
/// [`process_block`]: Self::process_block
/// [`process_block_stereo`]: Self::process_block_stereo
#[derive(Debug, Clone)]
pub struct ChannelStrip {
    input_trim: SmoothedParam,
    drive: Drive,
    drive_enabled: bool,
    console_mode: ConsoleMode,
    eq: ThreeBandEq,
    comp: Compressor,
    limiter: Limiter,
    pan: SmoothedParam,
    output_trim: SmoothedParam,
    muted: bool,

    /// Samples skipped by the silence short-circuit.
    idle_samples: u64,
    meters: StripMeters,
}

impl ChannelStrip {
    /// Create a transparent strip at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            input_trim: SmoothedParam::fast(1.0, sample_rate),
            drive: Drive::new(sample_rate),
            drive_enabled: false,
            console_mode: ConsoleMode::Pure,
            eq: ThreeBandEq::new(sample_rate),
            comp: Compressor::new(sample_rate),
            limiter: Limiter::new(sample_rate),
            pan: SmoothedParam::fast(0.0, sample_rate),
            output_trim: SmoothedParam::fast(1.0, sample_rate),
            muted: false,
            idle_samples: 0,
            meters: StripMeters::default(),
        }
    }

    /// Set input trim in dB, clamped to [-24, 24].
    pub fn set_input_trim_db(&mut self, db: f32) {
        self.input_trim.set_target(db_to_linear(db.clamp(-24.0, 24.0)));
    }

    /// Set the drive amount in [0, 1].
    pub fn set_drive_amount(&mut self, amount: f32) {
        self.drive.set_amount(amount);
    }

    /// Enable or disable the drive stage.
    pub fn set_drive_enabled(&mut self, enabled: bool) {
        self.drive_enabled = enabled;
    }

    /// Select the console saturation mode.
    pub fn set_console_mode(&mut self, mode: ConsoleMode) {
        self.console_mode = mode;
    }

    /// Low shelf frequency and gain.
    pub fn set_eq_low(&mut self, freq: f32, gain_db: f32) {
        self.eq.set_low(freq, gain_db);
    }

    /// Peaking mid frequency, gain and Q.
    pub fn set_eq_mid(&mut self, freq: f32, gain_db: f32, q: f32) {
        self.eq.set_mid(freq, gain_db, q);
    }

    /// High shelf frequency and gain.
    pub fn set_eq_high(&mut self, freq: f32, gain_db: f32) {
        self.eq.set_high(freq, gain_db);
    }

    /// Compressor threshold in dB.
    pub fn set_comp_threshold_db(&mut self, db: f32) {
        self.comp.set_threshold_db(db);
    }

    /// Compressor ratio.
    pub fn set_comp_ratio(&mut self, ratio: f32) {
        self.comp.set_ratio(ratio);
    }

    /// Compressor attack in milliseconds.
    pub fn set_comp_attack_ms(&mut self, ms: f32) {
        self.comp.set_attack_ms(ms);
    }

    /// Compressor release in milliseconds.
    pub fn set_comp_release_ms(&mut self, ms: f32) {
        self.comp.set_release_ms(ms);
    }

    /// Compressor makeup gain in dB.
    pub fn set_comp_makeup_db(&mut self, db: f32) {
        self.comp.set_makeup_db(db);
    }

    /// Limiter ceiling in dB.
    pub fn set_limiter_threshold_db(&mut self, db: f32) {
        self.limiter.set_threshold_db(db);
    }

    /// Pan position in [-1, 1].
    pub fn set_pan(&mut self, pan: f32) {
        self.pan.set_target(pan.clamp(-1.0, 1.0));
    }

    /// Output trim in dB, clamped to [-24, 24].
    pub fn set_output_trim_db(&mut self, db: f32) {
        self.output_trim.set_target(db_to_linear(db.clamp(-24.0, 24.0)));
    }

    /// Mute flag. Arbitrated mute (solo on another channel) also lands here
    /// via the console's snapshot.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Current mute flag.
    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Samples skipped by the silence short-circuit since creation.
    pub fn idle_samples(&self) -> u64 {
        self.idle_samples
    }

    /// Meters captured for the last processed block.
    pub fn meters(&self) -> StripMeters {
        self.meters
    }

    /// Update the sample rate on every stage.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.input_trim.set_sample_rate(sample_rate);
        self.drive.set_sample_rate(sample_rate);
        self.eq.set_sample_rate(sample_rate);
        self.comp.set_sample_rate(sample_rate);
        self.limiter.set_sample_rate(sample_rate);
        self.pan.set_sample_rate(sample_rate);
        self.output_trim.set_sample_rate(sample_rate);
    }

    /// Clear all DSP state (filters, detectors, lookahead).
    pub fn reset(&mut self) {
        self.eq.reset();
        self.comp.reset();
        self.limiter.reset();
    }

    /// True when no smoothed parameter is mid-transition — a precondition
    /// for the silence short-circuit (a moving parameter counts as
    /// automation).
    fn params_settled(&self) -> bool {
        self.input_trim.is_settled()
            && self.pan.is_settled()
            && self.output_trim.is_settled()
            && self.drive.is_settled()
    }

    /// Process one block, mono in, stereo out (equal-power pan).
    ///
    /// `force_active` suppresses the silence short-circuit; the console
    /// raises it while solo is engaged anywhere.
    pub fn process_block(
        &mut self,
        input: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
        force_active: bool,
    ) {
        let len = input.len();
        debug_assert!(out_l.len() >= len && out_r.len() >= len);

        // 1. Silence short-circuit.
        let peak_in = input.iter().fold(0.0_f32, |a, &s| a.max(s.abs()));
        if peak_in < SILENCE_FLOOR && !force_active && self.params_settled() {
            out_l[..len].fill(0.0);
            out_r[..len].fill(0.0);
            self.idle_samples += len as u64;
            self.meters = StripMeters {
                peak: 0.0,
                rms: 0.0,
                gain_reduction_db: self.comp.gain_reduction_db(),
            };
            return;
        }

        let mut offset = 0;
        while offset < len {
            let n = CONTROL_PERIOD.min(len - offset);
            self.eq.control_update();
            self.comp.begin_period(n as u32);

            for i in offset..offset + n {
                let x = input[i] * self.input_trim.advance();
                let x = if self.drive_enabled {
                    self.drive.process(x)
                } else {
                    x
                };
                let x = console_saturate(self.console_mode, x);
                let x = self.eq.process_mono(x);
                let x = self.comp.process(x);
                let x = self.limiter.process(x);

                let (gain_l, gain_r) = pan_gains(self.pan.advance());
                let trim = self.output_trim.advance();
                out_l[i] = x * gain_l * trim;
                out_r[i] = x * gain_r * trim;
            }
            offset += n;
        }

        if self.muted {
            out_l[..len].fill(0.0);
            out_r[..len].fill(0.0);
        }

        self.capture_meters(&out_l[..len], &out_r[..len]);
    }

    /// Process one block in stereo — the master-bus path.
    ///
    /// Identical chain, but the pan stage is a balance control (unity at
    /// center) so the summed mix is not re-attenuated.
    pub fn process_block_stereo(
        &mut self,
        in_l: &[f32],
        in_r: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
        force_active: bool,
    ) {
        let len = in_l.len();
        debug_assert_eq!(in_l.len(), in_r.len());
        debug_assert!(out_l.len() >= len && out_r.len() >= len);

        let peak_in = in_l
            .iter()
            .chain(in_r.iter())
            .fold(0.0_f32, |a, &s| a.max(s.abs()));
        if peak_in < SILENCE_FLOOR && !force_active && self.params_settled() {
            out_l[..len].fill(0.0);
            out_r[..len].fill(0.0);
            self.idle_samples += len as u64;
            self.meters = StripMeters {
                peak: 0.0,
                rms: 0.0,
                gain_reduction_db: self.comp.gain_reduction_db(),
            };
            return;
        }

        let mut offset = 0;
        while offset < len {
            let n = CONTROL_PERIOD.min(len - offset);
            self.eq.control_update();
            self.comp.begin_period(n as u32);

            for i in offset..offset + n {
                let trim_in = self.input_trim.advance();
                let (mut l, mut r) = (in_l[i] * trim_in, in_r[i] * trim_in);
                if self.drive_enabled {
                    (l, r) = self.drive.process_stereo(l, r);
                }
                l = console_saturate(self.console_mode, l);
                r = console_saturate(self.console_mode, r);
                (l, r) = self.eq.process_stereo(l, r);
                (l, r) = self.comp.process_stereo(l, r);
                (l, r) = self.limiter.process_stereo(l, r);

                // Balance: center passes at unity, extremes mute one side.
                let pan = self.pan.advance();
                let bal_l = (1.0 - pan).min(1.0);
                let bal_r = (1.0 + pan).min(1.0);
                let trim = self.output_trim.advance();
                out_l[i] = l * bal_l * trim;
                out_r[i] = r * bal_r * trim;
            }
            offset += n;
        }

        if self.muted {
            out_l[..len].fill(0.0);
            out_r[..len].fill(0.0);
        }

        self.capture_meters(&out_l[..len], &out_r[..len]);
    }

    fn capture_meters(&mut self, l: &[f32], r: &[f32]) {
        let mut peak = 0.0_f32;
        let mut sum_sq = 0.0_f32;
        for i in 0..l.len() {
            peak = peak.max(l[i].abs()).max(r[i].abs());
            sum_sq += l[i] * l[i] + r[i] * r[i];
        }
        let rms = if l.is_empty() {
            0.0
        } else {
            libm::sqrtf(sum_sq / (2.0 * l.len() as f32))
        };
        self.meters = StripMeters {
            peak,
            rms,
            gain_reduction_db: self.comp.gain_reduction_db(),
        };
    }
}
