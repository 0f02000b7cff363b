//! Three-band console EQ: low shelf, peaking mid, high shelf.
//!
//! Coefficients are recomputed only when a parameter changed, and only at
//! control rate: the owning strip calls [`control_update`] once per control
//! period, and the new coefficient vectors ramp in linearly across that
//! period. The per-sample cost is three biquads plus the ramp additions.
//!
//! [`control_update`]: ThreeBandEq::control_update

use mezcla_core::{
    Biquad, BiquadCoeffs, CONTROL_PERIOD, CoeffRamp, high_shelf_coefficients,
    low_shelf_coefficients, peaking_coefficients,
};

/// Clamp ranges for the three bands.
const LOW_FREQ_RANGE: (f32, f32) = (20.0, 500.0);
const MID_FREQ_RANGE: (f32, f32) = (200.0, 5000.0);
const HIGH_FREQ_RANGE: (f32, f32) = (1000.0, 16000.0);
const GAIN_RANGE: (f32, f32) = (-12.0, 12.0);
const Q_RANGE: (f32, f32) = (0.5, 5.0);

/// Three-band equalizer with control-rate coefficient updates.
///
/// Holds duplicate filter state for left and right so the master strip can
/// run it in stereo; channel strips use the mono path, which only touches
/// the left state.
///
/// # Example
///
/// ```rust
/// use mezcla_strip::ThreeBandEq;
///
/// let mut eq = ThreeBandEq::new(48000.0);
/// eq.set_low(120.0, 3.0);
/// eq.set_mid(1000.0, -2.0, 1.0);
/// eq.set_high(8000.0, 1.5);
///
/// eq.control_update();
/// let out = eq.process_mono(0.5);
/// assert!(out.is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct ThreeBandEq {
    low_ramp: CoeffRamp,
    mid_ramp: CoeffRamp,
    high_ramp: CoeffRamp,

    low_l: Biquad,
    low_r: Biquad,
    mid_l: Biquad,
    mid_r: Biquad,
    high_l: Biquad,
    high_r: Biquad,

    low_freq: f32,
    low_gain_db: f32,
    mid_freq: f32,
    mid_gain_db: f32,
    mid_q: f32,
    high_freq: f32,
    high_gain_db: f32,

    sample_rate: f32,
    dirty: bool,
}

impl ThreeBandEq {
    /// Create a flat EQ (all gains 0 dB) at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low_ramp: CoeffRamp::new(BiquadCoeffs::IDENTITY),
            mid_ramp: CoeffRamp::new(BiquadCoeffs::IDENTITY),
            high_ramp: CoeffRamp::new(BiquadCoeffs::IDENTITY),
            low_l: Biquad::new(),
            low_r: Biquad::new(),
            mid_l: Biquad::new(),
            mid_r: Biquad::new(),
            high_l: Biquad::new(),
            high_r: Biquad::new(),
            low_freq: 100.0,
            low_gain_db: 0.0,
            mid_freq: 1000.0,
            mid_gain_db: 0.0,
            mid_q: 1.0,
            high_freq: 8000.0,
            high_gain_db: 0.0,
            sample_rate,
            dirty: true,
        }
    }

    /// Set the low shelf corner frequency and gain.
    pub fn set_low(&mut self, freq: f32, gain_db: f32) {
        let freq = freq.clamp(LOW_FREQ_RANGE.0, LOW_FREQ_RANGE.1);
        let gain_db = gain_db.clamp(GAIN_RANGE.0, GAIN_RANGE.1);
        if freq != self.low_freq || gain_db != self.low_gain_db {
            self.low_freq = freq;
            self.low_gain_db = gain_db;
            self.dirty = true;
        }
    }

    /// Set the peaking mid center frequency, gain and Q.
    pub fn set_mid(&mut self, freq: f32, gain_db: f32, q: f32) {
        let freq = freq.clamp(MID_FREQ_RANGE.0, MID_FREQ_RANGE.1);
        let gain_db = gain_db.clamp(GAIN_RANGE.0, GAIN_RANGE.1);
        let q = q.clamp(Q_RANGE.0, Q_RANGE.1);
        if freq != self.mid_freq || gain_db != self.mid_gain_db || q != self.mid_q {
            self.mid_freq = freq;
            self.mid_gain_db = gain_db;
            self.mid_q = q;
            self.dirty = true;
        }
    }

    /// Set the high shelf corner frequency and gain.
    pub fn set_high(&mut self, freq: f32, gain_db: f32) {
        let freq = freq.clamp(HIGH_FREQ_RANGE.0, HIGH_FREQ_RANGE.1);
        let gain_db = gain_db.clamp(GAIN_RANGE.0, GAIN_RANGE.1);
        if freq != self.high_freq || gain_db != self.high_gain_db {
            self.high_freq = freq;
            self.high_gain_db = gain_db;
            self.dirty = true;
        }
    }

    /// Update sample rate; recomputes coefficients at the next
    /// [`control_update`](Self::control_update).
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.dirty = true;
    }

    /// True when all gains sit at 0 dB.
    pub fn is_flat(&self) -> bool {
        self.low_gain_db == 0.0 && self.mid_gain_db == 0.0 && self.high_gain_db == 0.0
    }

    /// Control-rate entry point: when parameters changed since the last
    /// call, retarget the coefficient ramps across one control period.
    pub fn control_update(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let steps = CONTROL_PERIOD as u32;
        self.low_ramp.retarget(
            low_shelf_coefficients(self.low_freq, self.low_gain_db, self.sample_rate),
            steps,
        );
        self.mid_ramp.retarget(
            peaking_coefficients(self.mid_freq, self.mid_q, self.mid_gain_db, self.sample_rate),
            steps,
        );
        self.high_ramp.retarget(
            high_shelf_coefficients(self.high_freq, self.high_gain_db, self.sample_rate),
            steps,
        );
    }

    /// Process one mono sample (left state only).
    #[inline]
    pub fn process_mono(&mut self, x: f32) -> f32 {
        let low = self.low_ramp.advance();
        let mid = self.mid_ramp.advance();
        let high = self.high_ramp.advance();
        self.low_l.set_coeffs(low);
        self.mid_l.set_coeffs(mid);
        self.high_l.set_coeffs(high);

        let y = self.low_l.process(x);
        let y = self.mid_l.process(y);
        self.high_l.process(y)
    }

    /// Process one stereo sample pair; both channels share coefficients.
    #[inline]
    pub fn process_stereo(&mut self, l: f32, r: f32) -> (f32, f32) {
        let low = self.low_ramp.advance();
        let mid = self.mid_ramp.advance();
        let high = self.high_ramp.advance();
        self.low_l.set_coeffs(low);
        self.mid_l.set_coeffs(mid);
        self.high_l.set_coeffs(high);
        self.low_r.set_coeffs(low);
        self.mid_r.set_coeffs(mid);
        self.high_r.set_coeffs(high);

        let yl = self.high_l.process(self.mid_l.process(self.low_l.process(l)));
        let yr = self.high_r.process(self.mid_r.process(self.low_r.process(r)));
        (yl, yr)
    }

    /// Clear all filter state.
    pub fn reset(&mut self) {
        self.low_l.clear();
        self.low_r.clear();
        self.mid_l.clear();
        self.mid_r.clear();
        self.high_l.clear();
        self.high_r.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libm::sinf;

    /// Measure steady-state amplitude of a sine through the EQ.
    fn sine_gain(eq: &mut ThreeBandEq, freq: f32, sr: f32) -> f32 {
        let omega = 2.0 * core::f32::consts::PI * freq / sr;
        let mut peak = 0.0_f32;
        for n in 0..(sr as usize) {
            if n % CONTROL_PERIOD == 0 {
                eq.control_update();
            }
            let y = eq.process_mono(sinf(omega * n as f32));
            if n > sr as usize / 2 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn flat_eq_passes_signal_unchanged() {
        let mut eq = ThreeBandEq::new(48000.0);
        let gain = sine_gain(&mut eq, 1000.0, 48000.0);
        assert!((gain - 1.0).abs() < 0.01, "flat gain {gain}");
    }

    #[test]
    fn low_shelf_boosts_bass_not_treble() {
        let sr = 48000.0;
        let mut eq = ThreeBandEq::new(sr);
        eq.set_low(150.0, 6.0);

        let bass = sine_gain(&mut eq, 50.0, sr);
        eq.reset();
        let treble = sine_gain(&mut eq, 8000.0, sr);

        assert!(bass > 1.6, "bass should gain ~6 dB, got {bass}");
        assert!((treble - 1.0).abs() < 0.1, "treble should stay ~unity, got {treble}");
    }

    #[test]
    fn mid_cut_notches_the_band() {
        let sr = 48000.0;
        let mut eq = ThreeBandEq::new(sr);
        eq.set_mid(1000.0, -12.0, 2.0);

        let mid = sine_gain(&mut eq, 1000.0, sr);
        eq.reset();
        let far = sine_gain(&mut eq, 100.0, sr);

        assert!(mid < 0.35, "mid band should be cut ~12 dB, got {mid}");
        assert!((far - 1.0).abs() < 0.1, "distant band stays, got {far}");
    }

    #[test]
    fn high_shelf_boosts_treble() {
        let sr = 48000.0;
        let mut eq = ThreeBandEq::new(sr);
        eq.set_high(4000.0, 6.0);

        let treble = sine_gain(&mut eq, 12000.0, sr);
        assert!(treble > 1.6, "treble should gain ~6 dB, got {treble}");
    }

    #[test]
    fn parameters_are_clamped() {
        let mut eq = ThreeBandEq::new(48000.0);
        eq.set_low(1.0, 100.0);
        assert_eq!(eq.low_freq, 20.0);
        assert_eq!(eq.low_gain_db, 12.0);
        eq.set_mid(99999.0, -100.0, 0.0);
        assert_eq!(eq.mid_freq, 5000.0);
        assert_eq!(eq.mid_gain_db, -12.0);
        assert_eq!(eq.mid_q, 0.5);
    }

    #[test]
    fn stereo_channels_match_for_identical_input() {
        let mut eq = ThreeBandEq::new(48000.0);
        eq.set_low(120.0, 4.0);
        eq.set_mid(900.0, 3.0, 1.0);

        for n in 0..4096 {
            if n % CONTROL_PERIOD == 0 {
                eq.control_update();
            }
            let x = sinf(n as f32 * 0.05);
            let (l, r) = eq.process_stereo(x, x);
            assert_eq!(l.to_bits(), r.to_bits(), "L/R diverged at {n}");
        }
    }

    #[test]
    fn sweep_without_control_update_is_inert() {
        // Setters alone must not touch coefficients — only control_update
        // commits them, which is what bounds recomputation to control rate.
        let mut eq = ThreeBandEq::new(48000.0);
        eq.control_update();

        let before = eq.process_mono(1.0);
        let mut eq2 = ThreeBandEq::new(48000.0);
        eq2.control_update();
        eq2.set_low(500.0, 12.0); // no control_update
        let after = eq2.process_mono(1.0);

        assert_eq!(before.to_bits(), after.to_bits());
    }
}
