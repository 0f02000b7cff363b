//! Parameter smoothing for zipper-free value changes.
//!
//! Audio parameters (trim, pan, cutoff…) need smooth transitions to avoid
//! audible zipper noise when the control thread writes new values. This
//! module provides [`SmoothedParam`], a one-pole exponential smoother that
//! can be advanced per sample or in control-period strides.

use libm::expf;

/// A parameter value with built-in exponential smoothing.
///
/// One-pole lowpass toward the target:
///
/// ```text
/// y[n] = y[n-1] + coeff * (target - y[n-1])
/// ```
///
/// The coefficient is derived from a time constant so the value covers
/// `1 - e^-1` (~63%) of the remaining distance per time constant. A zero
/// smoothing time disables smoothing entirely (instant snap), which is how
/// stepped parameters behave.
///
/// # Example
///
/// ```rust
/// use mezcla_core::SmoothedParam;
///
/// let mut trim = SmoothedParam::with_config(1.0, 48000.0, 5.0);
/// trim.set_target(0.5);
/// for _ in 0..2400 { trim.advance(); } // 50 ms at 48 kHz
/// assert!((trim.get() - 0.5).abs() < 1e-3);
/// ```
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Per-sample smoothing coefficient (1.0 = instant)
    coeff: f32,
    sample_rate: f32,
    smoothing_time_ms: f32,
}

impl SmoothedParam {
    /// Create with smoothing disabled (instant changes) at 44.1 kHz.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 44100.0,
            smoothing_time_ms: 0.0,
        }
    }

    /// Create a fully configured smoother.
    pub fn with_config(initial: f32, sample_rate: f32, smoothing_time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.smoothing_time_ms = smoothing_time_ms;
        param.recalculate_coeff();
        param
    }

    /// The standard 10 ms smoother used for gain-like parameters.
    pub fn standard(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 10.0)
    }

    /// The fast 5 ms smoother used for parameters that must track writes
    /// closely (thresholds, automation targets).
    pub fn fast(initial: f32, sample_rate: f32) -> Self {
        Self::with_config(initial, sample_rate, 5.0)
    }

    /// Set the value the parameter smooths toward.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Set target and snap to it immediately.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Update the sample rate and recalculate the coefficient.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Set the smoothing time constant in milliseconds. Zero disables
    /// smoothing.
    pub fn set_smoothing_time_ms(&mut self, time_ms: f32) {
        self.smoothing_time_ms = time_ms;
        self.recalculate_coeff();
    }

    /// Advance by one sample and return the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Advance by `n` samples in one step and return the smoothed value.
    ///
    /// Equivalent to calling [`advance`](Self::advance) `n` times:
    /// the remaining distance shrinks by `(1-coeff)^n`. Used by owners that
    /// update at control rate rather than audio rate.
    #[inline]
    pub fn advance_by(&mut self, n: u32) -> f32 {
        let keep = libm::powf(1.0 - self.coeff, n as f32);
        self.current = self.target + (self.current - self.target) * keep;
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the value is within 1e-6 of the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Jump to the target immediately.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    fn recalculate_coeff(&mut self) {
        if self.smoothing_time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            // coeff = 1 - exp(-1 / (tau * fs)), tau in seconds
            let samples = self.smoothing_time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_when_no_smoothing() {
        let mut param = SmoothedParam::with_config(1.0, 48000.0, 0.0);
        param.set_target(0.5);
        assert!((param.advance() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn converges_to_target() {
        let mut param = SmoothedParam::with_config(0.0, 48000.0, 10.0);
        param.set_target(1.0);
        for _ in 0..(48000 * 50 / 1000) {
            param.advance();
        }
        assert!((param.get() - 1.0).abs() < 0.01);
    }

    #[test]
    fn one_time_constant_covers_63_percent() {
        let mut param = SmoothedParam::with_config(0.0, 48000.0, 10.0);
        param.set_target(1.0);
        for _ in 0..480 {
            param.advance();
        }
        let expected = 1.0 - expf(-1.0);
        assert!((param.get() - expected).abs() < 0.05);
    }

    #[test]
    fn advance_by_matches_repeated_advance() {
        let mut a = SmoothedParam::with_config(0.2, 48000.0, 5.0);
        let mut b = a.clone();
        a.set_target(0.9);
        b.set_target(0.9);

        for _ in 0..32 {
            a.advance();
        }
        b.advance_by(32);

        assert!(
            (a.get() - b.get()).abs() < 1e-5,
            "per-sample {} vs strided {}",
            a.get(),
            b.get()
        );
    }

    #[test]
    fn trajectory_is_monotonic() {
        let mut param = SmoothedParam::with_config(0.1, 48000.0, 5.0);
        param.set_target(0.9);
        let mut prev = param.get();
        for _ in 0..2000 {
            let v = param.advance();
            assert!(v >= prev, "smoothing must be monotonic upward");
            prev = v;
        }
    }

    #[test]
    fn settles_and_snaps() {
        let mut param = SmoothedParam::with_config(0.0, 48000.0, 10.0);
        param.set_target(1.0);
        assert!(!param.is_settled());
        param.snap_to_target();
        assert!(param.is_settled());
        assert_eq!(param.get(), 1.0);
    }
}
