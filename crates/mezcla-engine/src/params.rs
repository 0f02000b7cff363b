//! Lock-free parameter store with audio-side smoothing.
//!
//! Every parameter is one `f32` cell: the control thread writes the base
//! value atomically, the audio thread reads it and smooths toward it once
//! per control period. Single-word atomics mean no partial write can ever
//! be observed; grouped visibility (presets) goes through snapshot
//! application on the control thread.
//!
//! String ids resolve to dense indices on the control thread only; the
//! audio thread works exclusively with indices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` cell readable and writable across threads without locks.
///
/// Backed by `AtomicU32` bit casts — no unsafe code, and a single store is
/// indivisible, so torn reads are impossible. Relaxed ordering is enough:
/// each cell is an independent value with no cross-cell invariants.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    /// Create a cell holding `value`.
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// Read the current value.
    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Replace the value.
    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Static description of one parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Stable string tag, e.g. `"filter_cutoff"` or `"ch0_pan"`.
    pub id: String,
    /// Lower bound; writes clamp here.
    pub min: f32,
    /// Upper bound; writes clamp here.
    pub max: f32,
    /// Initial value.
    pub default: f32,
    /// Smoothing time constant in milliseconds; ignored for stepped.
    pub smoothing_ms: f32,
    /// Stepped parameters snap at the next control period instead of
    /// smoothing (waveform selectors, mode switches, booleans).
    pub stepped: bool,
}

impl ParamSpec {
    /// A smoothed continuous parameter with the default 5 ms time constant.
    pub fn smooth(id: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            default,
            smoothing_ms: 5.0,
            stepped: false,
        }
    }

    /// A stepped parameter (snaps at the block boundary).
    pub fn stepped(id: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            default,
            smoothing_ms: 0.0,
            stepped: true,
        }
    }

    /// Override the smoothing time constant.
    pub fn with_smoothing_ms(mut self, ms: f32) -> Self {
        self.smoothing_ms = ms;
        self
    }
}

/// The shared half of the store: specs plus atomic base values.
///
/// Built once at engine construction; immutable afterwards, so both threads
/// can hold an `Arc` to it.
#[derive(Debug)]
pub struct ParamTable {
    specs: Vec<ParamSpec>,
    base: Vec<AtomicF32>,
    index: HashMap<String, usize>,
}

impl ParamTable {
    /// Build the table from a spec list. Duplicate ids keep the first
    /// registration.
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        let mut index = HashMap::with_capacity(specs.len());
        let mut base = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            index.entry(spec.id.clone()).or_insert(i);
            base.push(AtomicF32::new(spec.default));
        }
        Self { specs, base, index }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolve a string id to its dense index.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Spec for an index.
    pub fn spec(&self, index: usize) -> &ParamSpec {
        &self.specs[index]
    }

    /// Iterate `(id, current base value)` pairs — preset dumping.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.specs
            .iter()
            .zip(self.base.iter())
            .map(|(spec, cell)| (spec.id.as_str(), cell.load()))
    }

    /// Write a base value by index, clamped to the spec range.
    #[inline]
    pub fn set(&self, index: usize, value: f32) {
        let spec = &self.specs[index];
        self.base[index].store(value.clamp(spec.min, spec.max));
    }

    /// Write a base value by string id. Returns `false` for unknown ids.
    pub fn set_by_id(&self, id: &str, value: f32) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.set(index, value);
                true
            }
            None => false,
        }
    }

    /// Read a base value by index.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.base[index].load()
    }

    /// Read a base value by string id.
    pub fn get_by_id(&self, id: &str) -> Option<f32> {
        self.index_of(id).map(|i| self.get(i))
    }
}

/// The audio thread's private smoothing state, one slot per parameter.
///
/// [`step`](Self::step) advances every slot by one control period:
///
/// ```text
/// current += coeff * (base - current)
/// ```
///
/// with `coeff` derived from the spec's time constant and the control
/// period length. Stepped parameters snap straight to the base value.
#[derive(Debug)]
pub struct SmootherBank {
    current: Vec<f32>,
    coeff: Vec<f32>,
    stepped: Vec<bool>,
}

impl SmootherBank {
    /// Build the bank for a table at the given sample rate and control
    /// period. Current values start at the bases.
    pub fn new(table: &ParamTable, sample_rate: f32, control_period: usize) -> Self {
        let mut current = Vec::with_capacity(table.len());
        let mut coeff = Vec::with_capacity(table.len());
        let mut stepped = Vec::with_capacity(table.len());
        for i in 0..table.len() {
            let spec = table.spec(i);
            current.push(table.get(i));
            stepped.push(spec.stepped);
            if spec.stepped || spec.smoothing_ms <= 0.0 {
                coeff.push(1.0);
            } else {
                // Periods per time constant; coeff covers 1-1/e per tau.
                let samples = spec.smoothing_ms / 1000.0 * sample_rate;
                let periods = samples / control_period as f32;
                coeff.push(1.0 - (-1.0 / periods.max(1e-3)).exp());
            }
        }
        Self {
            current,
            coeff,
            stepped,
        }
    }

    /// Advance every slot one control period toward its base value.
    pub fn step(&mut self, table: &ParamTable) {
        for i in 0..self.current.len() {
            let base = table.get(i);
            if self.stepped[i] {
                self.current[i] = base;
            } else {
                self.current[i] += self.coeff[i] * (base - self.current[i]);
            }
        }
    }

    /// Smoothed value of a slot.
    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        self.current[index]
    }

    /// Snap every slot to its base — used at prepare so playback starts
    /// from the configured values instead of gliding in from defaults.
    pub fn snap_all(&mut self, table: &ParamTable) {
        for i in 0..self.current.len() {
            self.current[i] = table.get(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_table() -> ParamTable {
        ParamTable::new(vec![
            ParamSpec::smooth("gain", 0.0, 1.0, 0.5),
            ParamSpec::stepped("mode", 0.0, 3.0, 0.0),
            ParamSpec::smooth("cutoff", 0.0, 1.0, 1.0).with_smoothing_ms(10.0),
        ])
    }

    #[test]
    fn lookup_and_defaults() {
        let table = test_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of("gain"), Some(0));
        assert_eq!(table.index_of("nope"), None);
        assert_eq!(table.get_by_id("gain"), Some(0.5));
        assert_eq!(table.get_by_id("cutoff"), Some(1.0));
    }

    #[test]
    fn writes_clamp_to_range() {
        let table = test_table();
        table.set_by_id("gain", 7.0);
        assert_eq!(table.get_by_id("gain"), Some(1.0));
        table.set_by_id("gain", -7.0);
        assert_eq!(table.get_by_id("gain"), Some(0.0));
    }

    #[test]
    fn unknown_id_reports_false() {
        let table = test_table();
        assert!(!table.set_by_id("bogus", 0.5));
        assert!(table.get_by_id("bogus").is_none());
    }

    #[test]
    fn atomic_f32_roundtrips_bits() {
        let cell = AtomicF32::new(0.1);
        assert_eq!(cell.load().to_bits(), 0.1_f32.to_bits());
        cell.store(-0.0);
        assert_eq!(cell.load().to_bits(), (-0.0_f32).to_bits());
    }

    #[test]
    fn smoother_converges_to_base() {
        let table = test_table();
        let mut bank = SmootherBank::new(&table, 48000.0, 32);

        table.set_by_id("gain", 1.0);
        // 5 ms at 48 kHz = 240 samples = 7.5 periods; run 10 time constants.
        for _ in 0..75 {
            bank.step(&table);
        }
        assert!((bank.value(0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn smoother_trajectory_is_monotonic() {
        let table = test_table();
        let mut bank = SmootherBank::new(&table, 48000.0, 32);
        table.set_by_id("cutoff", 0.0);

        let mut prev = bank.value(2);
        for _ in 0..100 {
            bank.step(&table);
            assert!(bank.value(2) <= prev);
            prev = bank.value(2);
        }
    }

    #[test]
    fn stepped_snaps_immediately() {
        let table = test_table();
        let mut bank = SmootherBank::new(&table, 48000.0, 32);
        table.set_by_id("mode", 2.0);
        bank.step(&table);
        assert_eq!(bank.value(1), 2.0);
    }

    #[test]
    fn snap_all_adopts_bases() {
        let table = test_table();
        let mut bank = SmootherBank::new(&table, 48000.0, 32);
        table.set_by_id("gain", 0.9);
        table.set_by_id("cutoff", 0.2);
        bank.snap_all(&table);
        assert_eq!(bank.value(0), 0.9);
        assert_eq!(bank.value(2), 0.2);
    }
}
