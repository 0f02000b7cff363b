//! Preset format: a named parameter snapshot plus a modulation patch.
//!
//! JSON via serde:
//!
//! ```json
//! {
//!   "name": "Init",
//!   "parameters": { "filter_cutoff": 1.0, "osc1_level": 1.0 },
//!   "modulation": [
//!     { "source": "env_filter", "destination": "filter_cutoff",
//!       "amount": 0.5, "curve": "linear", "bipolar": false, "enabled": true }
//!   ]
//! }
//! ```
//!
//! Float round-trips are bit-exact: serde_json emits the shortest decimal
//! that parses back to the identical `f32`.

use crate::Error;
use mezcla_synth::{ModConnection, ModCurve, ModDestination, ModMatrix, ModSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One modulation connection in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulationEntry {
    /// Source tag, e.g. `"lfo1"`, `"env_amp"`, `"macro3"`.
    pub source: String,
    /// Destination tag, e.g. `"filter_cutoff"`.
    pub destination: String,
    /// Amount in [-1, 1].
    pub amount: f32,
    /// Curve tag: `"linear"`, `"exponential"`, `"logarithmic"`, `"s_curve"`.
    #[serde(default = "default_curve")]
    pub curve: String,
    /// Bipolar flag.
    #[serde(default)]
    pub bipolar: bool,
    /// Enabled flag.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_curve() -> String {
    "linear".to_string()
}

fn default_enabled() -> bool {
    true
}

/// A parameter + modulation snapshot, applied atomically from the control
/// thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Display name.
    pub name: String,
    /// Parameter id to value. BTreeMap keeps dumps deterministic.
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
    /// Modulation patch; replaces the whole matrix on apply.
    #[serde(default)]
    pub modulation: Vec<ModulationEntry>,
}

impl Preset {
    /// An empty preset with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
            modulation: Vec::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_parameter(mut self, id: impl Into<String>, value: f32) -> Self {
        self.parameters.insert(id.into(), value);
        self
    }

    /// Builder-style modulation insertion.
    pub fn with_modulation(mut self, entry: ModulationEntry) -> Self {
        self.modulation.push(entry);
        self
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::from)
    }

    /// Build the modulation matrix from the entries.
    ///
    /// Unknown tags are skipped; the caller counts them. Entries past the
    /// matrix capacity are dropped the same way.
    pub fn to_matrix(&self) -> (ModMatrix, usize) {
        let mut matrix = ModMatrix::new();
        let mut skipped = 0;
        for entry in &self.modulation {
            let (Some(source), Some(destination), Some(curve)) = (
                source_from_tag(&entry.source),
                destination_from_tag(&entry.destination),
                curve_from_tag(&entry.curve),
            ) else {
                skipped += 1;
                continue;
            };
            let mut connection = ModConnection::new(source, destination, entry.amount)
                .with_curve(curve)
                .with_bipolar(entry.bipolar);
            connection.enabled = entry.enabled;
            if !matrix.add(connection) {
                skipped += 1;
            }
        }
        (matrix, skipped)
    }

    /// Serialize a matrix back into modulation entries.
    pub fn entries_from_matrix(matrix: &ModMatrix) -> Vec<ModulationEntry> {
        matrix
            .iter()
            .map(|c| ModulationEntry {
                source: source_tag(c.source).to_string(),
                destination: destination_tag(c.destination).to_string(),
                amount: c.amount,
                curve: curve_tag(c.curve).to_string(),
                bipolar: c.bipolar,
                enabled: c.enabled,
            })
            .collect()
    }
}

fn source_tag(source: ModSource) -> &'static str {
    match source {
        ModSource::Lfo1 => "lfo1",
        ModSource::Lfo2 => "lfo2",
        ModSource::EnvAmp => "env_amp",
        ModSource::EnvFilter => "env_filter",
        ModSource::Velocity => "velocity",
        ModSource::KeyTrack => "key_track",
        ModSource::Macro(0) => "macro1",
        ModSource::Macro(1) => "macro2",
        ModSource::Macro(2) => "macro3",
        ModSource::Macro(3) => "macro4",
        ModSource::Macro(4) => "macro5",
        ModSource::Macro(5) => "macro6",
        ModSource::Macro(6) => "macro7",
        ModSource::Macro(_) => "macro8",
    }
}

fn source_from_tag(tag: &str) -> Option<ModSource> {
    Some(match tag {
        "lfo1" => ModSource::Lfo1,
        "lfo2" => ModSource::Lfo2,
        "env_amp" => ModSource::EnvAmp,
        "env_filter" => ModSource::EnvFilter,
        "velocity" => ModSource::Velocity,
        "key_track" => ModSource::KeyTrack,
        "macro1" => ModSource::Macro(0),
        "macro2" => ModSource::Macro(1),
        "macro3" => ModSource::Macro(2),
        "macro4" => ModSource::Macro(3),
        "macro5" => ModSource::Macro(4),
        "macro6" => ModSource::Macro(5),
        "macro7" => ModSource::Macro(6),
        "macro8" => ModSource::Macro(7),
        _ => return None,
    })
}

fn destination_tag(destination: ModDestination) -> &'static str {
    match destination {
        ModDestination::OscPitch => "osc_pitch",
        ModDestination::FilterCutoff => "filter_cutoff",
        ModDestination::FilterResonance => "filter_resonance",
        ModDestination::Amplitude => "amplitude",
        ModDestination::Lfo1Rate => "lfo1_rate",
        ModDestination::Lfo2Rate => "lfo2_rate",
    }
}

fn destination_from_tag(tag: &str) -> Option<ModDestination> {
    Some(match tag {
        "osc_pitch" => ModDestination::OscPitch,
        "filter_cutoff" => ModDestination::FilterCutoff,
        "filter_resonance" => ModDestination::FilterResonance,
        "amplitude" => ModDestination::Amplitude,
        "lfo1_rate" => ModDestination::Lfo1Rate,
        "lfo2_rate" => ModDestination::Lfo2Rate,
        _ => return None,
    })
}

fn curve_tag(curve: ModCurve) -> &'static str {
    match curve {
        ModCurve::Linear => "linear",
        ModCurve::Exponential => "exponential",
        ModCurve::Logarithmic => "logarithmic",
        ModCurve::SCurve => "s_curve",
    }
}

fn curve_from_tag(tag: &str) -> Option<ModCurve> {
    Some(match tag {
        "linear" => ModCurve::Linear,
        "exponential" => ModCurve::Exponential,
        "logarithmic" => ModCurve::Logarithmic,
        "s_curve" => ModCurve::SCurve,
        _ => return None,
    })
}
