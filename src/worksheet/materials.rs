//! Material presets: density and default specific cutting energy

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Density and typical specific cutting energy of a workpiece material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialPreset {
    pub density: f64, // lb/in^3
    #[serde(rename = "ps", alias = "p_s")]
    pub p_s: f64, // hp·min/in^3
}

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("cannot read preset table: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed preset table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("preset '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// Lookup table from material name to preset.
///
/// Passed explicitly to whoever resolves materials; names are matched
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialPresets {
    presets: BTreeMap<String, MaterialPreset>,
}

impl MaterialPresets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shop defaults
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (name, density, p_s) in BUILTIN_PRESETS {
            table.insert(name, MaterialPreset { density, p_s });
        }
        table
    }

    /// Load a JSON object of `{ "name": { "density": .., "ps": .. } }`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PresetError> {
        let raw: BTreeMap<String, MaterialPreset> = serde_json::from_str(content)?;
        let mut table = Self::new();
        for (name, preset) in raw {
            if !(preset.density > 0.0) || !(preset.p_s > 0.0) {
                return Err(PresetError::Invalid {
                    name,
                    reason: "density and ps must be positive".to_string(),
                });
            }
            table.insert(&name, preset);
        }
        Ok(table)
    }

    pub fn insert(&mut self, name: &str, preset: MaterialPreset) {
        self.presets.insert(normalize(name), preset);
    }

    pub fn get(&self, name: &str) -> Option<&MaterialPreset> {
        self.presets.get(&normalize(name))
    }

    /// Merge another table over this one
    pub fn extend(&mut self, other: MaterialPresets) {
        self.presets.extend(other.presets);
    }

    /// Names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.presets.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// (name, density lb/in^3, p_s hp·min/in^3)
const BUILTIN_PRESETS: [(&str, f64, f64); 11] = [
    ("carbon steel", 0.283, 1.20),
    ("alloy steel", 0.310, 1.35),
    ("stainless steel (304)", 0.283, 1.80),
    ("tool steel", 0.283, 1.90),
    ("cast iron", 0.260, 0.95),
    ("aluminum alloys (6061)", 0.100, 0.35),
    ("brass", 0.310, 0.55),
    ("nickel alloys", 0.300, 2.20),
    ("magnesium alloys", 0.066, 0.25),
    ("zinc alloys", 0.230, 0.50),
    ("titanium alloys", 0.163, 2.40),
];
