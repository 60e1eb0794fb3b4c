//! Probe type definitions.

use serde::{Deserialize, Serialize};

/// Identifier of the single canonical probe type.
pub const PROBE_TYPE: &str = "probe";

/// Data-driven probe definition.
///
/// The economy treats every probe as one fungible type; additional entries
/// only matter for manual purchases and legacy save migration.
///
/// # Example RON
///
/// ```ron
/// ProbeData(
///     id: "probe",
///     name: "Von Neumann Probe",
///     base_dexterity: 1.0,
///     base_cost_metal: 100.0,
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeData {
    /// Unique string identifier for this probe type.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Dexterity contributed by one probe.
    #[serde(default = "default_dexterity")]
    pub base_dexterity: f64,

    /// Metal cost of one probe in kg.
    #[serde(default = "default_cost_metal")]
    pub base_cost_metal: f64,

    /// Energy cost of a manual purchase.
    #[serde(default)]
    pub base_cost_energy: f64,

    /// Structures that must exist in the target zone.
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

fn default_dexterity() -> f64 {
    1.0
}

fn default_cost_metal() -> f64 {
    100.0
}

impl Default for ProbeData {
    fn default() -> Self {
        Self {
            id: PROBE_TYPE.to_string(),
            name: String::new(),
            base_dexterity: default_dexterity(),
            base_cost_metal: default_cost_metal(),
            base_cost_energy: 0.0,
            prerequisites: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_defaults() {
        let probe: ProbeData = ron::from_str(r#"ProbeData(id: "probe")"#).expect("parse");
        assert_eq!(probe.base_dexterity, 1.0);
        assert_eq!(probe.base_cost_metal, 100.0);
        assert!(probe.prerequisites.is_empty());
    }
}
