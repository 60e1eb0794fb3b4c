//! Aggregate static game data.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::building_data::BuildingData;
use super::probe_data::{ProbeData, PROBE_TYPE};
use super::research_data::ResearchTreeData;
use super::rules::EconomicRules;
use super::zone_data::ZoneData;
use crate::error::{GameError, Result};

/// Built-in solar system data set.
const SOLAR_SYSTEM_RON: &str = include_str!("../../data/solar_system.ron");

/// Complete static data definition.
///
/// Contains every zone, building, probe type and research tree, plus the
/// economic rules. Read-only once the simulation starts.
///
/// # Example RON
///
/// ```ron
/// GameData(
///     zones: [...],
///     buildings: [...],
///     probes: [...],
///     research_trees: [...],
///     rules: (...),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    /// Orbital zones in display order.
    pub zones: Vec<ZoneData>,

    /// Building definitions.
    #[serde(default)]
    pub buildings: Vec<BuildingData>,

    /// Probe type definitions.
    #[serde(default = "default_probes")]
    pub probes: Vec<ProbeData>,

    /// Research trees.
    #[serde(default)]
    pub research_trees: Vec<ResearchTreeData>,

    /// Tuning constants.
    #[serde(default)]
    pub rules: EconomicRules,
}

fn default_probes() -> Vec<ProbeData> {
    vec![ProbeData::default()]
}

impl GameData {
    /// The built-in solar system data set.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data fails to parse or validate.
    pub fn solar_system() -> Result<Self> {
        Self::from_ron_str("solar_system.ron", SOLAR_SYSTEM_RON)
    }

    /// Parse and validate game data from a RON string.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on malformed RON and
    /// [`GameError::InvalidData`] if validation finds problems.
    pub fn from_ron_str(label: &str, source: &str) -> Result<Self> {
        let data: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        let errors = data.validate();
        if errors.is_empty() {
            Ok(data)
        } else {
            Err(GameError::InvalidData(errors.join("; ")))
        }
    }

    /// Find a zone by its ID.
    #[must_use]
    pub fn get_zone(&self, id: &str) -> Option<&ZoneData> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Find a building by its ID.
    #[must_use]
    pub fn get_building(&self, id: &str) -> Option<&BuildingData> {
        self.buildings.iter().find(|b| b.id == id)
    }

    /// Find a probe type by its ID.
    #[must_use]
    pub fn get_probe(&self, id: &str) -> Option<&ProbeData> {
        self.probes.iter().find(|p| p.id == id)
    }

    /// The canonical probe definition (falls back to built-in defaults).
    #[must_use]
    pub fn base_probe(&self) -> ProbeData {
        self.get_probe(PROBE_TYPE).cloned().unwrap_or_default()
    }

    /// Find a research tree by its ID.
    #[must_use]
    pub fn get_research_tree(&self, id: &str) -> Option<&ResearchTreeData> {
        self.research_trees.iter().find(|t| t.id == id)
    }

    /// The Dyson zone, if the data defines one.
    #[must_use]
    pub fn dyson_zone(&self) -> Option<&ZoneData> {
        self.zones.iter().find(|z| z.is_dyson_zone)
    }

    /// Validate internal consistency of the data set.
    ///
    /// Checks for:
    /// - Duplicate ids
    /// - At most one Dyson zone, sane zone stocks
    /// - Building prerequisites and allowed zones referencing known ids
    /// - Positive tier ceilings
    /// - A start zone and starting structures that exist
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        check_unique("zone", self.zones.iter().map(|z| z.id.as_str()), &mut errors);
        check_unique(
            "building",
            self.buildings.iter().map(|b| b.id.as_str()),
            &mut errors,
        );
        check_unique("probe", self.probes.iter().map(|p| p.id.as_str()), &mut errors);
        check_unique(
            "research tree",
            self.research_trees.iter().map(|t| t.id.as_str()),
            &mut errors,
        );

        // Check zones
        let dyson_zones = self.zones.iter().filter(|z| z.is_dyson_zone).count();
        if dyson_zones > 1 {
            errors.push(format!("Found {dyson_zones} Dyson zones, expected at most one"));
        }
        for zone in &self.zones {
            if !(0.0..=1.0).contains(&zone.metal_percentage) {
                errors.push(format!(
                    "Zone '{}' has metal_percentage {} outside [0, 1]",
                    zone.id, zone.metal_percentage
                ));
            }
            if zone.total_mass_kg < zone.metal_stores_kg {
                errors.push(format!(
                    "Zone '{}' has less total mass than metal stores",
                    zone.id
                ));
            }
            if zone.radius_au <= 0.0 {
                errors.push(format!("Zone '{}' has non-positive radius", zone.id));
            }
        }

        // Check building references
        for building in &self.buildings {
            for prereq in &building.prerequisites {
                if self.get_building(prereq).is_none() {
                    errors.push(format!(
                        "Building '{}' requires unknown building '{}'",
                        building.id, prereq
                    ));
                }
            }
            for zone_id in &building.allowed_orbital_zones {
                if self.get_zone(zone_id).is_none() {
                    errors.push(format!(
                        "Building '{}' allowed in unknown zone '{}'",
                        building.id, zone_id
                    ));
                }
            }
        }

        // Check probe prerequisites
        for probe in &self.probes {
            for prereq in &probe.prerequisites {
                if self.get_building(prereq).is_none() {
                    errors.push(format!(
                        "Probe '{}' requires unknown building '{}'",
                        probe.id, prereq
                    ));
                }
            }
        }

        // Check research tiers
        for tree in &self.research_trees {
            for (key, entry) in tree.tier_entries() {
                if entry.tier.tranches == 0 {
                    errors.push(format!(
                        "Research tier '{}/{}' has a zero tranche ceiling",
                        tree.id, key
                    ));
                }
            }
        }

        // Check starting conditions
        let start = &self.rules.starting;
        if self.get_zone(&start.zone).is_none() {
            errors.push(format!("Start zone '{}' not found", start.zone));
        }
        for building_id in start.structures.keys() {
            if self.get_building(building_id).is_none() {
                errors.push(format!("Starting building '{building_id}' not found"));
            }
        }

        errors
    }
}

fn check_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>, errors: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(format!("Duplicate {kind} id '{id}'"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solar_system_loads() {
        let data = GameData::solar_system().expect("built-in data must load");
        assert!(data.get_zone("earth").is_some());
        assert_eq!(data.dyson_zone().map(|z| z.id.as_str()), Some("dyson_sphere"));
        assert!(data.get_building("solar_array_basic").is_some());
        assert!(data.get_research_tree("computer_systems").is_some());
        assert_eq!(data.base_probe().base_cost_metal, 100.0);
    }

    #[test]
    fn test_validate_valid_data() {
        let data = GameData::solar_system().expect("load");
        let errors = data.validate();
        assert!(errors.is_empty(), "Errors: {errors:?}");
    }

    #[test]
    fn test_validate_invalid_reference() {
        let mut data = GameData::solar_system().expect("load");
        data.buildings[0]
            .prerequisites
            .push("warp_gate".to_string());

        let errors = data.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unknown building 'warp_gate'"));
    }

    #[test]
    fn test_validate_duplicate_and_start_zone() {
        let mut data = GameData::solar_system().expect("load");
        let dup = data.zones[0].clone();
        data.zones.push(dup);
        data.rules.starting.zone = "pluto".to_string();

        let errors = data.validate();
        assert!(errors.iter().any(|e| e.starts_with("Duplicate zone")));
        assert!(errors.iter().any(|e| e.contains("Start zone 'pluto'")));
    }

    #[test]
    fn test_parse_error_carries_label() {
        let err = GameData::from_ron_str("broken.ron", "GameData(zones: [").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { ref path, .. } if path == "broken.ron"));
    }
}
