//! Building data structures for data-driven structure definitions.

use serde::{Deserialize, Serialize};

/// Functional category of a building.
///
/// The category decides which calculator picks the building up. Effects that
/// do not match the category are still honoured (a data center in the
/// `Computing` category may also draw power through
/// `energy_consumption_per_second`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingCategory {
    /// Power generation (solar arrays, reactors).
    Energy,
    /// Automated metal extraction in the building's zone.
    Mining,
    /// Automatic probe production.
    Factories,
    /// Energy storage.
    Storage,
    /// Compute (data centers).
    Computing,
    /// Slag to metal conversion.
    Recycling,
    /// Anything else.
    Other,
}

impl Default for BuildingCategory {
    fn default() -> Self {
        Self::Other
    }
}

/// Numeric effects of a single building.
///
/// All fields default to zero except the factory and converter parameters,
/// which default to the values the economy was balanced around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingEffects {
    /// Power output in watts (before solar distance scaling and research).
    pub energy_production_per_second: f64,
    /// Constant power draw in watts.
    pub energy_consumption_per_second: f64,
    /// Metal extracted per day by a mining structure.
    pub metal_production_per_day: f64,
    /// Probes produced per day by a factory.
    pub probe_production_per_day: f64,
    /// Metal cost of one factory-built probe in kg.
    pub metal_per_probe: f64,
    /// Compute produced in FLOPS.
    pub intelligence_flops: f64,
    /// Storage capacity in watt-days.
    pub energy_storage_capacity: f64,
    /// Slag processed per day by a converter in kg.
    pub slag_to_metal_conversion_rate: f64,
    /// Fraction of processed slag recovered as metal.
    pub conversion_efficiency: f64,
    /// Watts drawn per kg/day of slag processed.
    pub energy_consumption_per_kg: f64,
}

impl Default for BuildingEffects {
    fn default() -> Self {
        Self {
            energy_production_per_second: 0.0,
            energy_consumption_per_second: 0.0,
            metal_production_per_day: 0.0,
            probe_production_per_day: 0.0,
            metal_per_probe: 10.0,
            intelligence_flops: 0.0,
            energy_storage_capacity: 0.0,
            slag_to_metal_conversion_rate: 0.0,
            conversion_efficiency: 0.8,
            energy_consumption_per_kg: 10_000.0,
        }
    }
}

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "solar_array_basic",
///     name: "Basic Solar Array",
///     category: Energy,
///     base_cost_metal: 500.0,
///     uses_solar: true,
///     effects: (
///         energy_production_per_second: 1000000.0,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique string identifier for this building type.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Functional category.
    #[serde(default)]
    pub category: BuildingCategory,

    /// Metal required to construct one unit, in kg.
    pub base_cost_metal: f64,

    /// Numeric effects.
    #[serde(default)]
    pub effects: BuildingEffects,

    /// Whether output scales with inverse-square solar distance.
    #[serde(default)]
    pub uses_solar: bool,

    /// Building ids that must exist (anywhere) before this can be built.
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Zones this building may be placed in. Empty means any zone.
    #[serde(default)]
    pub allowed_orbital_zones: Vec<String>,
}

impl BuildingData {
    /// Check if this building is a probe factory.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        self.category == BuildingCategory::Factories
    }

    /// Check if this building is allowed in the given zone.
    ///
    /// The Dyson zone accepts every non-mining building regardless of the
    /// allow-list.
    #[must_use]
    pub fn allowed_in(&self, zone_id: &str, is_dyson_zone: bool) -> bool {
        if is_dyson_zone {
            return self.category != BuildingCategory::Mining;
        }
        self.allowed_orbital_zones.is_empty()
            || self.allowed_orbital_zones.iter().any(|z| z == zone_id)
    }

    /// Check if this building converts slag to metal.
    #[must_use]
    pub fn is_converter(&self) -> bool {
        self.effects.slag_to_metal_conversion_rate > 0.0
    }
}
