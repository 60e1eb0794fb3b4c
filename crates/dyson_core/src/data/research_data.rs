//! Research tree data structures.
//!
//! A tree is an ordered list of tiers, optionally grouped into named
//! subcategories. Tier state is keyed by the tier id for flat trees and by
//! `"{subcategory}_{tier}"` for subcategory tiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tree id whose subcategories drive compute efficiency.
pub const COMPUTER_SYSTEMS_TREE: &str = "computer_systems";

/// Effect keys recognised by the bonus snapshot.
pub mod effect_keys {
    /// Multiplier on probe harvesting rate.
    pub const MINING_RATE: &str = "mining_rate_multiplier";
    /// Multiplier on probe build rate.
    pub const BUILD_RATE: &str = "build_rate_multiplier";
    /// Multiplier on probe dexterity.
    pub const DEXTERITY: &str = "dexterity_multiplier";
    /// Multiplier on energy structure and Dyson output.
    pub const ENERGY_OUTPUT: &str = "energy_output_multiplier";
    /// Multiplier on storage building capacity.
    pub const STORAGE_CAPACITY: &str = "storage_capacity_multiplier";
    /// Divisor on energy consumption (applied when above 1).
    pub const ENERGY_EFFICIENCY: &str = "energy_efficiency_bonus";
    /// Multiplier on factory output.
    pub const PRODUCTION_RATE: &str = "production_rate_multiplier";
    /// Per-subcategory compute multiplier in the computer systems tree.
    pub const COMPUTE_POWER: &str = "compute_power_multiplier";
    /// Additive reduction of harvesting energy cost.
    pub const HARVEST_ENERGY_REDUCTION: &str = "harvest_energy_cost_reduction";
    /// Multiplier on Dyson construction rate.
    pub const DYSON_CONSTRUCTION: &str = "dyson_construction_multiplier";
    /// Additive reduction of the Dyson target mass.
    pub const DYSON_MASS_REDUCTION: &str = "dyson_mass_reduction";
    /// Additive bonus to recycling efficiency.
    pub const RECYCLING_EFFICIENCY: &str = "recycling_efficiency_bonus";
}

/// Resource category a research tree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchCategory {
    /// Energy generation, storage and efficiency.
    Energy,
    /// Physical capability of probes.
    Dexterity,
    /// Compute.
    Intelligence,
}

impl Default for ResearchCategory {
    fn default() -> Self {
        Self::Dexterity
    }
}

/// A single research tier.
///
/// # Example RON
///
/// ```ron
/// TierData(
///     id: "photovoltaic_optimization",
///     name: "Photovoltaic Optimization",
///     tranches: 10,
///     effects: {"energy_output_multiplier": 0.2},
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierData {
    /// Tier identifier, unique within its list.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Tranche ceiling.
    #[serde(default = "default_tranches")]
    pub tranches: u32,

    /// Effect key to raw effect value at full completion.
    #[serde(default)]
    pub effects: BTreeMap<String, f64>,
}

const fn default_tranches() -> u32 {
    10
}

/// A named group of tiers inside a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcategoryData {
    /// Subcategory identifier.
    pub id: String,

    /// Ordered tiers.
    #[serde(default)]
    pub tiers: Vec<TierData>,
}

/// A research tree definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTreeData {
    /// Tree identifier.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Category used by bulk toggling.
    #[serde(default)]
    pub category: ResearchCategory,

    /// Ordered tiers of a flat tree.
    #[serde(default)]
    pub tiers: Vec<TierData>,

    /// Subcategories, each an independent ordered list.
    #[serde(default)]
    pub subcategories: Vec<SubcategoryData>,
}

/// Resolved position of a tier within its tree.
#[derive(Debug, Clone, Copy)]
pub struct TierRef<'a> {
    /// Subcategory id, if any.
    pub subcategory: Option<&'a str>,
    /// Tier definition.
    pub tier: &'a TierData,
    /// Index within its ordered list (drives cost).
    pub index: usize,
    /// Tier that must be fully completed first.
    pub predecessor: Option<&'a TierData>,
}

/// Build the state key for a tier.
#[must_use]
pub fn tier_key(subcategory: Option<&str>, tier_id: &str) -> String {
    match subcategory {
        Some(sub) => format!("{sub}_{tier_id}"),
        None => tier_id.to_string(),
    }
}

impl ResearchTreeData {
    /// Every tier with its key, index and predecessor, in declaration order.
    #[must_use]
    pub fn tier_entries(&self) -> Vec<(String, TierRef<'_>)> {
        let mut entries = Vec::new();
        for (index, tier) in self.tiers.iter().enumerate() {
            let predecessor = index.checked_sub(1).map(|i| &self.tiers[i]);
            entries.push((
                tier.id.clone(),
                TierRef {
                    subcategory: None,
                    tier,
                    index,
                    predecessor,
                },
            ));
        }
        for sub in &self.subcategories {
            for (index, tier) in sub.tiers.iter().enumerate() {
                let predecessor = index.checked_sub(1).map(|i| &sub.tiers[i]);
                entries.push((
                    tier_key(Some(sub.id.as_str()), &tier.id),
                    TierRef {
                        subcategory: Some(sub.id.as_str()),
                        tier,
                        index,
                        predecessor,
                    },
                ));
            }
        }
        entries
    }

    /// State key of a tier's predecessor, if it has one.
    #[must_use]
    pub fn predecessor_key(entry: &TierRef<'_>) -> Option<String> {
        entry
            .predecessor
            .map(|prev| tier_key(entry.subcategory, &prev.id))
    }

    /// Find a tier definition by its state key.
    #[must_use]
    pub fn get_tier(&self, key: &str) -> Option<&TierData> {
        if let Some(tier) = self.tiers.iter().find(|t| t.id == key) {
            return Some(tier);
        }
        self.subcategories.iter().find_map(|sub| {
            sub.tiers
                .iter()
                .find(|t| tier_key(Some(sub.id.as_str()), &t.id) == key)
        })
    }
}
