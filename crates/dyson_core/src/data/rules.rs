//! Economic tuning constants and starting conditions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Every tuning constant the economy uses.
///
/// Each field falls back to its default when omitted from RON, so a data
/// file only needs to list the values it changes.
///
/// # Example RON
///
/// ```ron
/// EconomicRules(
///     constant_energy_supply: 100000.0,
///     dyson_target_mass: 2e23,
///     starting: (zone: "earth", probes: 1.0),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicRules {
    /// Baseline power available every tick, in watts.
    pub constant_energy_supply: f64,
    /// Mass of one probe in kg.
    pub probe_mass: f64,
    /// Mass harvested per probe per day, in kg.
    pub probe_mining_rate: f64,
    /// Metal a probe can assemble per day, in kg.
    pub probe_build_rate: f64,
    /// Baseline power draw of one probe, in watts.
    pub probe_energy_cost: f64,
    /// Probe energy reduction per point of compute efficiency above 1.
    pub probe_energy_reduction_per_compute: f64,
    /// Upper bound on probe energy reduction.
    pub max_probe_energy_reduction: f64,
    /// Watts drawn per kg/day of harvesting.
    pub harvest_energy_per_kg: f64,
    /// Upper bound on harvest energy reduction.
    pub max_harvest_energy_reduction: f64,
    /// Watts drawn per kg/day of construction throughput.
    pub construction_energy_per_kg: f64,
    /// Power produced per kg of Dyson mass while incomplete, in watts.
    pub dyson_power_per_kg: f64,
    /// Total stellar output captured by a complete sphere, in watts.
    pub sun_total_power: f64,
    /// Base target mass of the sphere in kg.
    pub dyson_target_mass: f64,
    /// Metal consumed per kg of Dyson mass added.
    pub dyson_metal_per_kg: f64,
    /// Upper bound on the Dyson target-mass reduction.
    pub max_dyson_mass_reduction: f64,
    /// FLOPS produced per watt of Dyson compute allocation.
    pub flops_per_watt: f64,
    /// FLOPS served per watt of compute draw.
    pub flops_per_compute_watt: f64,
    /// Cost of one full tier at index 0, in FLOP-days.
    pub research_base_cost: f64,
    /// Cost growth factor per tier index.
    pub research_cost_growth: f64,
    /// Base recycling efficiency for slag and scrapped factories.
    pub recycling_base_efficiency: f64,
    /// Upper bound on any recycling efficiency.
    pub max_recycling_efficiency: f64,
    /// Base delta-v of a transfer in km/s.
    pub transfer_base_delta_v: f64,
    /// Per-doubling zone crowding penalty with no compute research.
    pub zone_scaling_penalty_base: f64,
    /// Per-doubling zone crowding penalty at full compute research.
    pub zone_scaling_penalty_min: f64,
    /// Lower bound on the zone crowding factor.
    pub zone_scaling_floor: f64,
    /// Total probe count above which replication slows down.
    pub global_scaling_threshold: f64,
    /// Replication factor applied per order of magnitude above the threshold.
    pub global_scaling_halving: f64,
    /// Lower bound on the global replication factor.
    pub global_scaling_floor: f64,
    /// Tolerance for allocation drift.
    pub allocation_epsilon: f64,
    /// Initial conditions of a new game.
    pub starting: StartingConditions,
}

impl Default for EconomicRules {
    fn default() -> Self {
        Self {
            constant_energy_supply: 100_000.0,
            probe_mass: 100.0,
            probe_mining_rate: 100.0,
            probe_build_rate: 20.0,
            probe_energy_cost: 500_000.0,
            probe_energy_reduction_per_compute: 0.1,
            max_probe_energy_reduction: 0.9,
            harvest_energy_per_kg: 453_515.0 / 86_400.0,
            max_harvest_energy_reduction: 0.9,
            construction_energy_per_kg: 250_000.0 / 86_400.0,
            dyson_power_per_kg: 5_000.0,
            sun_total_power: 3.8e26,
            dyson_target_mass: 2e23,
            dyson_metal_per_kg: 0.5,
            max_dyson_mass_reduction: 0.5,
            flops_per_watt: 1e9,
            flops_per_compute_watt: 1e12,
            research_base_cost: 1e16,
            research_cost_growth: 2.0,
            recycling_base_efficiency: 0.75,
            max_recycling_efficiency: 0.98,
            transfer_base_delta_v: 3.0,
            zone_scaling_penalty_base: 0.0,
            zone_scaling_penalty_min: 0.0,
            zone_scaling_floor: 0.001,
            global_scaling_threshold: 1e12,
            global_scaling_halving: 0.5,
            global_scaling_floor: 1e-4,
            allocation_epsilon: 0.001,
            starting: StartingConditions::default(),
        }
    }
}

impl EconomicRules {
    /// Research cost of a full tier at the given index, in FLOP-days.
    #[must_use]
    pub fn tier_cost(&self, index: usize) -> f64 {
        let exponent = i32::try_from(index).unwrap_or(i32::MAX);
        self.research_base_cost * self.research_cost_growth.powi(exponent)
    }

    /// Crowding factor for a zone holding `probes` probes.
    ///
    /// `compute_skill` in [0, 1] interpolates the per-doubling penalty from
    /// its base value toward its minimum.
    #[must_use]
    pub fn zone_scaling_factor(&self, probes: f64, compute_skill: f64) -> f64 {
        if probes <= 1.0 {
            return 1.0;
        }
        let t = compute_skill.clamp(0.0, 1.0);
        let penalty = self.zone_scaling_penalty_base
            + (self.zone_scaling_penalty_min - self.zone_scaling_penalty_base) * t;
        if penalty <= 0.0 {
            return 1.0;
        }
        (1.0 - penalty.min(1.0))
            .powf(probes.log2())
            .max(self.zone_scaling_floor)
    }

    /// Global replication factor for `total_probes` probes.
    #[must_use]
    pub fn global_scaling_factor(&self, total_probes: f64) -> f64 {
        if self.global_scaling_threshold <= 0.0 || total_probes <= self.global_scaling_threshold {
            return 1.0;
        }
        let magnitudes = total_probes.log10() - self.global_scaling_threshold.log10();
        self.global_scaling_halving
            .powf(magnitudes)
            .max(self.global_scaling_floor)
    }
}

/// Initial conditions of a new game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartingConditions {
    /// Zone that receives the starting probes and structures.
    pub zone: String,
    /// Starting probe count.
    pub probes: f64,
    /// Starting stored metal in kg.
    pub metal: f64,
    /// Starting energy budget in watts.
    pub energy: f64,
    /// Starting structures in the start zone.
    pub structures: BTreeMap<String, u32>,
}

impl Default for StartingConditions {
    fn default() -> Self {
        Self {
            zone: "earth".to_string(),
            probes: 1.0,
            metal: 1_000.0,
            energy: 1_000.0,
            structures: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_cost_doubles() {
        let rules = EconomicRules::default();
        assert_eq!(rules.tier_cost(0), 1e16);
        assert_eq!(rules.tier_cost(3), 8e16);
    }

    #[test]
    fn test_scaling_disabled_by_default() {
        let rules = EconomicRules::default();
        assert_eq!(rules.zone_scaling_factor(1e9, 0.0), 1.0);
        assert_eq!(rules.global_scaling_factor(1e6), 1.0);
    }

    #[test]
    fn test_zone_scaling_penalty() {
        let rules = EconomicRules {
            zone_scaling_penalty_base: 0.5,
            zone_scaling_penalty_min: 0.0,
            ..EconomicRules::default()
        };
        // Four probes: two doublings at 50% each
        assert!((rules.zone_scaling_factor(4.0, 0.0) - 0.25).abs() < 1e-12);
        // Full compute skill removes the penalty
        assert_eq!(rules.zone_scaling_factor(4.0, 1.0), 1.0);
        // Floor holds for huge populations
        assert_eq!(rules.zone_scaling_factor(1e30, 0.0), 0.001);
    }

    #[test]
    fn test_global_scaling_penalty() {
        let rules = EconomicRules::default();
        assert!((rules.global_scaling_factor(1e13) - 0.5).abs() < 1e-9);
        assert_eq!(rules.global_scaling_factor(1e40), 1e-4);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let rules: EconomicRules =
            ron::from_str("(probe_build_rate: 40.0, starting: (probes: 3.0))").expect("parse");
        assert_eq!(rules.probe_build_rate, 40.0);
        assert_eq!(rules.probe_mass, 100.0);
        assert_eq!(rules.starting.probes, 3.0);
        assert_eq!(rules.starting.zone, "earth");
    }
}
