//! Production and consumption calculators.
//!
//! Every function here is pure: it reads the state, the static data and a
//! frozen [`BonusSnapshot`] and returns theoretical (unthrottled) rates. The
//! tick orchestrator and the snapshot both go through [`plan_tick`], so the
//! numbers a player sees are exactly the numbers the next tick uses.
//!
//! Rates are per simulated day except power, which is in watts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::allocation::compute_allocations;
use crate::data::{BuildingCategory, GameData};
use crate::research::{has_compute_demand, BonusSnapshot};
use crate::state::{GameState, TaskAllocation, Zone};
use crate::throttle::{metal_throttle, solve_energy, EnergyInputs, EnergySolution, ThrottleReport};

// ============================================================================
// Rate reports
// ============================================================================

/// Power production and consumption terms, in W.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBreakdown {
    /// Baseline supply.
    pub constant_supply: f64,
    /// Dyson output routed to the grid.
    pub dyson: f64,
    /// Energy structures.
    pub structures: f64,
    /// Probe baseline draw.
    pub probes: f64,
    /// Structure draw.
    pub structure_consumption: f64,
    /// Harvesting draw.
    pub harvesting: f64,
    /// Construction draw.
    pub construction: f64,
    /// Compute draw actually served.
    pub compute: f64,
    /// Non-compute consumption after the efficiency divisor.
    pub non_compute: f64,
    /// Total consumption.
    pub total_consumption: f64,
}

impl EnergyBreakdown {
    /// Production excluding the constant supply.
    #[must_use]
    pub fn production(&self) -> f64 {
        self.dyson + self.structures
    }
}

/// Compute production terms, in FLOPS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceBreakdown {
    /// Dyson output routed to compute.
    pub dyson: f64,
    /// Compute structures.
    pub structures: f64,
    /// Dyson plus structures.
    pub theoretical: f64,
    /// What research can absorb (0 with no eligible tier).
    pub demand: f64,
    /// What the energy balance actually served.
    pub effective: f64,
    /// Compute efficiency bonus.
    pub compute_efficiency: f64,
}

/// Dexterity terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DexterityBreakdown {
    /// Total probes.
    pub probes: f64,
    /// Dexterity per probe.
    pub base_dexterity: f64,
    /// Research multiplier.
    pub research_multiplier: f64,
    /// Product of the above.
    pub total: f64,
}

/// Theoretical rates of one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneRates {
    /// Metal extracted per day, capped by the zone's stock.
    pub metal: f64,
    /// Slag produced per day.
    pub slag: f64,
    /// Mass removed from the zone per day.
    pub mass_removed: f64,
    /// Harvesting draw in W.
    pub harvest_energy: f64,
    /// Factory output in probes per day.
    pub factory_probes: f64,
    /// Factory metal demand per day.
    pub factory_metal: f64,
    /// Blended metal cost of one factory probe.
    pub factory_cost: f64,
    /// Factory output lost to metal shortage, in probes per day.
    pub factory_idle: f64,
    /// Probes working on replication.
    pub replication_probes: f64,
    /// Replication metal demand per day.
    pub replication_kg: f64,
    /// Probes working on structures.
    pub structure_probes: f64,
    /// Structure metal demand per day.
    pub structure_kg: f64,
}

/// Everything one tick needs, computed from a frozen state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickPlan {
    /// Bonuses used for every rate below.
    pub bonuses: BonusSnapshot,
    /// Task allocations used for every rate below.
    pub allocations: BTreeMap<String, TaskAllocation>,
    /// Per-zone rates.
    pub zones: BTreeMap<String, ZoneRates>,
    /// Power terms.
    pub energy: EnergyBreakdown,
    /// Compute terms.
    pub intelligence: IntelligenceBreakdown,
    /// Dexterity terms.
    pub dexterity: DexterityBreakdown,
    /// Theoretical metal production per day.
    pub metal_production: f64,
    /// Theoretical metal demand per day.
    pub metal_demand: f64,
    /// Dyson mass added per day.
    pub dyson_rate: f64,
    /// Probes building the sphere.
    pub dyson_probes: f64,
    /// Effective Dyson target mass.
    pub dyson_target_mass: f64,
    /// Metal cost of one replicated probe.
    pub probe_cost: f64,
    /// Storage capacity in W-days.
    pub storage_capacity: f64,
    /// Resolved energy balance.
    pub energy_solution: EnergySolution,
    /// Throttle factors.
    pub throttle: ThrottleReport,
}

// ============================================================================
// Calculators
// ============================================================================

/// Effective Dyson target mass after research, never below the current mass.
#[must_use]
pub fn dyson_target_mass(state: &GameState, data: &GameData, bonuses: &BonusSnapshot) -> f64 {
    let reduction = bonuses
        .dyson_mass_reduction
        .min(data.rules.max_dyson_mass_reduction);
    (data.rules.dyson_target_mass * (1.0 - reduction)).max(state.dyson.mass)
}

/// Total Dyson output in W before the compute split.
#[must_use]
pub fn dyson_output(state: &GameState, data: &GameData, bonuses: &BonusSnapshot, target: f64) -> f64 {
    if target > 0.0 && state.dyson.mass >= target {
        data.rules.sun_total_power
    } else {
        state.dyson.mass * data.rules.dyson_power_per_kg * bonuses.energy_output
    }
}

/// Output of energy structures in W.
#[must_use]
pub fn structure_energy_production(state: &GameState, data: &GameData, bonuses: &BonusSnapshot) -> f64 {
    let mut total = 0.0;
    for (zone_id, zone) in &state.zones {
        let solar = data.get_zone(zone_id).map_or(1.0, |z| z.solar_factor());
        for (building_id, &count) in &zone.structures {
            let Some(building) = data.get_building(building_id) else {
                continue;
            };
            let output = building.effects.energy_production_per_second;
            if output <= 0.0 {
                continue;
            }
            let distance = if building.uses_solar { solar } else { 1.0 };
            total += output * f64::from(count) * bonuses.energy_output * distance;
        }
    }
    total
}

/// Constant draw of all structures in W.
#[must_use]
pub fn structure_energy_consumption(state: &GameState, data: &GameData) -> f64 {
    state
        .zones
        .values()
        .flat_map(|zone| zone.structures.iter())
        .filter_map(|(building_id, &count)| {
            data.get_building(building_id)
                .map(|b| b.effects.energy_consumption_per_second * f64::from(count))
        })
        .sum()
}

/// Compute from structures in FLOPS.
#[must_use]
pub fn structure_intelligence(state: &GameState, data: &GameData) -> f64 {
    state
        .zones
        .values()
        .flat_map(|zone| zone.structures.iter())
        .filter_map(|(building_id, &count)| {
            data.get_building(building_id)
                .map(|b| b.effects.intelligence_flops * f64::from(count))
        })
        .sum()
}

/// Storage capacity in W-days.
#[must_use]
pub fn storage_capacity(state: &GameState, data: &GameData, bonuses: &BonusSnapshot) -> f64 {
    let raw: f64 = state
        .zones
        .values()
        .flat_map(|zone| zone.structures.iter())
        .filter_map(|(building_id, &count)| {
            data.get_building(building_id)
                .filter(|b| b.category == BuildingCategory::Storage)
                .map(|b| b.effects.energy_storage_capacity * f64::from(count))
        })
        .sum();
    raw * bonuses.storage_capacity
}

/// Share of a recycled structure's cost returned as metal.
#[must_use]
pub fn recycling_efficiency(data: &GameData, bonuses: &BonusSnapshot) -> f64 {
    (data.rules.recycling_base_efficiency + bonuses.recycling_bonus)
        .clamp(0.0, data.rules.max_recycling_efficiency)
}

/// Outcome of the slag converter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SlagRecycling {
    /// Slag consumed in kg.
    pub slag_used: f64,
    /// Metal recovered in kg.
    pub metal_recovered: f64,
    /// Power drawn in W.
    pub power_used: f64,
}

/// Run every converter against stored slag.
///
/// Each converter is limited by its rated throughput, the slag left and the
/// surplus power left after the rest of the tick.
#[must_use]
pub fn slag_recycling(
    state: &GameState,
    data: &GameData,
    bonuses: &BonusSnapshot,
    surplus_power: f64,
    dt: f64,
) -> SlagRecycling {
    let mut result = SlagRecycling::default();
    if dt <= 0.0 || state.resources.slag <= 0.0 {
        return result;
    }
    let mut slag_left = state.resources.slag;
    let mut power_left = surplus_power.max(0.0);

    for zone in state.zones.values() {
        for (building_id, &count) in &zone.structures {
            let Some(building) = data.get_building(building_id).filter(|b| b.is_converter()) else {
                continue;
            };
            let effects = &building.effects;
            let capacity = effects.slag_to_metal_conversion_rate * f64::from(count) * dt;
            let power_limit = if effects.energy_consumption_per_kg > 0.0 {
                power_left / effects.energy_consumption_per_kg * dt
            } else {
                f64::INFINITY
            };
            let used = capacity.min(slag_left).min(power_limit).max(0.0);
            if used <= 0.0 {
                continue;
            }
            let efficiency = (effects.conversion_efficiency + bonuses.recycling_bonus)
                .clamp(0.0, data.rules.max_recycling_efficiency);
            let power = used / dt * effects.energy_consumption_per_kg;

            slag_left -= used;
            power_left = (power_left - power).max(0.0);
            result.slag_used += used;
            result.metal_recovered += used * efficiency;
            result.power_used += power;
        }
    }
    result
}

/// Metal extraction of one zone, capped by its remaining stock.
///
/// Returns `(metal, slag, mass_removed)` per day. The Dyson zone and
/// depleted zones produce nothing.
#[must_use]
pub fn zone_metal_production(
    zone: &Zone,
    alloc: &TaskAllocation,
    data: &GameData,
    bonuses: &BonusSnapshot,
    zone_penalty: f64,
    dt: f64,
) -> (f64, f64, f64) {
    if zone.is_dyson_zone || zone.depleted() || zone.metal_percentage <= 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let rules = &data.rules;
    let base_dexterity = data.base_probe().base_dexterity;
    let from_probes = alloc.harvest
        * rules.probe_mining_rate
        * base_dexterity
        * zone.mining_rate_multiplier
        * zone.metal_percentage
        * bonuses.mining_rate
        * zone_penalty;
    let from_structures: f64 = zone
        .structures
        .iter()
        .filter_map(|(building_id, &count)| {
            data.get_building(building_id)
                .filter(|b| b.category == BuildingCategory::Mining)
                .map(|b| b.effects.metal_production_per_day * f64::from(count))
        })
        .sum();

    let cap = if dt > 0.0 {
        zone.metal_remaining / dt
    } else {
        zone.metal_remaining
    };
    let metal = (from_probes + from_structures).min(cap).max(0.0);
    let mp = zone.metal_percentage;
    (metal, metal * (1.0 - mp) / mp, metal / mp)
}

/// Harvesting draw of one zone in W.
#[must_use]
pub fn zone_harvest_energy(
    zone: &Zone,
    alloc: &TaskAllocation,
    data: &GameData,
    bonuses: &BonusSnapshot,
) -> f64 {
    if zone.is_dyson_zone || zone.depleted() {
        return 0.0;
    }
    let rules = &data.rules;
    let difficulty = (1.0 + zone.delta_v_penalty).powi(2);
    alloc.harvest
        * rules.harvest_energy_per_kg
        * difficulty
        * rules.probe_mining_rate
        * (1.0 - bonuses.harvest_energy_reduction)
}

/// Factory output of one zone: `(probes_per_day, metal_per_day)`.
#[must_use]
pub fn zone_factory_output(
    state: &GameState,
    zone: &Zone,
    data: &GameData,
    bonuses: &BonusSnapshot,
) -> (f64, f64) {
    let mut probes = 0.0;
    let mut metal = 0.0;
    for (building_id, &count) in &zone.structures {
        let Some(building) = data.get_building(building_id) else {
            continue;
        };
        if !building.is_factory() {
            continue;
        }
        let output = building.effects.probe_production_per_day
            * f64::from(count)
            * state.factory_percent(building_id)
            / 100.0
            * bonuses.production_rate;
        probes += output;
        metal += output * building.effects.metal_per_probe;
    }
    (probes, metal)
}

/// Compute a full tick plan from the current state.
#[must_use]
pub fn plan_tick(state: &GameState, data: &GameData, dt: f64) -> TickPlan {
    let rules = &data.rules;
    let bonuses = BonusSnapshot::capture(state, data);
    let allocations = compute_allocations(state, rules.allocation_epsilon);
    let probe = data.base_probe();
    let total_probes = state.total_probes();
    let global_penalty = rules.global_scaling_factor(total_probes);
    let build_per_probe = rules.probe_build_rate * bonuses.build_rate;
    let build_allocation = state.sliders.build_allocation.clamp(0.0, 100.0) / 100.0;

    // Per-zone extraction, factories, replication and structures
    let mut zones = BTreeMap::new();
    let mut dyson_probes = 0.0;
    for (zone_id, zone) in &state.zones {
        let alloc = allocations.get(zone_id).copied().unwrap_or_default();
        let zone_penalty = rules.zone_scaling_factor(zone.probes, bonuses.compute_skill());
        let (metal, slag, mass_removed) =
            zone_metal_production(zone, &alloc, data, &bonuses, zone_penalty, dt);
        let (factory_probes, factory_metal) = zone_factory_output(state, zone, data, &bonuses);

        let structure_share = alloc.construct * (1.0 - build_allocation);
        let has_work = state.zone_has_structure_work(zone_id);
        let (structure_probes, redirected) = if has_work {
            (structure_share, 0.0)
        } else {
            (0.0, structure_share)
        };
        let replication_probes = alloc.replicate + alloc.construct * build_allocation + redirected;

        zones.insert(
            zone_id.clone(),
            ZoneRates {
                metal,
                slag,
                mass_removed,
                harvest_energy: zone_harvest_energy(zone, &alloc, data, &bonuses),
                factory_probes,
                factory_metal,
                factory_cost: if factory_probes > 0.0 {
                    factory_metal / factory_probes
                } else {
                    10.0
                },
                factory_idle: 0.0,
                replication_probes,
                replication_kg: replication_probes * build_per_probe * zone_penalty * global_penalty,
                structure_probes,
                structure_kg: structure_probes * build_per_probe,
            },
        );
        dyson_probes += alloc.dyson;
    }

    let metal_production: f64 = zones.values().map(|z| z.metal).sum();

    // Pre-emptive factory scaling when metal is exhausted
    let factory_demand: f64 = zones.values().map(|z| z.factory_metal).sum();
    if state.resources.metal <= 0.0 && metal_production < factory_demand && factory_demand > 0.0 {
        let factor = (metal_production / factory_demand).clamp(0.0, 1.0);
        for rates in zones.values_mut() {
            rates.factory_idle = rates.factory_probes * (1.0 - factor);
            rates.factory_probes *= factor;
            rates.factory_metal *= factor;
        }
    }

    // Dyson construction
    let target = dyson_target_mass(state, data, &bonuses);
    let dyson_rate = if target > 0.0 && state.dyson.mass >= target {
        0.0
    } else {
        dyson_probes * build_per_probe * bonuses.dyson_construction
    };

    let metal_demand = zones
        .values()
        .map(|z| z.factory_metal + z.replication_kg + z.structure_kg)
        .sum::<f64>()
        + dyson_rate * rules.dyson_metal_per_kg;

    // Energy
    let output = dyson_output(state, data, &bonuses, target);
    let compute_fraction = state.sliders.dyson_power_allocation.clamp(0.0, 100.0) / 100.0;
    let divisor = bonuses.consumption_divisor();
    let probe_draw = total_probes * rules.probe_energy_cost * (1.0 - bonuses.probe_energy_reduction);
    let structure_draw = structure_energy_consumption(state, data);
    let harvesting: f64 = zones.values().map(|z| z.harvest_energy).sum();
    let construction_kg: f64 = zones
        .values()
        .map(|z| z.factory_metal + z.replication_kg + z.structure_kg)
        .sum::<f64>()
        + dyson_rate;
    let construction = construction_kg * rules.construction_energy_per_kg;
    let non_compute = (probe_draw + structure_draw + harvesting + construction) / divisor;

    // Compute
    let dyson_flops = output * compute_fraction * rules.flops_per_watt;
    let structure_flops = structure_intelligence(state, data);
    let theoretical = dyson_flops + structure_flops;
    let demand = if has_compute_demand(state, data) {
        theoretical
    } else {
        0.0
    };

    let storage = storage_capacity(state, data, &bonuses);
    let energy_solution = solve_energy(&EnergyInputs {
        constant_supply: rules.constant_energy_supply,
        production: output * (1.0 - compute_fraction) + structure_energy_production(state, data, &bonuses),
        non_compute,
        compute_demand: demand,
        compute_efficiency: bonuses.compute_efficiency,
        consumption_divisor: divisor,
        flops_per_compute_watt: rules.flops_per_compute_watt,
        stored: state.resources.energy_stored,
        capacity: storage,
        dt,
    });

    let e = energy_solution.throttle;
    let m = metal_throttle(state.resources.metal, metal_production * e, metal_demand * e);

    let base_dexterity = probe.base_dexterity;
    TickPlan {
        bonuses,
        allocations,
        zones,
        energy: EnergyBreakdown {
            constant_supply: rules.constant_energy_supply,
            dyson: output * (1.0 - compute_fraction),
            structures: structure_energy_production(state, data, &bonuses),
            probes: probe_draw,
            structure_consumption: structure_draw,
            harvesting,
            construction,
            compute: energy_solution.compute_draw,
            non_compute,
            total_consumption: energy_solution.total_consumption,
        },
        intelligence: IntelligenceBreakdown {
            dyson: dyson_flops,
            structures: structure_flops,
            theoretical,
            demand,
            effective: energy_solution.effective_flops,
            compute_efficiency: bonuses.compute_efficiency,
        },
        dexterity: DexterityBreakdown {
            probes: total_probes,
            base_dexterity,
            research_multiplier: bonuses.dexterity,
            total: total_probes * base_dexterity * bonuses.dexterity,
        },
        metal_production,
        metal_demand,
        dyson_rate,
        dyson_probes,
        dyson_target_mass: target,
        probe_cost: probe.base_cost_metal,
        storage_capacity: storage,
        energy_solution,
        throttle: ThrottleReport::new(e, m),
    }
}
