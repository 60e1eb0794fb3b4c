//! Read-only views of the economy for display.

use serde::{Deserialize, Serialize};

use crate::construction::IdleProbes;
use crate::data::GameData;
use crate::economy::{
    plan_tick, recycling_efficiency, zone_harvest_energy, zone_metal_production, DexterityBreakdown,
    EnergyBreakdown, IntelligenceBreakdown, TickPlan,
};
use crate::research::{allocation_info, ResearchAllocation};
use crate::state::{GameState, TaskAllocation};
use crate::throttle::ThrottleReport;

/// Throttled per-day rates the next tick will apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedRates {
    /// Supply plus production, in W.
    pub energy_production: f64,
    /// Total consumption, in W.
    pub energy_consumption: f64,
    /// Metal extracted per day.
    pub metal_production: f64,
    /// Metal spent on construction per day.
    pub metal_consumption: f64,
    /// Slag produced per day.
    pub slag_production: f64,
    /// Probes completed per day.
    pub probe_production: f64,
    /// Dyson mass added per day.
    pub dyson_rate: f64,
    /// Effective compute in FLOPS.
    pub intelligence: f64,
    /// Total dexterity.
    pub dexterity: f64,
}

/// Legacy single-zone harvest estimate.
///
/// Shows what the selected zone would yield if every harvesting probe
/// worked there. The tick loop never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestEstimate {
    /// Selected zone.
    pub zone: String,
    /// Metal per day.
    pub metal_rate: f64,
    /// Harvesting draw in W.
    pub energy_cost: f64,
}

/// Everything a client needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Full state.
    pub state: GameState,
    /// Throttled rates.
    pub rates: DerivedRates,
    /// Throttle factors.
    pub throttle: ThrottleReport,
    /// Probes idled by metal shortage.
    pub idle: IdleProbes,
    /// Power terms.
    pub energy: EnergyBreakdown,
    /// Dexterity terms.
    pub dexterity: DexterityBreakdown,
    /// Compute terms.
    pub intelligence: IntelligenceBreakdown,
    /// FLOPS routed to each eligible tier.
    pub research_allocation: Vec<ResearchAllocation>,
    /// Share of a structure's cost returned when recycled.
    pub recycling_efficiency: f64,
    /// Effective Dyson target mass.
    pub dyson_target_mass: f64,
    /// Storage capacity in W-days.
    pub storage_capacity: f64,
    /// Estimate for the selected harvest zone.
    pub harvest_estimate: Option<HarvestEstimate>,
}

fn derived_rates(plan: &TickPlan) -> DerivedRates {
    let e = plan.throttle.energy_throttle;
    let build = plan.throttle.combined();
    let probe_production: f64 = plan
        .zones
        .values()
        .map(|z| {
            let replicated = if plan.probe_cost > 0.0 {
                z.replication_kg / plan.probe_cost
            } else {
                0.0
            };
            z.factory_probes + replicated
        })
        .sum();

    DerivedRates {
        energy_production: plan.energy.constant_supply + plan.energy.production(),
        energy_consumption: plan.energy.total_consumption,
        metal_production: plan.metal_production * e,
        metal_consumption: plan.metal_demand * build,
        slag_production: plan.zones.values().map(|z| z.slag).sum::<f64>() * e,
        probe_production: probe_production * build,
        dyson_rate: plan.dyson_rate * build,
        intelligence: plan.intelligence.effective,
        dexterity: plan.dexterity.total,
    }
}

fn idle_probes(plan: &TickPlan) -> IdleProbes {
    let shortfall = 1.0 - plan.throttle.metal_throttle;
    IdleProbes {
        probes: plan
            .zones
            .values()
            .map(|z| z.replication_probes * shortfall + z.factory_idle)
            .sum(),
        structures: plan.zones.values().map(|z| z.structure_probes).sum::<f64>() * shortfall,
        dyson: plan.dyson_probes * shortfall,
    }
}

fn harvest_estimate(state: &GameState, data: &GameData, plan: &TickPlan, dt: f64) -> Option<HarvestEstimate> {
    let zone = state.zones.get(&state.harvest_zone)?;
    let alloc = TaskAllocation {
        harvest: plan.allocations.values().map(|a| a.harvest).sum(),
        ..TaskAllocation::default()
    };
    let penalty = data
        .rules
        .zone_scaling_factor(zone.probes, plan.bonuses.compute_skill());
    let (metal_rate, _, _) = zone_metal_production(zone, &alloc, data, &plan.bonuses, penalty, dt);
    Some(HarvestEstimate {
        zone: zone.id.clone(),
        metal_rate,
        energy_cost: zone_harvest_energy(zone, &alloc, data, &plan.bonuses),
    })
}

/// Build a snapshot. Pure: the same state always yields the same snapshot.
#[must_use]
pub fn build_snapshot(state: &GameState, data: &GameData, dt: f64) -> StateSnapshot {
    let plan = plan_tick(state, data, dt);
    StateSnapshot {
        rates: derived_rates(&plan),
        throttle: plan.throttle,
        idle: idle_probes(&plan),
        energy: plan.energy,
        dexterity: plan.dexterity,
        intelligence: plan.intelligence,
        research_allocation: allocation_info(state, data, plan.intelligence.effective),
        recycling_efficiency: recycling_efficiency(data, &plan.bonuses),
        dyson_target_mass: plan.dyson_target_mass,
        storage_capacity: plan.storage_capacity,
        harvest_estimate: harvest_estimate(state, data, &plan, dt),
        state: state.clone(),
    }
}
