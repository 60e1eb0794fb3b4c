//! Construction trackers for probes, structures and the Dyson sphere.
//!
//! Every target accumulates kg of metal invested. Each draw takes at most
//! what is stored (`min(desired, metal)`) and debits it immediately; once
//! progress reaches the unit cost, whole units complete and the remainder
//! carries over.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::GameData;
use crate::economy::TickPlan;
use crate::state::{factory_key, probe_key, split_structure_key, structure_key, GameState};

/// Probes idled by metal shortage, by task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IdleProbes {
    /// Replication and factory output lost.
    pub probes: f64,
    /// Structure builders without metal.
    pub structures: f64,
    /// Dyson builders without metal.
    pub dyson: f64,
}

/// A structure completed during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCompletion {
    /// Zone id.
    pub zone: String,
    /// Building id.
    pub building: String,
    /// Units completed.
    pub count: u32,
}

/// Result of running every tracker once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionReport {
    /// Metal every tracker asked for.
    pub metal_desired: f64,
    /// Metal actually drawn.
    pub metal_spent: f64,
    /// Probes completed per zone.
    pub probes_built: BTreeMap<String, f64>,
    /// Structures completed.
    pub structures_built: Vec<StructureCompletion>,
    /// Dyson mass added in kg.
    pub dyson_mass_added: f64,
    /// Probes idled by metal shortage.
    pub idle: IdleProbes,
}

impl ConstructionReport {
    /// Total probes completed.
    #[must_use]
    pub fn total_probes_built(&self) -> f64 {
        self.probes_built.values().sum()
    }

    fn draw(&mut self, metal: &mut f64, desired: f64) -> f64 {
        let desired = desired.max(0.0);
        let drawn = desired.min(metal.max(0.0));
        *metal = (*metal - drawn).max(0.0);
        self.metal_desired += desired;
        self.metal_spent += drawn;
        drawn
    }
}

/// Complete as many whole units as `progress` covers.
///
/// Returns `floor(progress / cost)` and leaves the remainder in `progress`.
/// A non-positive cost completes nothing.
pub fn complete_units(progress: &mut f64, cost: f64) -> f64 {
    if cost <= 0.0 || *progress < cost {
        return 0.0;
    }
    let units = (*progress / cost).floor();
    *progress = (*progress - units * cost).max(0.0);
    units
}

fn shortfall(assigned: f64, desired: f64, drawn: f64) -> f64 {
    if desired > 0.0 {
        assigned * (1.0 - drawn / desired).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn units_to_u32(units: f64) -> u32 {
    // Clamped to the u32 range first
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = units.clamp(0.0, f64::from(u32::MAX)) as u32;
    whole
}

/// Advance factory output, then manual replication, in every zone.
pub fn run_probe_trackers(
    state: &mut GameState,
    plan: &TickPlan,
    factor: f64,
    dt: f64,
    report: &mut ConstructionReport,
) {
    for (zone_id, rates) in &plan.zones {
        let mut built = 0.0;

        let desired = rates.factory_metal * factor * dt;
        if desired > 0.0 {
            let drawn = report.draw(&mut state.resources.metal, desired);
            let progress = state.probe_progress.entry(factory_key(zone_id)).or_insert(0.0);
            *progress += drawn;
            built += complete_units(progress, rates.factory_cost);
            report.idle.probes += rates.factory_idle
                + shortfall(rates.factory_probes, desired, drawn);
        } else {
            report.idle.probes += rates.factory_idle;
        }

        let desired = rates.replication_kg * factor * dt;
        if desired > 0.0 {
            let drawn = report.draw(&mut state.resources.metal, desired);
            let progress = state.probe_progress.entry(probe_key(zone_id)).or_insert(0.0);
            *progress += drawn;
            built += complete_units(progress, plan.probe_cost);
            report.idle.probes += shortfall(rates.replication_probes, desired, drawn);
        }

        if built > 0.0 {
            if let Some(zone) = state.zones.get_mut(zone_id) {
                zone.probes += built;
            }
            tracing::info!(zone = %zone_id, probes = built, "Probes completed");
            *report.probes_built.entry(zone_id.clone()).or_insert(0.0) += built;
        }
    }
}

/// Structure keys being worked on in a zone: enabled keys plus in-flight
/// progress.
#[must_use]
pub fn active_structure_keys(state: &GameState, data: &GameData, zone_id: &str) -> BTreeSet<String> {
    let in_zone = |key: &String| split_structure_key(key, data).is_some_and(|(z, _)| z == zone_id);
    state
        .enabled_construction
        .iter()
        .filter(|key| in_zone(key))
        .chain(
            state
                .structure_progress
                .iter()
                .filter(|(key, progress)| **progress > 0.0 && in_zone(key))
                .map(|(key, _)| key),
        )
        .cloned()
        .collect()
}

/// Advance structure construction in every zone.
///
/// Structure power is split equally across a zone's active keys. Disabled
/// keys only finish their in-flight unit and never start another.
pub fn run_structure_trackers(
    state: &mut GameState,
    data: &GameData,
    plan: &TickPlan,
    factor: f64,
    dt: f64,
    report: &mut ConstructionReport,
) {
    for (zone_id, rates) in &plan.zones {
        if rates.structure_kg <= 0.0 {
            continue;
        }
        let keys = active_structure_keys(state, data, zone_id);
        if keys.is_empty() {
            continue;
        }
        let per_key = rates.structure_kg / keys.len() as f64;
        let probes_per_key = rates.structure_probes / keys.len() as f64;

        for key in keys {
            let Some((_, building_id)) = split_structure_key(&key, data) else {
                continue;
            };
            let Some(building) = data.get_building(building_id) else {
                continue;
            };
            let cost = building.base_cost_metal;
            let enabled = state.enabled_construction.contains(&key);
            let current = state.structure_progress.get(&key).copied().unwrap_or(0.0);

            let mut desired = per_key * factor * dt;
            if !enabled {
                desired = desired.min((cost - current).max(0.0));
            }
            let drawn = report.draw(&mut state.resources.metal, desired);
            report.idle.structures += shortfall(probes_per_key, desired, drawn);

            let progress = state.structure_progress.entry(key.clone()).or_insert(0.0);
            *progress += drawn;
            let units = if enabled {
                complete_units(progress, cost)
            } else if cost > 0.0 && *progress >= cost {
                *progress = 0.0;
                1.0
            } else {
                0.0
            };

            if units > 0.0 {
                let count = units_to_u32(units);
                if let Some(zone) = state.zones.get_mut(zone_id) {
                    let entry = zone.structures.entry(building_id.to_string()).or_insert(0);
                    *entry = entry.saturating_add(count);
                }
                tracing::info!(zone = %zone_id, building = %building_id, count, "Structure completed");
                report.structures_built.push(StructureCompletion {
                    zone: zone_id.clone(),
                    building: building_id.to_string(),
                    count,
                });
            }
        }
    }
}

/// Drop progress entries that can never complete.
///
/// Removes keys with an unknown zone or building, and disabled keys with no
/// progress left.
pub fn collect_garbage(state: &mut GameState, data: &GameData) {
    let enabled = &state.enabled_construction;
    state.structure_progress.retain(|key, progress| {
        split_structure_key(key, data).is_some() && (*progress > 0.0 || enabled.contains(key))
    });
}

/// Add Dyson mass, paying 0.5 kg of metal per kg (by default).
pub fn run_dyson_construction(
    state: &mut GameState,
    data: &GameData,
    plan: &TickPlan,
    factor: f64,
    dt: f64,
    report: &mut ConstructionReport,
) {
    let remaining = (plan.dyson_target_mass - state.dyson.mass).max(0.0);
    let mass_wanted = (plan.dyson_rate * factor * dt).min(remaining);
    if mass_wanted <= 0.0 {
        return;
    }

    let per_kg = data.rules.dyson_metal_per_kg;
    let added = if per_kg > 0.0 {
        let desired = mass_wanted * per_kg;
        let drawn = report.draw(&mut state.resources.metal, desired);
        report.idle.dyson += shortfall(plan.dyson_probes, desired, drawn);
        drawn / per_kg
    } else {
        mass_wanted
    };

    state.dyson.mass = (state.dyson.mass + added).min(plan.dyson_target_mass.max(state.dyson.mass));
    report.dyson_mass_added += added;
}

/// Ensure a structure key exists for a newly enabled build.
pub fn enable_structure(state: &mut GameState, zone_id: &str, building_id: &str, enabled: bool) {
    let key = structure_key(zone_id, building_id);
    if enabled {
        state.enabled_construction.insert(key);
    } else {
        state.enabled_construction.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::plan_tick;

    fn setup() -> (GameData, GameState) {
        let data = GameData::solar_system().expect("built-in data");
        let state = GameState::new(&data);
        (data, state)
    }

    #[test]
    fn test_two_and_a_half_costs_complete_two() {
        let mut progress = 250.0;
        let units = complete_units(&mut progress, 100.0);
        assert_eq!(units, 2.0);
        assert!((progress - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_cost_completes_nothing() {
        let mut progress = 10.0;
        assert_eq!(complete_units(&mut progress, 0.0), 0.0);
        assert_eq!(progress, 10.0);
    }

    #[test]
    fn test_draw_never_exceeds_stock() {
        let mut report = ConstructionReport::default();
        let mut metal = 30.0;
        let drawn = report.draw(&mut metal, 50.0);
        assert_eq!(drawn, 30.0);
        assert_eq!(metal, 0.0);
        assert_eq!(report.metal_desired, 50.0);
        assert_eq!(report.metal_spent, 30.0);
    }

    #[test]
    fn test_replication_completes_probe_with_carry() {
        let (data, mut state) = setup();
        state.sliders.economy = 100.0;
        state.zones.get_mut("earth").unwrap().policy.mining_slider = Some(0.0);
        state.probe_progress.insert(probe_key("earth"), 90.0);

        let plan = plan_tick(&state, &data, 1.0);
        let mut report = ConstructionReport::default();
        run_probe_trackers(&mut state, &plan, 1.0, 1.0, &mut report);

        // 1 probe replicating at 20 kg/day: 90 + 20 = 110 -> one probe, 10 carried
        assert_eq!(report.probes_built.get("earth"), Some(&1.0));
        assert_eq!(state.zones["earth"].probes, 2.0);
        assert!((state.probe_progress[&probe_key("earth")] - 10.0).abs() < 1e-9);
        assert!((state.resources.metal - 980.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_structure_finishes_without_restart() {
        let (data, mut state) = setup();
        state.sliders.economy = 100.0;
        let earth = state.zones.get_mut("earth").unwrap();
        earth.policy.mining_slider = Some(0.0);
        earth.policy.replication_slider = 0.0;
        earth.probes = 100.0;
        let key = structure_key("earth", "battery_bank");
        state.structure_progress.insert(key.clone(), 790.0);

        let plan = plan_tick(&state, &data, 1.0);
        let mut report = ConstructionReport::default();
        run_structure_trackers(&mut state, &data, &plan, 1.0, 1.0, &mut report);

        // Only the 10 kg needed to finish were drawn
        assert_eq!(report.metal_desired, 10.0);
        assert_eq!(state.zones["earth"].structure_count("battery_bank"), 1);
        assert_eq!(state.structure_progress[&key], 0.0);

        collect_garbage(&mut state, &data);
        assert!(!state.structure_progress.contains_key(&key));
    }

    #[test]
    fn test_enabled_structures_share_power() {
        let (data, mut state) = setup();
        state.sliders.economy = 100.0;
        let earth = state.zones.get_mut("earth").unwrap();
        earth.policy.mining_slider = Some(0.0);
        earth.policy.replication_slider = 0.0;
        earth.probes = 10.0;
        enable_structure(&mut state, "earth", "battery_bank", true);
        enable_structure(&mut state, "earth", "solar_array_basic", true);

        let plan = plan_tick(&state, &data, 1.0);
        let mut report = ConstructionReport::default();
        run_structure_trackers(&mut state, &data, &plan, 1.0, 1.0, &mut report);

        // 10 probes * 20 kg/day split over two keys
        assert!((state.structure_progress[&structure_key("earth", "battery_bank")] - 100.0).abs() < 1e-9);
        assert!(
            (state.structure_progress[&structure_key("earth", "solar_array_basic")] - 100.0).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_dyson_metal_shortage_records_idle() {
        let (data, mut state) = setup();
        state.sliders.economy = 0.0;
        let dyson_zone = state.zones.get_mut("dyson_sphere").unwrap();
        dyson_zone.probes = 10.0;
        dyson_zone.policy.construct_slider = 100.0;
        state.resources.metal = 50.0;

        let plan = plan_tick(&state, &data, 1.0);
        let mut report = ConstructionReport::default();
        run_dyson_construction(&mut state, &data, &plan, 1.0, 1.0, &mut report);

        // 11 Dyson-task probes (10 here, 1 ferrying from Earth) want 220 kg; only 50 kg metal
        assert!((state.dyson.mass - 100.0).abs() < 1e-9);
        assert_eq!(state.resources.metal, 0.0);
        assert!(report.idle.dyson > 0.0);
    }
}
