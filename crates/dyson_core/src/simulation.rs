//! Core simulation loop.
//!
//! A [`Simulation`] owns the static data, the runtime settings and the
//! mutable [`GameState`]. Each call to [`Simulation::tick`] advances the
//! economy by `delta_time` simulated days as one atomic transition; actions
//! are applied between ticks.
//!
//! # Determinism
//!
//! - All keyed collections are `BTreeMap`/`BTreeSet`, so iteration order is
//!   stable.
//! - No randomness and no wall-clock reads.
//! - Research bonuses are frozen at the start of each tick.
//! - Same inputs always produce the same [`Simulation::state_hash`].
//!
//! # Example
//!
//! ```
//! use dyson_core::prelude::*;
//!
//! let data = GameData::solar_system().unwrap();
//! let mut sim = Simulation::new(data, SimConfig::default());
//!
//! sim.apply_action(Action::SetEconomySlider { value: 80.0 }).unwrap();
//! sim.tick();
//!
//! assert_eq!(sim.state().tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use serde::{Deserialize, Serialize};

use crate::actions::{self, Action, ActionOutcome};
use crate::allocation::reallocate;
use crate::construction::{
    collect_garbage, run_dyson_construction, run_probe_trackers, run_structure_trackers,
    ConstructionReport,
};
use crate::data::GameData;
use crate::economy::{plan_tick, slag_recycling, SlagRecycling};
use crate::error::{GameError, Result};
use crate::migration;
use crate::research::{advance_research, TrancheCompletion};
use crate::snapshot::{build_snapshot, StateSnapshot};
use crate::state::GameState;
use crate::throttle::ThrottleReport;
use crate::transfers::{process_continuous, TransferEvent};

/// Ticks per wall-clock second at normal speed.
pub const TICK_RATE: u32 = 60;

/// Runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulated days per tick.
    pub delta_time: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            delta_time: 1.0 / f64::from(TICK_RATE),
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Stored metal before the tick.
    pub metal_before: f64,
    /// Metal extracted.
    pub metal_produced: f64,
    /// Metal recovered from slag.
    pub metal_recycled: f64,
    /// Converter pass result.
    pub recycling: SlagRecycling,
    /// Construction results.
    pub construction: ConstructionReport,
    /// Research tranches gained.
    pub research: Vec<TrancheCompletion>,
    /// Continuous transfer results.
    pub transfers: Vec<TransferEvent>,
    /// Throttle factors applied.
    pub throttle: ThrottleReport,
}

/// The economy simulation.
///
/// # Tick Order
///
/// 1. **Plan** - rates from the frozen state and bonuses
/// 2. **Energy** - storage and surplus
/// 3. **Research** - progress with the compute actually served
/// 4. **Extraction** - metal, slag and zone stock debits
/// 5. **Probes** - factories, then replication
/// 6. **Structures** - equal split per zone, then cleanup
/// 7. **Dyson** - sphere mass
/// 8. **Transfers** - continuous transfers in id order
/// 9. **Recycling** - converters burn surplus power on slag
/// 10. **Totals** - dexterity, intelligence, clock, allocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    data: GameData,
    config: SimConfig,
    state: GameState,
}

impl Simulation {
    /// Start a new game from the data set's starting conditions.
    #[must_use]
    pub fn new(data: GameData, config: SimConfig) -> Self {
        let mut state = GameState::new(&data);
        reallocate(&mut state, data.rules.allocation_epsilon);
        Self {
            data,
            config,
            state,
        }
    }

    /// Resume from an existing state.
    #[must_use]
    pub fn from_state(data: GameData, mut state: GameState, config: SimConfig) -> Self {
        migration::normalize(&mut state, &data);
        reallocate(&mut state, data.rules.allocation_epsilon);
        Self {
            data,
            config,
            state,
        }
    }

    /// Resume from a JSON save, migrating older layouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be parsed.
    pub fn load_save_json(data: GameData, json: &str, config: SimConfig) -> Result<Self> {
        let state = migration::load_save_json(json, &data)?;
        Ok(Self {
            data,
            config,
            state,
        })
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Static data.
    #[must_use]
    pub const fn data(&self) -> &GameData {
        &self.data
    }

    /// Runtime settings.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.state.tick
    }

    /// Advance the economy by one tick.
    pub fn tick(&mut self) -> TickEvents {
        let dt = self.config.delta_time.max(0.0);
        let data = &self.data;
        let state = &mut self.state;

        let plan = plan_tick(state, data, dt);
        let solution = plan.energy_solution;
        let e = plan.throttle.energy_throttle;
        let factor = plan.throttle.combined();

        let mut events = TickEvents {
            metal_before: state.resources.metal,
            throttle: plan.throttle,
            ..TickEvents::default()
        };

        state.resources.energy_stored = solution.stored_after.max(0.0);
        state.resources.energy = solution.surplus.max(0.0);

        events.research = advance_research(state, data, solution.effective_flops, dt);

        for (zone_id, rates) in &plan.zones {
            let Some(zone) = state.zones.get_mut(zone_id) else {
                continue;
            };
            let metal = (rates.metal * e * dt).min(zone.metal_remaining).max(0.0);
            if metal <= 0.0 {
                continue;
            }
            let scale = if rates.metal > 0.0 { metal / (rates.metal * dt) } else { 0.0 };
            let slag = rates.slag * scale * dt;
            zone.metal_remaining = (zone.metal_remaining - metal).max(0.0);
            zone.mass_remaining = (zone.mass_remaining - rates.mass_removed * scale * dt).max(0.0);
            zone.slag_produced += slag;
            state.resources.metal += metal;
            state.resources.slag += slag;
            events.metal_produced += metal;
        }

        let mut report = ConstructionReport::default();
        run_probe_trackers(state, &plan, factor, dt, &mut report);
        run_structure_trackers(state, data, &plan, factor, dt, &mut report);
        collect_garbage(state, data);
        run_dyson_construction(state, data, &plan, factor, dt, &mut report);
        state.dyson.target_mass = plan.dyson_target_mass.max(state.dyson.mass);
        events.construction = report;

        events.transfers = process_continuous(state, dt);

        let recycling = slag_recycling(state, data, &plan.bonuses, state.resources.energy, dt);
        if recycling.slag_used > 0.0 {
            state.resources.slag = (state.resources.slag - recycling.slag_used).max(0.0);
            state.resources.metal += recycling.metal_recovered;
            state.resources.energy = (state.resources.energy - recycling.power_used).max(0.0);
        }
        events.metal_recycled = recycling.metal_recovered;
        events.recycling = recycling;

        state.resources.intelligence = solution.effective_flops.max(0.0);
        state.resources.dexterity =
            state.total_probes() * data.base_probe().base_dexterity * plan.bonuses.dexterity;

        state.tick += 1;
        state.time += dt;
        reallocate(state, data.rules.allocation_epsilon);

        #[cfg(feature = "debug-validation")]
        for violation in check_invariants(state, data) {
            tracing::error!(tick = state.tick, %violation, "Invariant violated");
        }

        tracing::debug!(
            tick = self.state.tick,
            state_hash = self.state_hash(),
            energy_throttle = events.throttle.energy_throttle,
            metal_throttle = events.throttle.metal_throttle,
            probes_built = events.construction.total_probes_built(),
            structures_built = events.construction.structures_built.len(),
            "Tick complete"
        );

        events
    }

    /// Validate and apply a player action.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the state is unchanged on error.
    pub fn apply_action(&mut self, action: Action) -> Result<ActionOutcome> {
        match actions::apply_action(&mut self.state, &self.data, &action) {
            Ok(outcome) => {
                tracing::info!(tick = self.state.tick, action = action.name(), "Action applied");
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(tick = self.state.tick, action = action.name(), error = %e, "Action rejected");
                Err(e)
            }
        }
    }

    /// Read-only view with every derived rate and breakdown.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        build_snapshot(&self.state, &self.data, self.config.delta_time)
    }

    /// Hash of the canonical state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.state.hash_into(&mut hasher);
        hasher.finish()
    }

    /// Serialize the whole simulation for saves and replays.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize a simulation from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })
    }

    /// Plain JSON save of the state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.state)
            .map_err(|e| GameError::InvalidState(format!("Failed to write save: {e}")))
    }
}

/// Check the state invariants that must hold after every tick.
///
/// Returns one message per violation.
#[must_use]
pub fn check_invariants(state: &GameState, data: &GameData) -> Vec<String> {
    let mut violations = Vec::new();
    let r = &state.resources;
    for (name, value) in [
        ("energy", r.energy),
        ("energy_stored", r.energy_stored),
        ("metal", r.metal),
        ("intelligence", r.intelligence),
        ("dexterity", r.dexterity),
        ("slag", r.slag),
    ] {
        if !(value >= 0.0) {
            violations.push(format!("Resource '{name}' is {value}"));
        }
    }

    let eps = data.rules.allocation_epsilon;
    for (zone_id, zone) in &state.zones {
        if zone.probes < 0.0 || zone.metal_remaining < 0.0 || zone.mass_remaining < 0.0 {
            violations.push(format!("Zone '{zone_id}' has a negative stock"));
        }
        if let Some(alloc) = state.allocations.get(zone_id) {
            if alloc.total() > zone.probes + eps {
                violations.push(format!(
                    "Zone '{zone_id}' allocates {} of {} probes",
                    alloc.total(),
                    zone.probes
                ));
            }
        }
    }

    for tree in &data.research_trees {
        for (key, entry) in tree.tier_entries() {
            if let Some(tier) = state.tier(&tree.id, &key) {
                if tier.tranches_completed > entry.tier.tranches {
                    violations.push(format!(
                        "Tier '{}/{key}' has {} of {} tranches",
                        tree.id, tier.tranches_completed, entry.tier.tranches
                    ));
                }
            }
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily() -> Simulation {
        let data = GameData::solar_system().expect("built-in data");
        Simulation::new(data, SimConfig { delta_time: 1.0 })
    }

    #[test]
    fn test_simulation_new() {
        let sim = daily();
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.state().zones["earth"].probes, 1.0);
        assert!(sim.state().allocations.contains_key("earth"));
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut sim = daily();
        sim.tick();
        sim.tick();
        assert_eq!(sim.get_tick(), 2);
        assert!((sim.state().time - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_metal_conservation() {
        let mut sim = daily();
        for _ in 0..20 {
            let events = sim.tick();
            let expected = events.metal_before + events.metal_produced + events.metal_recycled
                - events.construction.metal_spent;
            assert!((sim.state().resources.metal - expected).abs() < 1e-6);
            assert!(sim.state().resources.metal >= 0.0);
        }
    }

    #[test]
    fn test_invariants_hold() {
        let mut sim = daily();
        sim.apply_action(Action::SetMineBuildSlider { value: 100.0 })
            .unwrap();
        for _ in 0..50 {
            sim.tick();
            assert!(check_invariants(sim.state(), sim.data()).is_empty());
        }
    }

    #[test]
    fn test_determinism() {
        let mut sim1 = daily();
        let mut sim2 = daily();
        for _ in 0..30 {
            sim1.tick();
            sim2.tick();
        }
        assert_eq!(sim1.state_hash(), sim2.state_hash());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = daily();
        sim.tick();

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();

        assert_eq!(sim.get_tick(), restored.get_tick());
        assert_eq!(sim.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_rejected_action_leaves_state() {
        let mut sim = daily();
        let hash = sim.state_hash();
        let result = sim.apply_action(Action::PurchaseProbe {
            zone: "earth".to_string(),
            probe_type: "warp_probe".to_string(),
        });
        assert!(matches!(result, Err(GameError::UnknownProbeType(_))));
        assert_eq!(sim.state_hash(), hash);
    }

    #[test]
    fn test_json_save_reload() {
        let mut sim = daily();
        sim.tick();
        let json = sim.to_json().unwrap();
        let data = sim.data().clone();
        let loaded = Simulation::load_save_json(data, &json, *sim.config()).unwrap();
        assert_eq!(loaded.get_tick(), 1);
        assert_eq!(
            loaded.state().zones["earth"].structures,
            sim.state().zones["earth"].structures
        );
    }
}
