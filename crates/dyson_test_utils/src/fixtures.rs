//! Test fixtures and helpers.
//!
//! Pre-built simulations for consistent testing. All fixtures run one
//! simulated day per tick so rates read directly as per-tick deltas.

use dyson_core::prelude::*;

/// One simulated day per tick.
#[must_use]
pub fn daily_config() -> SimConfig {
    SimConfig { delta_time: 1.0 }
}

/// The built-in solar system data.
///
/// # Panics
///
/// Panics if the bundled data fails to parse.
#[must_use]
pub fn solar_system() -> GameData {
    GameData::solar_system().expect("bundled solar system data must load")
}

/// Fresh game: one probe on Earth with 1000 kg of metal, a solar array and
/// a mining station.
#[must_use]
pub fn earth_scenario() -> Simulation {
    Simulation::new(solar_system(), daily_config())
}

/// Earth scenario with every research category enabled.
///
/// # Panics
///
/// Panics if a category toggle is rejected.
#[must_use]
pub fn research_ready() -> Simulation {
    let mut sim = earth_scenario();
    for category in [
        ResearchCategory::Energy,
        ResearchCategory::Dexterity,
        ResearchCategory::Intelligence,
    ] {
        sim.apply_action(Action::ToggleResearchCategory {
            category,
            enabled: true,
        })
        .expect("category toggle");
    }
    sim
}

/// Research-ready game with a compute structure in the Dyson zone, so tiers
/// actually receive FLOPS.
///
/// # Panics
///
/// Panics if the bundled data lacks the data center building.
#[must_use]
pub fn compute_scenario() -> Simulation {
    let sim = research_ready();
    let mut state = sim.state().clone();
    state
        .zones
        .get_mut("earth")
        .expect("earth zone")
        .structures
        .insert("orbital_data_center".to_string(), 1);
    Simulation::from_state(sim.data().clone(), state, daily_config())
}

/// A mid-game economy: more probes, a factory and an active build queue.
///
/// # Panics
///
/// Panics if any setup action is rejected.
#[must_use]
pub fn busy_economy() -> Simulation {
    let data = solar_system();
    let mut state = GameState::new(&data);
    state.resources.metal = 50_000.0;
    state.resources.energy = 1e9;
    {
        let earth = state.zones.get_mut("earth").expect("earth zone");
        earth.probes = 40.0;
        earth.structures.insert("probe_factory".to_string(), 2);
    }
    state
        .zones
        .get_mut("mars")
        .expect("mars zone")
        .probes = 10.0;

    let mut sim = Simulation::from_state(data, state, daily_config());
    sim.apply_action(Action::PurchaseStructure {
        zone: "earth".to_string(),
        building: "solar_array_basic".to_string(),
        enabled: Some(true),
    })
    .expect("enable solar array");
    sim.apply_action(Action::SetMineBuildSlider { value: 60.0 })
        .expect("mine/build slider");
    sim
}
