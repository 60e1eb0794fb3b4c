//! Scenario tests that run the full tick loop.
//!
//! Each test starts from a fixture, applies actions through the public API
//! and checks the economy-level outcome.

use std::collections::BTreeMap;

use dyson_core::prelude::*;
use dyson_core::state::{probe_key, TransferOutcome};
use dyson_test_utils::fixtures::{
    busy_economy, compute_scenario, daily_config, earth_scenario, solar_system,
};

// =============================================================================
// Starting economy
// =============================================================================

#[test]
fn test_earth_first_tick_metal_balance() {
    let mut sim = earth_scenario();
    assert_eq!(sim.state().resources.metal, 1000.0);

    // One probe at economy 67 / mine-build 50: 0.33 ferrying to the sphere,
    // 0.335 harvesting, 0.335 replicating.
    let events = sim.tick();

    // 0.335 probes * 100 kg/day * 0.32 metal fraction, plus one mining station.
    assert!((events.metal_produced - 60.72).abs() < 1e-9);
    // Replication 0.335 * 20 kg/day, Dyson 0.33 * 20 kg/day at half metal.
    assert!((events.construction.metal_spent - 10.0).abs() < 1e-9);
    assert!((sim.state().dyson.mass - 6.6).abs() < 1e-9);
    assert!((sim.state().resources.metal - 1050.72).abs() < 1e-9);
}

#[test]
fn test_metal_conservation_over_many_ticks() {
    let mut sim = busy_economy();
    for _ in 0..200 {
        let events = sim.tick();
        let expected = events.metal_before + events.metal_produced + events.metal_recycled
            - events.construction.metal_spent;
        assert!((sim.state().resources.metal - expected).abs() < 1e-6 * expected.max(1.0));
    }
}

#[test]
fn test_extraction_capped_by_zone_stock() {
    let data = solar_system();
    let mut state = GameState::new(&data);
    state.zones.get_mut("earth").unwrap().metal_remaining = 30.0;
    let mut sim = Simulation::from_state(data, state, daily_config());

    let events = sim.tick();
    assert!((events.metal_produced - 30.0).abs() < 1e-9);
    assert_eq!(sim.state().zones["earth"].metal_remaining, 0.0);
    assert!(sim.state().zones["earth"].depleted());

    let events = sim.tick();
    assert_eq!(events.metal_produced, 0.0);
}

// =============================================================================
// Research
// =============================================================================

#[test]
fn test_research_disabled_means_no_compute_draw() {
    let data = solar_system();
    let mut state = GameState::new(&data);
    state
        .zones
        .get_mut("earth")
        .unwrap()
        .structures
        .insert("orbital_data_center".to_string(), 1);
    let mut sim = Simulation::from_state(data, state, daily_config());

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.intelligence.demand, 0.0);
    assert_eq!(snapshot.energy.compute, 0.0);
    assert!(snapshot.research_allocation.is_empty());

    sim.tick();
    assert_eq!(sim.state().resources.intelligence, 0.0);
}

#[test]
fn test_enabled_research_receives_compute() {
    let mut sim = compute_scenario();
    let snapshot = sim.snapshot();
    assert!(snapshot.intelligence.effective > 0.0);
    assert!(!snapshot.research_allocation.is_empty());

    let tranches = |sim: &Simulation| -> Vec<u32> {
        sim.state()
            .research
            .values()
            .flat_map(|tiers| tiers.values().map(|t| t.tranches_completed))
            .collect()
    };
    let mut last = tranches(&sim);
    for _ in 0..30 {
        sim.tick();
        let now = tranches(&sim);
        assert!(now.iter().zip(&last).all(|(now, before)| now >= before));
        last = now;
    }

    let worked = sim
        .state()
        .research
        .values()
        .flat_map(BTreeMap::values)
        .any(|t| t.tranches_completed > 0 || t.progress > 0.0);
    assert!(worked);
    assert!(sim.state().resources.intelligence > 0.0);
}

// =============================================================================
// Transfers
// =============================================================================

#[test]
fn test_continuous_transfer_from_empty_zone_removed() {
    let mut sim = earth_scenario();
    let outcome = sim
        .apply_action(Action::CreateTransfer {
            from: "mars".to_string(),
            to: "earth".to_string(),
            mode: TransferMode::Continuous { rate: 1.0 },
        })
        .unwrap();
    assert!(matches!(outcome, ActionOutcome::TransferCreated { id: 1 }));

    sim.tick();
    let state = sim.state();
    assert!(state.transfers.is_empty());
    assert_eq!(state.transfer_history.len(), 1);
    assert_eq!(state.transfer_history[0].outcome, TransferOutcome::AutoRemoved);
}

#[test]
fn test_one_time_transfer_moves_probes_at_once() {
    let mut sim = busy_economy();
    let energy = sim.state().resources.energy;
    let outcome = sim
        .apply_action(Action::CreateTransfer {
            from: "earth".to_string(),
            to: "venus".to_string(),
            mode: TransferMode::OneTime { count: 5.0 },
        })
        .unwrap();

    let ActionOutcome::TransferClosed(record) = outcome else {
        panic!("expected a closed transfer, got {outcome:?}");
    };
    assert_eq!(record.outcome, TransferOutcome::Completed);
    assert_eq!(sim.state().zones["venus"].probes, 5.0);
    assert_eq!(sim.state().zones["earth"].probes, 35.0);
    assert!(sim.state().resources.energy < energy);
    assert!(sim.state().allocations["venus"].total() > 0.0);
}

// =============================================================================
// Sliders
// =============================================================================

#[test]
fn test_economy_slider_extremes() {
    let mut sim = busy_economy();
    let total = sim.state().total_probes();

    sim.apply_action(Action::SetEconomySlider { value: 0.0 }).unwrap();
    let dyson: f64 = sim.state().allocations.values().map(|a| a.dyson).sum();
    assert!((dyson - total).abs() < 1e-9);

    sim.apply_action(Action::SetEconomySlider { value: 100.0 }).unwrap();
    let dyson: f64 = sim.state().allocations.values().map(|a| a.dyson).sum();
    assert_eq!(dyson, 0.0);
}

#[test]
fn test_all_dyson_builds_sphere() {
    let mut sim = busy_economy();
    sim.apply_action(Action::SetEconomySlider { value: 0.0 }).unwrap();
    for _ in 0..5 {
        sim.tick();
    }
    assert!(sim.state().dyson.mass > 0.0);
    assert!(sim.state().dyson.target_mass >= sim.state().dyson.mass);
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_two_and_a_half_costs_complete_two_probes() {
    let data = solar_system();
    let mut state = GameState::new(&data);
    state.probe_progress.insert(probe_key("earth"), 250.0);
    let mut sim = Simulation::from_state(data, state, daily_config());

    let events = sim.tick();
    assert_eq!(events.construction.probes_built.get("earth"), Some(&2.0));
    assert_eq!(sim.state().zones["earth"].probes, 3.0);
    // 250 - 2 * 100, plus this tick's 0.335 * 20 kg of replication.
    let carried = sim.state().probe_progress[&probe_key("earth")];
    assert!((carried - 56.7).abs() < 1e-9);
}

#[test]
fn test_enabled_structure_gets_built() {
    let mut sim = busy_economy();
    sim.apply_action(Action::SetZonePolicy {
        zone: "earth".to_string(),
        policy: ZonePolicy {
            replication_slider: 0.0,
            ..ZonePolicy::default()
        },
    })
    .unwrap();
    let before = sim.state().zones["earth"].structure_count("solar_array_basic");
    for _ in 0..100 {
        sim.tick();
    }
    assert!(sim.state().zones["earth"].structure_count("solar_array_basic") > before);
}

#[test]
fn test_metal_shortage_idles_probes() {
    let data = solar_system();
    let mut state = GameState::new(&data);
    state.resources.metal = 0.0;
    let earth = state.zones.get_mut("earth").unwrap();
    earth.structures.clear();
    earth.probes = 10.0;
    let mut sim = Simulation::from_state(data, state, daily_config());
    sim.apply_action(Action::SetMineBuildSlider { value: 100.0 }).unwrap();

    let snapshot = sim.snapshot();
    assert!(snapshot.throttle.is_metal_limited);
    assert!(snapshot.idle.probes > 0.0);

    sim.tick();
    assert_eq!(sim.state().resources.metal, 0.0);
}

// =============================================================================
// Snapshot, saves and replays
// =============================================================================

#[test]
fn test_snapshot_is_pure() {
    let mut sim = busy_economy();
    sim.tick();
    let hash = sim.state_hash();
    let first = sim.snapshot();
    let second = sim.snapshot();
    assert_eq!(first, second);
    assert_eq!(sim.state_hash(), hash);
}

#[test]
fn test_snapshot_matches_next_tick_rates() {
    let mut sim = earth_scenario();
    let snapshot = sim.snapshot();
    let events = sim.tick();
    assert!((events.metal_produced - snapshot.rates.metal_production).abs() < 1e-9);
}

#[test]
fn test_action_log_replays_exactly() {
    let mut sim = busy_economy();
    let mut log = ActionLog::new("scenario", &sim).unwrap();

    log.apply(&mut sim, Action::SetBuildAllocation { value: 40.0 })
        .unwrap();
    for _ in 0..10 {
        sim.tick();
    }
    log.apply(
        &mut sim,
        Action::ToggleResearchCategory {
            category: ResearchCategory::Dexterity,
            enabled: true,
        },
    )
    .unwrap();
    for _ in 0..10 {
        sim.tick();
    }
    log.finalize(&sim);

    let replayed = log.replay().unwrap();
    assert_eq!(replayed.state_hash(), sim.state_hash());
}

#[test]
fn test_legacy_save_loads() {
    let json = r#"{
        "tick": 12,
        "metal": 500.0,
        "energy": 10.0,
        "probes": {"probe": 9.0},
        "probes_by_zone": {
            "earth": {"probe": 3.0, "miner_probe": 2.0},
            "mars": {"construction_probe": 4.0}
        },
        "structures": {"solar_array_basic": 2},
        "structures_by_zone": {"earth": {"solar_array_basic": 2}},
        "zone_metal_remaining": {"earth": 5000.0},
        "economy_slider": 80,
        "dyson_sphere_mass": 1000.0
    }"#;
    let mut sim = Simulation::load_save_json(solar_system(), json, daily_config()).unwrap();
    let state = sim.state();
    assert_eq!(state.tick, 12);
    assert_eq!(state.resources.metal, 500.0);
    assert_eq!(state.zones["earth"].probes, 5.0);
    assert_eq!(state.zones["mars"].probes, 4.0);
    assert_eq!(state.zones["earth"].structure_count("solar_array_basic"), 2);
    assert_eq!(state.zones["earth"].metal_remaining, 5000.0);
    assert!(state.zones["mars"].metal_remaining > 0.0);
    assert_eq!(state.sliders.economy, 80.0);
    assert_eq!(state.dyson.mass, 1000.0);

    sim.tick();
    assert_eq!(sim.get_tick(), 13);
}

#[test]
fn test_json_save_roundtrip_keeps_progress() {
    let mut sim = busy_economy();
    for _ in 0..20 {
        sim.tick();
    }
    let json = sim.to_json().unwrap();
    let loaded = Simulation::load_save_json(sim.data().clone(), &json, daily_config()).unwrap();
    assert_eq!(loaded.get_tick(), sim.get_tick());
    assert_eq!(loaded.state().zones["earth"].structures, sim.state().zones["earth"].structures);
    assert_eq!(loaded.state().enabled_construction, sim.state().enabled_construction);
}
