//! Simulation benchmarks for dyson_core.
//!
//! Run with: `cargo bench -p dyson_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dyson_core::prelude::*;

fn busy_simulation() -> Simulation {
    let data = GameData::solar_system().expect("built-in data");
    let mut sim = Simulation::new(data, SimConfig { delta_time: 1.0 });
    sim.apply_action(Action::ToggleResearchCategory {
        category: ResearchCategory::Energy,
        enabled: true,
    })
    .expect("toggle research");
    sim.apply_action(Action::PurchaseStructure {
        zone: "earth".to_string(),
        building: "probe_factory".to_string(),
        enabled: Some(true),
    })
    .expect("enable factory");
    for _ in 0..100 {
        sim.tick();
    }
    sim
}

/// Runs simulation benchmarks for the dyson_core crate.
pub fn simulation_benchmark(c: &mut Criterion) {
    let sim = busy_simulation();

    c.bench_function("tick", |b| {
        let mut sim = sim.clone();
        b.iter(|| black_box(sim.tick()));
    });

    c.bench_function("snapshot", |b| {
        b.iter(|| black_box(sim.snapshot()));
    });

    c.bench_function("state_hash", |b| {
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
