//! Probe allocation policy.
//!
//! Turns the global and per-zone sliders into fractional task counts. The
//! result is cached in [`GameState::allocations`] but is never a source of
//! truth: it is rebuilt from the sliders whenever probes or sliders change.

use std::collections::BTreeMap;

use crate::error::{GameError, Result};
use crate::state::{GameState, Sliders, TaskAllocation, Zone, ZonePolicy};

fn pct(value: f64) -> f64 {
    value.clamp(0.0, 100.0) / 100.0
}

/// Allocate one zone's probes from the sliders, before drift correction.
#[must_use]
pub fn allocate_zone(zone: &Zone, sliders: &Sliders) -> TaskAllocation {
    let probes = zone.probes.max(0.0);
    let dyson_share = probes * (1.0 - pct(sliders.economy));
    let economy_share = probes - dyson_share;
    let replication = pct(zone.policy.replication_slider);

    if zone.is_dyson_zone {
        let dyson = dyson_share * pct(zone.policy.construct_slider);
        let economy_replicate = economy_share * replication;
        return TaskAllocation {
            harvest: 0.0,
            construct: economy_share - economy_replicate,
            replicate: (dyson_share - dyson) + economy_replicate,
            dyson,
        };
    }

    let mining = zone
        .policy
        .mining_slider
        .map_or(1.0 - pct(sliders.mine_build), pct);
    let harvest = economy_share * mining;
    let build = economy_share - harvest;
    let replicate = build * replication;

    TaskAllocation {
        harvest,
        construct: build - replicate,
        replicate,
        dyson: dyson_share,
    }
}

/// Allocate every zone and correct floating drift.
///
/// A zone whose task sum exceeds its probe count by more than `epsilon` is
/// scaled down proportionally; the same check then runs globally.
#[must_use]
pub fn compute_allocations(state: &GameState, epsilon: f64) -> BTreeMap<String, TaskAllocation> {
    let mut allocations: BTreeMap<String, TaskAllocation> = state
        .zones
        .iter()
        .map(|(id, zone)| {
            let mut alloc = allocate_zone(zone, &state.sliders);
            let probes = zone.probes.max(0.0);
            let sum = alloc.total();
            if sum > probes + epsilon && sum > 0.0 {
                alloc = alloc.scaled(probes / sum);
            }
            (id.clone(), alloc)
        })
        .collect();

    let total_probes = state.total_probes().max(0.0);
    let total_allocated: f64 = allocations.values().map(TaskAllocation::total).sum();
    if total_allocated > total_probes + epsilon && total_allocated > 0.0 {
        let factor = total_probes / total_allocated;
        for alloc in allocations.values_mut() {
            *alloc = alloc.scaled(factor);
        }
    }

    allocations
}

/// Rebuild the cached allocations.
pub fn reallocate(state: &mut GameState, epsilon: f64) {
    state.allocations = compute_allocations(state, epsilon);
}

/// Derive the zone policy that reproduces a requested allocation.
///
/// The Dyson/economy split is global, so only the within-zone ratios are
/// taken from the request. A `dyson` count is only meaningful in the Dyson
/// zone while the economy slider leaves it a Dyson share; anywhere else it
/// is rejected rather than dropped.
///
/// # Errors
///
/// Returns [`GameError::InvalidAllocation`] if any task is negative, the
/// request exceeds the zone's probes by more than `epsilon`, or it asks for
/// Dyson-task probes the zone policy cannot express.
pub fn policy_for_request(
    zone: &Zone,
    sliders: &Sliders,
    request: &TaskAllocation,
    epsilon: f64,
) -> Result<ZonePolicy> {
    let parts = [
        request.harvest,
        request.construct,
        request.replicate,
        request.dyson,
    ];
    if parts.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(GameError::InvalidAllocation(
            "task counts must be finite and non-negative".to_string(),
        ));
    }
    if request.total() > zone.probes + epsilon {
        return Err(GameError::InvalidAllocation(format!(
            "requested {} probes but zone '{}' has {}",
            request.total(),
            zone.id,
            zone.probes
        )));
    }
    if zone.is_dyson_zone && request.harvest > 0.0 {
        return Err(GameError::InvalidAllocation(
            "the Dyson zone cannot harvest".to_string(),
        ));
    }

    let dyson_share = zone.probes.max(0.0) * (1.0 - pct(sliders.economy));
    if request.dyson > epsilon {
        if !zone.is_dyson_zone {
            return Err(GameError::InvalidAllocation(format!(
                "Dyson-task probes in zone '{}' follow the economy slider",
                zone.id
            )));
        }
        if dyson_share <= 0.0 {
            return Err(GameError::InvalidAllocation(
                "the economy slider leaves the Dyson zone no Dyson share".to_string(),
            ));
        }
    }

    let mut policy = zone.policy.clone();
    let build = request.construct + request.replicate;
    if build > 0.0 {
        policy.replication_slider = 100.0 * request.replicate / build;
    }

    if zone.is_dyson_zone {
        if dyson_share > 0.0 {
            policy.construct_slider = (100.0 * request.dyson / dyson_share).clamp(0.0, 100.0);
        }
    } else {
        let economy = request.harvest + build;
        if economy > 0.0 {
            policy.mining_slider = Some(100.0 * request.harvest / economy);
        }
    }

    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 0.001;

    fn zone(probes: f64, dyson: bool) -> Zone {
        Zone {
            id: if dyson { "dyson_sphere" } else { "earth" }.to_string(),
            is_dyson_zone: dyson,
            probes,
            ..Zone::default()
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_default_sliders_split() {
        let alloc = allocate_zone(&zone(100.0, false), &Sliders::default());
        // 33% Dyson, 67% economy split 50/50 into harvest/build, build all replicate
        assert!(close(alloc.dyson, 33.0));
        assert!(close(alloc.harvest, 33.5));
        assert!(close(alloc.replicate, 33.5));
        assert!(close(alloc.construct, 0.0));
        assert!(close(alloc.total(), 100.0));
    }

    #[test]
    fn test_dyson_zone_split() {
        let alloc = allocate_zone(&zone(100.0, true), &Sliders::default());
        // Dyson share 33: 90% build the sphere, rest replicates
        assert!(close(alloc.dyson, 29.7));
        assert!(close(alloc.replicate, 3.3 + 67.0));
        assert!(close(alloc.harvest, 0.0));
        assert!(close(alloc.total(), 100.0));
    }

    #[test]
    fn test_economy_slider_extremes() {
        let z = zone(10.0, false);
        let all_dyson = allocate_zone(
            &z,
            &Sliders {
                economy: 0.0,
                ..Sliders::default()
            },
        );
        assert!(close(all_dyson.dyson, 10.0));

        let all_economy = allocate_zone(
            &z,
            &Sliders {
                economy: 100.0,
                ..Sliders::default()
            },
        );
        assert!(close(all_economy.dyson, 0.0));
    }

    #[test]
    fn test_zone_mining_override() {
        let mut z = zone(10.0, false);
        z.policy.mining_slider = Some(100.0);
        let alloc = allocate_zone(
            &z,
            &Sliders {
                economy: 100.0,
                ..Sliders::default()
            },
        );
        assert!(close(alloc.harvest, 10.0));
    }

    #[test]
    fn test_out_of_range_sliders_clamped() {
        let alloc = allocate_zone(
            &zone(10.0, false),
            &Sliders {
                economy: 250.0,
                mine_build: -40.0,
                ..Sliders::default()
            },
        );
        assert!(close(alloc.harvest, 10.0));
        assert!(close(alloc.total(), 10.0));
    }

    #[test]
    fn test_policy_round_trips_request() {
        let z = zone(10.0, false);
        let sliders = Sliders {
            economy: 100.0,
            ..Sliders::default()
        };
        let request = TaskAllocation {
            harvest: 4.0,
            construct: 3.0,
            replicate: 3.0,
            dyson: 0.0,
        };
        let policy = policy_for_request(&z, &sliders, &request, EPS).unwrap();
        let mut applied = z.clone();
        applied.policy = policy;
        let alloc = allocate_zone(&applied, &sliders);
        assert!(close(alloc.harvest, 4.0));
        assert!(close(alloc.construct, 3.0));
        assert!(close(alloc.replicate, 3.0));
    }

    #[test]
    fn test_policy_rejects_overcommit() {
        let z = zone(5.0, false);
        let request = TaskAllocation {
            harvest: 6.0,
            ..TaskAllocation::default()
        };
        let err = policy_for_request(&z, &Sliders::default(), &request, EPS).unwrap_err();
        assert!(matches!(err, GameError::InvalidAllocation(_)));
    }

    #[test]
    fn test_policy_rejects_unexpressible_dyson() {
        let ferrying = TaskAllocation {
            harvest: 2.0,
            dyson: 3.0,
            ..TaskAllocation::default()
        };
        let err = policy_for_request(&zone(10.0, false), &Sliders::default(), &ferrying, EPS)
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidAllocation(_)));

        let all_economy = Sliders {
            economy: 100.0,
            ..Sliders::default()
        };
        let building = TaskAllocation {
            dyson: 4.0,
            ..TaskAllocation::default()
        };
        let sphere = zone(10.0, true);
        let err = policy_for_request(&sphere, &all_economy, &building, EPS).unwrap_err();
        assert!(matches!(err, GameError::InvalidAllocation(_)));

        let sliders = Sliders {
            economy: 0.0,
            ..Sliders::default()
        };
        let policy = policy_for_request(&sphere, &sliders, &building, EPS).unwrap();
        assert!(close(policy.construct_slider, 40.0));
    }

    proptest! {
        #[test]
        fn prop_allocation_never_exceeds_probes(
            probes in 0.0f64..1e12,
            economy in -10.0f64..110.0,
            mine_build in -10.0f64..110.0,
            replication in 0.0f64..100.0,
            dyson in any::<bool>(),
        ) {
            let mut z = zone(probes, dyson);
            z.policy.replication_slider = replication;
            let sliders = Sliders { economy, mine_build, ..Sliders::default() };
            let alloc = allocate_zone(&z, &sliders);
            prop_assert!(alloc.total() <= probes + EPS.max(probes * 1e-12));
            prop_assert!(alloc.harvest >= 0.0 && alloc.construct >= -1e-9);
            prop_assert!(alloc.replicate >= 0.0 && alloc.dyson >= 0.0);
        }
    }
}
