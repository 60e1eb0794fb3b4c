//! Energy and metal throttle solver.
//!
//! Both throttles are recomputed from instantaneous rates every tick, with no
//! smoothing. Both factors are always in `[0, 1]`.

use serde::{Deserialize, Serialize};

/// Inputs of the energy balance for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyInputs {
    /// Baseline supply in W.
    pub constant_supply: f64,
    /// Dyson and structure production in W.
    pub production: f64,
    /// Non-compute consumption in W (efficiency already applied).
    pub non_compute: f64,
    /// FLOPS research could absorb this tick.
    pub compute_demand: f64,
    /// Compute efficiency bonus.
    pub compute_efficiency: f64,
    /// Energy efficiency divisor (at least 1).
    pub consumption_divisor: f64,
    /// FLOPS served per watt of compute draw.
    pub flops_per_compute_watt: f64,
    /// Energy in storage, in W-days.
    pub stored: f64,
    /// Storage capacity, in W-days.
    pub capacity: f64,
    /// Tick length in days.
    pub dt: f64,
}

/// Resolved energy balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySolution {
    /// Supply plus production, in W.
    pub available: f64,
    /// Power storage could release this tick, in W.
    pub discharge: f64,
    /// Non-compute consumption in W.
    pub non_compute: f64,
    /// Compute draw in W.
    pub compute_draw: f64,
    /// Total consumption in W.
    pub total_consumption: f64,
    /// Energy throttle in [0, 1].
    pub throttle: f64,
    /// FLOPS actually served.
    pub effective_flops: f64,
    /// Storage level after the tick, in W-days.
    pub stored_after: f64,
    /// Unconsumed power after storage charging, in W.
    pub surplus: f64,
}

/// Solve the energy balance.
///
/// Compute only receives what remains after non-compute consumption, so a
/// shortfall always originates from non-compute draw.
#[must_use]
pub fn solve_energy(inputs: &EnergyInputs) -> EnergySolution {
    let available = (inputs.constant_supply + inputs.production).max(0.0);
    let stored = inputs.stored.max(0.0);
    let discharge = if inputs.dt > 0.0 { stored / inputs.dt } else { 0.0 };
    let non_compute = inputs.non_compute.max(0.0);

    let flops_per_watt = inputs.compute_efficiency.max(0.0)
        * inputs.consumption_divisor.max(1.0)
        * inputs.flops_per_compute_watt.max(0.0);
    let available_for_compute = (available + discharge - non_compute).max(0.0);
    let effective_flops = inputs
        .compute_demand
        .max(0.0)
        .min(available_for_compute * flops_per_watt);
    let compute_draw = if flops_per_watt > 0.0 {
        effective_flops / flops_per_watt
    } else {
        0.0
    };

    let total_consumption = non_compute + compute_draw;
    let capacity = inputs.capacity.max(0.0);

    if available + discharge >= total_consumption {
        let net = available - total_consumption;
        let (stored_after, surplus) = if net >= 0.0 {
            let headroom = (capacity - stored).max(0.0);
            let charge = if inputs.dt > 0.0 {
                net.min(headroom / inputs.dt)
            } else {
                0.0
            };
            ((stored + charge * inputs.dt).min(capacity), net - charge)
        } else {
            ((stored + net * inputs.dt).clamp(0.0, capacity), 0.0)
        };
        EnergySolution {
            available,
            discharge,
            non_compute,
            compute_draw,
            total_consumption,
            throttle: 1.0,
            effective_flops,
            stored_after,
            surplus,
        }
    } else {
        let throttle = if total_consumption > 0.0 {
            ((available + discharge) / total_consumption).clamp(0.0, 1.0)
        } else {
            0.0
        };
        EnergySolution {
            available,
            discharge,
            non_compute,
            compute_draw,
            total_consumption,
            throttle,
            effective_flops,
            stored_after: 0.0,
            surplus: 0.0,
        }
    }
}

/// Metal throttle.
///
/// Engages only when stored metal is exhausted and production (already
/// energy-throttled) cannot cover demand.
#[must_use]
pub fn metal_throttle(stored_metal: f64, production: f64, demand: f64) -> f64 {
    if stored_metal > 0.0 || production >= demand {
        return 1.0;
    }
    if demand > 0.0 {
        (production.max(0.0) / demand).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Throttle factors and display flags of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrottleReport {
    /// Energy throttle in [0, 1].
    pub energy_throttle: f64,
    /// Metal throttle in [0, 1].
    pub metal_throttle: f64,
    /// Energy is the binding constraint.
    pub is_energy_limited: bool,
    /// Metal is the binding constraint.
    pub is_metal_limited: bool,
}

impl Default for ThrottleReport {
    fn default() -> Self {
        Self {
            energy_throttle: 1.0,
            metal_throttle: 1.0,
            is_energy_limited: false,
            is_metal_limited: false,
        }
    }
}

impl ThrottleReport {
    /// Build a report from the two factors.
    #[must_use]
    pub fn new(energy_throttle: f64, metal_throttle: f64) -> Self {
        Self {
            energy_throttle,
            metal_throttle,
            is_energy_limited: energy_throttle < 1.0,
            is_metal_limited: metal_throttle < 1.0,
        }
    }

    /// Combined factor for construction rates.
    #[must_use]
    pub fn combined(&self) -> f64 {
        self.energy_throttle * self.metal_throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs(production: f64, non_compute: f64) -> EnergyInputs {
        EnergyInputs {
            constant_supply: 100_000.0,
            production,
            non_compute,
            compute_demand: 0.0,
            compute_efficiency: 1.0,
            consumption_divisor: 1.0,
            flops_per_compute_watt: 1e12,
            stored: 0.0,
            capacity: 0.0,
            dt: 1.0,
        }
    }

    #[test]
    fn test_surplus_no_throttle() {
        let solution = solve_energy(&inputs(0.0, 40_000.0));
        assert_eq!(solution.throttle, 1.0);
        assert_eq!(solution.surplus, 60_000.0);
    }

    #[test]
    fn test_deficit_throttles_proportionally() {
        let solution = solve_energy(&inputs(0.0, 400_000.0));
        assert!((solution.throttle - 0.25).abs() < 1e-12);
        assert_eq!(solution.surplus, 0.0);
        assert_eq!(solution.effective_flops, 0.0);
    }

    #[test]
    fn test_compute_limited_by_leftover_power() {
        let mut input = inputs(0.0, 50_000.0);
        input.compute_demand = 1e20;
        let solution = solve_energy(&input);
        // 50 kW left at 1e12 FLOPS/W
        assert!((solution.effective_flops - 5e16).abs() < 1.0);
        assert!((solution.compute_draw - 50_000.0).abs() < 1e-6);
        assert_eq!(solution.throttle, 1.0);
        assert!(solution.surplus.abs() < 1e-6);
    }

    #[test]
    fn test_storage_covers_deficit_then_charges() {
        let mut input = inputs(0.0, 150_000.0);
        input.stored = 80_000.0;
        input.capacity = 100_000.0;
        let solution = solve_energy(&input);
        assert_eq!(solution.throttle, 1.0);
        assert!((solution.stored_after - 30_000.0).abs() < 1e-9);

        let mut charging = inputs(0.0, 50_000.0);
        charging.stored = 90_000.0;
        charging.capacity = 100_000.0;
        let solution = solve_energy(&charging);
        assert_eq!(solution.stored_after, 100_000.0);
        assert_eq!(solution.surplus, 40_000.0);
    }

    #[test]
    fn test_metal_throttle_rules() {
        assert_eq!(metal_throttle(10.0, 0.0, 100.0), 1.0);
        assert_eq!(metal_throttle(0.0, 50.0, 100.0), 0.5);
        assert_eq!(metal_throttle(0.0, 0.0, 100.0), 0.0);
        assert_eq!(metal_throttle(0.0, 200.0, 100.0), 1.0);
    }

    proptest! {
        #[test]
        fn prop_throttles_bounded(
            production in 0.0f64..1e12,
            non_compute in 0.0f64..1e12,
            demand in 0.0f64..1e24,
            stored in 0.0f64..1e9,
            dt in 0.0f64..10.0,
            metal in 0.0f64..1e6,
            metal_prod in 0.0f64..1e6,
            metal_demand in 0.0f64..1e6,
        ) {
            let mut input = inputs(production, non_compute);
            input.compute_demand = demand;
            input.stored = stored;
            input.capacity = 1e9;
            input.dt = dt;
            let solution = solve_energy(&input);
            prop_assert!((0.0..=1.0).contains(&solution.throttle));
            prop_assert!(solution.stored_after >= 0.0);
            prop_assert!(solution.surplus >= 0.0);
            let m = metal_throttle(metal, metal_prod, metal_demand);
            prop_assert!((0.0..=1.0).contains(&m));
        }
    }
}
