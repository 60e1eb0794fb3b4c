//! Proptest strategies.
//!
//! Generate random but reproducible sliders, actions and tick counts for
//! property-based tests of the economy.

use dyson_core::prelude::*;
use proptest::prelude::*;

/// Zones in the bundled data set.
pub const ZONES: [&str; 8] = [
    "dyson_sphere",
    "mercury",
    "venus",
    "earth",
    "mars",
    "asteroid_belt",
    "jupiter",
    "saturn",
];

/// Buildings in the bundled data set.
pub const BUILDINGS: [&str; 6] = [
    "solar_array_basic",
    "basic_mining_station",
    "probe_factory",
    "battery_bank",
    "mass_energy_converter",
    "orbital_data_center",
];

/// Any zone id.
pub fn arb_zone() -> impl Strategy<Value = String> {
    prop::sample::select(ZONES.to_vec()).prop_map(str::to_string)
}

/// Any building id.
pub fn arb_building() -> impl Strategy<Value = String> {
    prop::sample::select(BUILDINGS.to_vec()).prop_map(str::to_string)
}

/// Slider value, including values outside 0..=100 that must be clamped.
pub fn arb_slider() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => 0.0f64..=100.0,
        1 => -50.0f64..0.0,
        1 => 100.0f64..200.0,
    ]
}

/// Number of ticks to simulate.
pub fn arb_tick_count() -> impl Strategy<Value = u64> {
    1u64..200
}

/// Research category.
pub fn arb_category() -> impl Strategy<Value = ResearchCategory> {
    prop_oneof![
        Just(ResearchCategory::Energy),
        Just(ResearchCategory::Dexterity),
        Just(ResearchCategory::Intelligence),
    ]
}

/// Any slider action.
pub fn arb_slider_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        arb_slider().prop_map(|value| Action::SetEconomySlider { value }),
        arb_slider().prop_map(|value| Action::SetMineBuildSlider { value }),
        arb_slider().prop_map(|value| Action::SetBuildAllocation { value }),
        arb_slider().prop_map(|value| Action::SetDysonPowerAllocation { value }),
    ]
}

/// Construction, probe and research actions.
pub fn arb_build_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (arb_zone(), arb_building(), prop::option::of(any::<bool>())).prop_map(
            |(zone, building, enabled)| Action::PurchaseStructure {
                zone,
                building,
                enabled,
            }
        ),
        arb_zone().prop_map(|zone| Action::PurchaseProbe {
            zone,
            probe_type: "probe".to_string(),
        }),
        (arb_category(), any::<bool>())
            .prop_map(|(category, enabled)| Action::ToggleResearchCategory { category, enabled }),
        (arb_zone(), arb_building())
            .prop_map(|(zone, building)| Action::RecycleFactory { zone, building }),
        arb_slider().prop_map(|percent| Action::SetFactoryProduction {
            building: "probe_factory".to_string(),
            percent,
        }),
    ]
}

/// Transfer actions. Ids are small so some hit live transfers.
pub fn arb_transfer_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (arb_zone(), arb_zone(), 0.1f64..5.0).prop_map(|(from, to, rate)| Action::CreateTransfer {
            from,
            to,
            mode: TransferMode::Continuous { rate },
        }),
        (arb_zone(), arb_zone(), 1.0f64..3.0).prop_map(|(from, to, count)| Action::CreateTransfer {
            from,
            to,
            mode: TransferMode::OneTime { count },
        }),
        (1u64..4, 0.1f64..5.0).prop_map(|(id, rate)| Action::UpdateTransfer { id, rate }),
        (1u64..4).prop_map(|id| Action::ReverseTransfer { id }),
        (1u64..4, any::<bool>()).prop_map(|(id, paused)| Action::PauseTransfer { id, paused }),
        (1u64..4).prop_map(|id| Action::DeleteTransfer { id }),
    ]
}

/// Zone policy and harvest-zone actions.
pub fn arb_zone_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (arb_zone(), arb_slider(), arb_slider()).prop_map(|(zone, replication, construct)| {
            Action::SetZonePolicy {
                zone,
                policy: ZonePolicy {
                    mining_slider: None,
                    replication_slider: replication,
                    construct_slider: construct,
                },
            }
        }),
        arb_zone().prop_map(|zone| Action::SetHarvestZone { zone }),
    ]
}

/// Any action. Some will be rejected by validation, which is intended.
pub fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => arb_slider_action(),
        2 => arb_build_action(),
        2 => arb_transfer_action(),
        1 => arb_zone_action(),
    ]
}

/// Sequence of up to `max_len` actions.
pub fn arb_action_sequence(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
    prop::collection::vec(arb_action(), 0..max_len)
}
