//! Player actions.
//!
//! Every action is validated in full before the state is touched, so a
//! rejected action leaves no trace. Allocations are rebuilt after every
//! successful action.

use serde::{Deserialize, Serialize};

use crate::allocation::{policy_for_request, reallocate};
use crate::construction::enable_structure;
use crate::data::{BuildingCategory, GameData, ResearchCategory};
use crate::economy::recycling_efficiency;
use crate::error::{GameError, Result};
use crate::research::{set_category_enabled, set_tier_enabled, BonusSnapshot};
use crate::state::{structure_key, GameState, TaskAllocation, TransferRecord, ZonePolicy};
use crate::transfers;

/// How a new transfer moves probes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// Move `count` probes now.
    OneTime {
        /// Probes to move.
        count: f64,
    },
    /// Move `rate` probes per day until stopped.
    Continuous {
        /// Probes per day.
        rate: f64,
    },
}

/// A player command.
///
/// JSON form is externally tagged:
///
/// ```json
/// {"purchase_structure": {"zone": "earth", "building": "probe_factory", "enabled": true}}
/// {"set_economy_slider": {"value": 80.0}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Toggle (or set) continuous construction of a building in a zone.
    PurchaseStructure {
        /// Zone id.
        zone: String,
        /// Building id.
        building: String,
        /// Explicit state; `None` toggles.
        enabled: Option<bool>,
    },
    /// Buy one probe outright.
    PurchaseProbe {
        /// Zone id.
        zone: String,
        /// Probe type id.
        probe_type: String,
    },
    /// Set a zone's policy so its tasks match the given counts.
    AllocateProbes {
        /// Zone id.
        zone: String,
        /// Requested counts.
        allocation: TaskAllocation,
    },
    /// Enable or disable a research tier.
    AllocateResearchTier {
        /// Tree id.
        tree: String,
        /// Tier state key.
        tier: String,
        /// New state.
        enabled: bool,
    },
    /// Enable or disable every tier of a category.
    ToggleResearchCategory {
        /// Category.
        category: ResearchCategory,
        /// New state.
        enabled: bool,
    },
    /// Set a factory type's output percentage.
    SetFactoryProduction {
        /// Factory building id.
        building: String,
        /// Output in 0..=100.
        percent: f64,
    },
    /// Set the Dyson/economy split.
    SetEconomySlider {
        /// 0..=100.
        value: f64,
    },
    /// Set the structure/probe split of construct power.
    SetBuildAllocation {
        /// 0..=100.
        value: f64,
    },
    /// Set the compute share of Dyson output.
    SetDysonPowerAllocation {
        /// 0..=100.
        value: f64,
    },
    /// Set the harvest/build split.
    SetMineBuildSlider {
        /// 0..=100.
        value: f64,
    },
    /// Choose the zone shown in the harvest estimate.
    SetHarvestZone {
        /// Zone id.
        zone: String,
    },
    /// Start a transfer.
    CreateTransfer {
        /// Source zone.
        from: String,
        /// Destination zone.
        to: String,
        /// One-time or continuous.
        mode: TransferMode,
    },
    /// Change a continuous transfer's rate.
    UpdateTransfer {
        /// Transfer id.
        id: u64,
        /// Probes per day.
        rate: f64,
    },
    /// Swap a transfer's endpoints.
    ReverseTransfer {
        /// Transfer id.
        id: u64,
    },
    /// Pause or resume a transfer.
    PauseTransfer {
        /// Transfer id.
        id: u64,
        /// New state.
        paused: bool,
    },
    /// Remove a transfer.
    DeleteTransfer {
        /// Transfer id.
        id: u64,
    },
    /// Tear down one structure for metal.
    RecycleFactory {
        /// Zone id.
        zone: String,
        /// Building id.
        building: String,
    },
    /// Replace a zone's policy sliders.
    SetZonePolicy {
        /// Zone id.
        zone: String,
        /// New policy.
        policy: ZonePolicy,
    },
}

impl Action {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PurchaseStructure { .. } => "purchase_structure",
            Self::PurchaseProbe { .. } => "purchase_probe",
            Self::AllocateProbes { .. } => "allocate_probes",
            Self::AllocateResearchTier { .. } => "allocate_research_tier",
            Self::ToggleResearchCategory { .. } => "toggle_research_category",
            Self::SetFactoryProduction { .. } => "set_factory_production",
            Self::SetEconomySlider { .. } => "set_economy_slider",
            Self::SetBuildAllocation { .. } => "set_build_allocation",
            Self::SetDysonPowerAllocation { .. } => "set_dyson_power_allocation",
            Self::SetMineBuildSlider { .. } => "set_mine_build_slider",
            Self::SetHarvestZone { .. } => "set_harvest_zone",
            Self::CreateTransfer { .. } => "create_transfer",
            Self::UpdateTransfer { .. } => "update_transfer",
            Self::ReverseTransfer { .. } => "reverse_transfer",
            Self::PauseTransfer { .. } => "pause_transfer",
            Self::DeleteTransfer { .. } => "delete_transfer",
            Self::RecycleFactory { .. } => "recycle_factory",
            Self::SetZonePolicy { .. } => "set_zone_policy",
        }
    }
}

/// What a successful action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Settings changed, nothing else to report.
    Applied,
    /// A construction key was switched.
    StructureToggled {
        /// Structure key.
        key: String,
        /// State after the action.
        enabled: bool,
    },
    /// A probe was bought.
    ProbePurchased {
        /// Zone id.
        zone: String,
        /// Probes in the zone afterwards.
        zone_probes: f64,
    },
    /// Tiers switched by a category toggle.
    CategoryToggled {
        /// Tiers whose state changed.
        toggled: usize,
    },
    /// A continuous transfer started.
    TransferCreated {
        /// Transfer id.
        id: u64,
    },
    /// A transfer finished or was removed.
    TransferClosed(TransferRecord),
    /// A structure was recycled.
    Recycled {
        /// Metal returned in kg.
        metal: f64,
        /// Slag produced in kg.
        slag: f64,
    },
}

fn percent(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value.clamp(0.0, 100.0))
    } else {
        Err(GameError::InvalidAllocation(format!("{what} must be finite")))
    }
}

/// Validate and apply one action.
///
/// # Errors
///
/// Returns the first validation failure; the state is unchanged on error.
pub fn apply_action(state: &mut GameState, data: &GameData, action: &Action) -> Result<ActionOutcome> {
    let outcome = dispatch(state, data, action)?;
    reallocate(state, data.rules.allocation_epsilon);
    Ok(outcome)
}

fn dispatch(state: &mut GameState, data: &GameData, action: &Action) -> Result<ActionOutcome> {
    match action {
        Action::PurchaseStructure {
            zone,
            building,
            enabled,
        } => purchase_structure(state, data, zone, building, *enabled),
        Action::PurchaseProbe { zone, probe_type } => purchase_probe(state, data, zone, probe_type),
        Action::AllocateProbes { zone, allocation } => {
            let policy = policy_for_request(
                state.zone(zone)?,
                &state.sliders,
                allocation,
                data.rules.allocation_epsilon,
            )?;
            state.zone_mut(zone)?.policy = policy;
            Ok(ActionOutcome::Applied)
        }
        Action::AllocateResearchTier {
            tree,
            tier,
            enabled,
        } => {
            set_tier_enabled(state, tree, tier, *enabled)?;
            Ok(ActionOutcome::Applied)
        }
        Action::ToggleResearchCategory { category, enabled } => Ok(ActionOutcome::CategoryToggled {
            toggled: set_category_enabled(state, data, *category, *enabled),
        }),
        Action::SetFactoryProduction {
            building,
            percent: value,
        } => {
            let factory = data
                .get_building(building)
                .ok_or_else(|| GameError::UnknownBuilding(building.clone()))?;
            if !factory.is_factory() {
                return Err(GameError::InvalidData(format!(
                    "Building '{building}' is not a factory"
                )));
            }
            let value = percent(*value, "factory production")?;
            state.factory_production.insert(building.clone(), value);
            Ok(ActionOutcome::Applied)
        }
        Action::SetEconomySlider { value } => {
            state.sliders.economy = percent(*value, "economy slider")?;
            Ok(ActionOutcome::Applied)
        }
        Action::SetBuildAllocation { value } => {
            state.sliders.build_allocation = percent(*value, "build allocation")?;
            Ok(ActionOutcome::Applied)
        }
        Action::SetDysonPowerAllocation { value } => {
            state.sliders.dyson_power_allocation = percent(*value, "Dyson power allocation")?;
            Ok(ActionOutcome::Applied)
        }
        Action::SetMineBuildSlider { value } => {
            state.sliders.mine_build = percent(*value, "mine/build slider")?;
            Ok(ActionOutcome::Applied)
        }
        Action::SetHarvestZone { zone } => {
            state.zone(zone)?;
            state.harvest_zone.clone_from(zone);
            Ok(ActionOutcome::Applied)
        }
        Action::CreateTransfer { from, to, mode } => match *mode {
            TransferMode::OneTime { count } => {
                transfers::one_time_transfer(state, &data.rules, from, to, count)
                    .map(ActionOutcome::TransferClosed)
            }
            TransferMode::Continuous { rate } => {
                transfers::create_continuous(state, &data.rules, from, to, rate)
                    .map(|id| ActionOutcome::TransferCreated { id })
            }
        },
        Action::UpdateTransfer { id, rate } => {
            transfers::update_rate(state, *id, *rate)?;
            Ok(ActionOutcome::Applied)
        }
        Action::ReverseTransfer { id } => {
            transfers::reverse(state, *id)?;
            Ok(ActionOutcome::Applied)
        }
        Action::PauseTransfer { id, paused } => {
            transfers::set_paused(state, *id, *paused)?;
            Ok(ActionOutcome::Applied)
        }
        Action::DeleteTransfer { id } => {
            transfers::delete(state, *id).map(ActionOutcome::TransferClosed)
        }
        Action::RecycleFactory { zone, building } => recycle_structure(state, data, zone, building),
        Action::SetZonePolicy { zone, policy } => {
            let mut policy = policy.clone();
            policy.replication_slider = percent(policy.replication_slider, "replication slider")?;
            policy.construct_slider = percent(policy.construct_slider, "construct slider")?;
            policy.mining_slider = policy
                .mining_slider
                .map(|v| percent(v, "mining slider"))
                .transpose()?;
            state.zone_mut(zone)?.policy = policy;
            Ok(ActionOutcome::Applied)
        }
    }
}

fn purchase_structure(
    state: &mut GameState,
    data: &GameData,
    zone_id: &str,
    building_id: &str,
    enabled: Option<bool>,
) -> Result<ActionOutcome> {
    let zone = state.zone(zone_id)?;
    let building = data
        .get_building(building_id)
        .ok_or_else(|| GameError::UnknownBuilding(building_id.to_string()))?;

    let not_allowed = || GameError::BuildingNotAllowed {
        building: building_id.to_string(),
        zone: zone_id.to_string(),
    };
    if !building.allowed_in(zone_id, zone.is_dyson_zone) {
        return Err(not_allowed());
    }
    if zone.is_dyson_zone && building.category == BuildingCategory::Mining {
        return Err(not_allowed());
    }

    let key = structure_key(zone_id, building_id);
    let enable = enabled.unwrap_or(!state.enabled_construction.contains(&key));
    if enable {
        if let Some(missing) = building
            .prerequisites
            .iter()
            .find(|prereq| zone.structure_count(prereq) == 0)
        {
            return Err(GameError::PrerequisiteNotMet {
                target: building_id.to_string(),
                prerequisite: missing.clone(),
            });
        }
    }

    enable_structure(state, zone_id, building_id, enable);
    Ok(ActionOutcome::StructureToggled {
        key,
        enabled: enable,
    })
}

fn purchase_probe(
    state: &mut GameState,
    data: &GameData,
    zone_id: &str,
    probe_type: &str,
) -> Result<ActionOutcome> {
    let zone = state.zone(zone_id)?;
    let probe = data
        .get_probe(probe_type)
        .ok_or_else(|| GameError::UnknownProbeType(probe_type.to_string()))?;

    if let Some(missing) = probe
        .prerequisites
        .iter()
        .find(|prereq| zone.structure_count(prereq) == 0)
    {
        return Err(GameError::PrerequisiteNotMet {
            target: probe_type.to_string(),
            prerequisite: missing.clone(),
        });
    }

    let resources = &state.resources;
    if resources.metal < probe.base_cost_metal {
        return Err(GameError::InsufficientResources {
            resource: "metal".to_string(),
            required: probe.base_cost_metal,
            available: resources.metal,
        });
    }
    if resources.energy < probe.base_cost_energy {
        return Err(GameError::InsufficientResources {
            resource: "energy".to_string(),
            required: probe.base_cost_energy,
            available: resources.energy,
        });
    }

    state.resources.metal -= probe.base_cost_metal;
    state.resources.energy -= probe.base_cost_energy;
    let zone = state.zone_mut(zone_id)?;
    zone.probes += 1.0;
    Ok(ActionOutcome::ProbePurchased {
        zone: zone_id.to_string(),
        zone_probes: zone.probes,
    })
}

fn recycle_structure(
    state: &mut GameState,
    data: &GameData,
    zone_id: &str,
    building_id: &str,
) -> Result<ActionOutcome> {
    let building = data
        .get_building(building_id)
        .ok_or_else(|| GameError::UnknownBuilding(building_id.to_string()))?;
    if state.zone(zone_id)?.structure_count(building_id) == 0 {
        return Err(GameError::StructureNotFound {
            zone: zone_id.to_string(),
            building: building_id.to_string(),
        });
    }

    let efficiency = recycling_efficiency(data, &BonusSnapshot::capture(state, data));
    let metal = building.base_cost_metal * efficiency;
    let slag = building.base_cost_metal - metal;

    let zone = state.zone_mut(zone_id)?;
    if let Some(count) = zone.structures.get_mut(building_id) {
        *count -= 1;
        if *count == 0 {
            zone.structures.remove(building_id);
        }
    }
    zone.slag_produced += slag;
    state.resources.metal += metal;
    state.resources.slag += slag;
    Ok(ActionOutcome::Recycled { metal, slag })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GameData, GameState) {
        let data = GameData::solar_system().expect("built-in data");
        let state = GameState::new(&data);
        (data, state)
    }

    #[test]
    fn test_purchase_structure_toggles() {
        let (data, mut state) = setup();
        let action = Action::PurchaseStructure {
            zone: "earth".to_string(),
            building: "probe_factory".to_string(),
            enabled: None,
        };
        let outcome = apply_action(&mut state, &data, &action).unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::StructureToggled {
                key: "earth_probe_factory".to_string(),
                enabled: true
            }
        );
        apply_action(&mut state, &data, &action).unwrap();
        assert!(state.enabled_construction.is_empty());
    }

    #[test]
    fn test_purchase_structure_validation() {
        let (data, mut state) = setup();

        let mining_in_dyson = Action::PurchaseStructure {
            zone: "dyson_sphere".to_string(),
            building: "basic_mining_station".to_string(),
            enabled: Some(true),
        };
        assert!(matches!(
            apply_action(&mut state, &data, &mining_in_dyson),
            Err(GameError::BuildingNotAllowed { .. })
        ));

        state.zones.get_mut("earth").unwrap().structures.clear();
        let factory = Action::PurchaseStructure {
            zone: "earth".to_string(),
            building: "probe_factory".to_string(),
            enabled: Some(true),
        };
        assert!(matches!(
            apply_action(&mut state, &data, &factory),
            Err(GameError::PrerequisiteNotMet { .. })
        ));
        assert!(state.enabled_construction.is_empty());

        let unknown = Action::PurchaseStructure {
            zone: "pluto".to_string(),
            building: "probe_factory".to_string(),
            enabled: None,
        };
        assert!(matches!(
            apply_action(&mut state, &data, &unknown),
            Err(GameError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_structure_prerequisites_are_per_zone() {
        let (data, mut state) = setup();
        assert_eq!(state.zones["earth"].structure_count("basic_mining_station"), 1);

        let mars_factory = Action::PurchaseStructure {
            zone: "mars".to_string(),
            building: "probe_factory".to_string(),
            enabled: Some(true),
        };
        assert!(matches!(
            apply_action(&mut state, &data, &mars_factory),
            Err(GameError::PrerequisiteNotMet { ref prerequisite, .. })
                if prerequisite == "basic_mining_station"
        ));
        assert!(state.enabled_construction.is_empty());

        state
            .zones
            .get_mut("mars")
            .unwrap()
            .structures
            .insert("basic_mining_station".to_string(), 1);
        apply_action(&mut state, &data, &mars_factory).unwrap();
        assert!(state.enabled_construction.contains("mars_probe_factory"));
    }

    #[test]
    fn test_purchase_probe_costs_metal() {
        let (data, mut state) = setup();
        let action = Action::PurchaseProbe {
            zone: "earth".to_string(),
            probe_type: "probe".to_string(),
        };
        let outcome = apply_action(&mut state, &data, &action).unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::ProbePurchased {
                zone: "earth".to_string(),
                zone_probes: 2.0
            }
        );
        assert_eq!(state.resources.metal, 900.0);

        state.resources.metal = 50.0;
        assert!(matches!(
            apply_action(&mut state, &data, &action),
            Err(GameError::InsufficientResources { .. })
        ));
        assert_eq!(state.zones["earth"].probes, 2.0);
    }

    #[test]
    fn test_sliders_clamped_and_reallocated() {
        let (data, mut state) = setup();
        apply_action(&mut state, &data, &Action::SetEconomySlider { value: 250.0 }).unwrap();
        assert_eq!(state.sliders.economy, 100.0);
        assert_eq!(state.allocations["earth"].dyson, 0.0);

        apply_action(&mut state, &data, &Action::SetEconomySlider { value: -5.0 }).unwrap();
        assert_eq!(state.sliders.economy, 0.0);
        assert!((state.allocations["earth"].dyson - 1.0).abs() < 1e-12);

        assert!(apply_action(&mut state, &data, &Action::SetMineBuildSlider { value: f64::NAN }).is_err());
    }

    #[test]
    fn test_recycle_returns_metal_and_slag() {
        let (data, mut state) = setup();
        let action = Action::RecycleFactory {
            zone: "earth".to_string(),
            building: "basic_mining_station".to_string(),
        };
        let outcome = apply_action(&mut state, &data, &action).unwrap();
        assert_eq!(outcome, ActionOutcome::Recycled { metal: 750.0, slag: 250.0 });
        assert_eq!(state.resources.metal, 1750.0);
        assert_eq!(state.resources.slag, 250.0);
        assert_eq!(state.zones["earth"].structure_count("basic_mining_station"), 0);

        assert!(matches!(
            apply_action(&mut state, &data, &action),
            Err(GameError::StructureNotFound { .. })
        ));
    }

    #[test]
    fn test_factory_production_clamped() {
        let (data, mut state) = setup();
        let action = Action::SetFactoryProduction {
            building: "probe_factory".to_string(),
            percent: 150.0,
        };
        apply_action(&mut state, &data, &action).unwrap();
        assert_eq!(state.factory_percent("probe_factory"), 100.0);

        let not_factory = Action::SetFactoryProduction {
            building: "battery_bank".to_string(),
            percent: 50.0,
        };
        assert!(apply_action(&mut state, &data, &not_factory).is_err());
    }

    #[test]
    fn test_harvest_zone_must_exist() {
        let (data, mut state) = setup();
        apply_action(
            &mut state,
            &data,
            &Action::SetHarvestZone {
                zone: "mars".to_string(),
            },
        )
        .unwrap();
        assert_eq!(state.harvest_zone, "mars");
        assert!(apply_action(
            &mut state,
            &data,
            &Action::SetHarvestZone {
                zone: "vulcan".to_string()
            }
        )
        .is_err());
        assert_eq!(state.harvest_zone, "mars");
    }

    #[test]
    fn test_category_toggle_counts() {
        let (data, mut state) = setup();
        let action = Action::ToggleResearchCategory {
            category: ResearchCategory::Intelligence,
            enabled: true,
        };
        assert_eq!(
            apply_action(&mut state, &data, &action).unwrap(),
            ActionOutcome::CategoryToggled { toggled: 5 }
        );
        assert_eq!(
            apply_action(&mut state, &data, &action).unwrap(),
            ActionOutcome::CategoryToggled { toggled: 0 }
        );
    }

    #[test]
    fn test_action_json_shape() {
        let action = Action::CreateTransfer {
            from: "earth".to_string(),
            to: "mars".to_string(),
            mode: TransferMode::Continuous { rate: 2.0 },
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.starts_with("{\"create_transfer\""));
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);

        let bytes = bincode::serialize(&action).unwrap();
        let back: Action = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, action);
    }
}
