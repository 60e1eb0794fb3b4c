//! Scenario loading and configuration.
//!
//! Scenarios describe a starting economy for headless runs: which data set
//! to load, stock overrides, per-zone probes and structures, and a list of
//! actions applied before the first tick.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use dyson_core::actions::Action;
use dyson_core::data::GameData;
use dyson_core::error::GameError;
use dyson_core::simulation::{SimConfig, Simulation};
use dyson_core::state::GameState;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The engine rejected the scenario setup.
    #[error("Invalid scenario: {0}")]
    Game(#[from] GameError),
}

/// Starting overrides for one zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSetup {
    /// Probe count, replacing the data default.
    pub probes: Option<f64>,
    /// Completed structures added to the zone.
    pub structures: BTreeMap<String, u32>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// RON game data file; the built-in solar system when absent.
    pub data: Option<String>,
    /// Simulated days per tick.
    pub delta_time: f64,
    /// Starting metal override in kg.
    pub metal: Option<f64>,
    /// Starting energy override in W.
    pub energy: Option<f64>,
    /// Per-zone overrides.
    pub zones: BTreeMap<String, ZoneSetup>,
    /// Actions applied in order before the first tick.
    pub actions: Vec<Action>,
    /// Suggested run length for batch commands.
    pub ticks: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::earth_start()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A fresh game: the data set's own starting conditions, one day per
    /// tick.
    #[must_use]
    pub fn earth_start() -> Self {
        Self {
            name: "Earth Start".to_string(),
            description: "One probe on Earth with the default starting structures".to_string(),
            data: None,
            delta_time: 1.0,
            metal: None,
            energy: None,
            zones: BTreeMap::new(),
            actions: Vec::new(),
            ticks: 365,
        }
    }

    /// The game data this scenario runs on.
    pub fn game_data(&self) -> Result<GameData, ScenarioError> {
        match &self.data {
            Some(path) => {
                let path = Path::new(path);
                if !path.exists() {
                    return Err(ScenarioError::FileNotFound(path.display().to_string()));
                }
                let source = std::fs::read_to_string(path)?;
                Ok(GameData::from_ron_str(&path.display().to_string(), &source)?)
            }
            None => Ok(GameData::solar_system()?),
        }
    }

    /// Build the starting simulation.
    ///
    /// Fails if a zone or building is unknown, or a setup action is
    /// rejected.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let data = self.game_data()?;
        let mut state = GameState::new(&data);

        if let Some(metal) = self.metal {
            state.resources.metal = metal.max(0.0);
        }
        if let Some(energy) = self.energy {
            state.resources.energy = energy.max(0.0);
        }

        for (zone_id, setup) in &self.zones {
            let zone = state.zone_mut(zone_id)?;
            if let Some(probes) = setup.probes {
                zone.probes = probes.max(0.0);
            }
            for (building_id, &count) in &setup.structures {
                if data.get_building(building_id).is_none() {
                    return Err(GameError::UnknownBuilding(building_id.clone()).into());
                }
                *zone.structures.entry(building_id.clone()).or_insert(0) += count;
            }
        }

        let config = SimConfig {
            delta_time: self.delta_time,
        };
        let mut sim = Simulation::from_state(data, state, config);
        for action in &self.actions {
            sim.apply_action(action.clone())?;
        }

        tracing::info!(
            scenario = %self.name,
            zones = self.zones.len(),
            actions = self.actions.len(),
            "Scenario built"
        );
        Ok(sim)
    }
}
