//! Mutable economy state.
//!
//! [`GameState`] is the single serializable root of everything that changes
//! during play. Every map is ordered so iteration, hashing and serialization
//! are deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::data::{GameData, ZoneData};
use crate::error::{GameError, Result};

// ============================================================================
// Progress keys
// ============================================================================

/// Progress key for manual probe replication in a zone.
#[must_use]
pub fn probe_key(zone_id: &str) -> String {
    format!("{zone_id}_probe")
}

/// Progress key for factory probe output in a zone.
#[must_use]
pub fn factory_key(zone_id: &str) -> String {
    format!("{zone_id}_factory")
}

/// Progress key for a structure in a zone.
#[must_use]
pub fn structure_key(zone_id: &str, building_id: &str) -> String {
    format!("{zone_id}_{building_id}")
}

/// Split a structure key back into `(zone, building)` using known ids.
///
/// Both zone and building ids may contain underscores, so the split is
/// resolved against the static data rather than by position.
#[must_use]
pub fn split_structure_key<'a>(key: &str, data: &'a GameData) -> Option<(&'a str, &'a str)> {
    data.zones.iter().find_map(|zone| {
        let rest = key.strip_prefix(zone.id.as_str())?.strip_prefix('_')?;
        data.get_building(rest)
            .map(|building| (zone.id.as_str(), building.id.as_str()))
    })
}

// ============================================================================
// Resources
// ============================================================================

/// Global resource scalars. All are non-negative after every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// Unconsumed power budget of the last tick, in W.
    pub energy: f64,
    /// Energy held in storage buildings, in W-days.
    pub energy_stored: f64,
    /// Stored metal in kg.
    pub metal: f64,
    /// Effective compute of the last tick, in FLOPS.
    pub intelligence: f64,
    /// Total probe dexterity.
    pub dexterity: f64,
    /// Stored slag in kg.
    pub slag: f64,
}

// ============================================================================
// Zones
// ============================================================================

/// Per-zone policy sliders (percentages in 0..=100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZonePolicy {
    /// Share of economy probes that harvest. `None` follows the global
    /// mine/build slider.
    pub mining_slider: Option<f64>,
    /// Share of build probes that replicate rather than construct.
    pub replication_slider: f64,
    /// Dyson zone only: share of Dyson-task probes building the sphere.
    pub construct_slider: f64,
}

impl Default for ZonePolicy {
    fn default() -> Self {
        Self {
            mining_slider: None,
            replication_slider: 100.0,
            construct_slider: 90.0,
        }
    }
}

/// Live state of an orbital zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    /// Zone identifier.
    pub id: String,
    /// Whether this is the Dyson ring.
    pub is_dyson_zone: bool,
    /// Fraction of mined mass that is metal.
    pub metal_percentage: f64,
    /// Harvest speed multiplier.
    pub mining_rate_multiplier: f64,
    /// Harvesting and transfer difficulty.
    pub delta_v_penalty: f64,
    /// Orbital radius in AU.
    pub radius_au: f64,
    /// Extractable metal left, in kg.
    pub metal_remaining: f64,
    /// Total mass left, in kg.
    pub mass_remaining: f64,
    /// Cumulative slag produced here, in kg.
    pub slag_produced: f64,
    /// Fungible probe count.
    pub probes: f64,
    /// Completed structures by building id.
    pub structures: BTreeMap<String, u32>,
    /// Policy sliders.
    pub policy: ZonePolicy,
}

impl Zone {
    /// Create a fresh zone from static data.
    #[must_use]
    pub fn from_data(data: &ZoneData) -> Self {
        let mut zone = Self {
            id: data.id.clone(),
            metal_remaining: data.metal_stores_kg.max(0.0),
            mass_remaining: data.total_mass_kg.max(data.metal_stores_kg).max(0.0),
            ..Self::default()
        };
        zone.refresh_static(data);
        zone
    }

    /// Overwrite the static fields from data, keeping stocks and probes.
    pub fn refresh_static(&mut self, data: &ZoneData) {
        self.is_dyson_zone = data.is_dyson_zone;
        self.metal_percentage = data.metal_percentage;
        self.mining_rate_multiplier = data.mining_rate_multiplier;
        self.delta_v_penalty = data.delta_v_penalty;
        self.radius_au = data.radius_au;
    }

    /// True once no extractable metal remains.
    #[must_use]
    pub fn depleted(&self) -> bool {
        self.metal_remaining <= 0.0
    }

    /// Number of completed structures of a type.
    #[must_use]
    pub fn structure_count(&self, building_id: &str) -> u32 {
        self.structures.get(building_id).copied().unwrap_or(0)
    }
}

// ============================================================================
// Sliders and allocations
// ============================================================================

/// Global policy sliders (percentages in 0..=100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sliders {
    /// 0 sends every probe to Dyson tasks, 100 keeps all in the economy.
    pub economy: f64,
    /// 0 is all harvest, 100 is all build, within the economy share.
    pub mine_build: f64,
    /// Share of construct power diverted from structures to probes.
    pub build_allocation: f64,
    /// Share of Dyson output routed to compute instead of the grid.
    pub dyson_power_allocation: f64,
}

impl Default for Sliders {
    fn default() -> Self {
        Self {
            economy: 67.0,
            mine_build: 50.0,
            build_allocation: 0.0,
            dyson_power_allocation: 50.0,
        }
    }
}

/// Probes assigned to each task in one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskAllocation {
    /// Harvesting metal.
    pub harvest: f64,
    /// Building structures.
    pub construct: f64,
    /// Building probes.
    pub replicate: f64,
    /// Building or feeding the Dyson sphere.
    pub dyson: f64,
}

impl TaskAllocation {
    /// Sum over all tasks.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.harvest + self.construct + self.replicate + self.dyson
    }

    /// Multiply every task by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            harvest: self.harvest * factor,
            construct: self.construct * factor,
            replicate: self.replicate * factor,
            dyson: self.dyson * factor,
        }
    }
}

// ============================================================================
// Research, Dyson sphere, transfers
// ============================================================================

/// Progress of one research tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierState {
    /// Completed tranches, never decreasing.
    pub tranches_completed: u32,
    /// Cumulative compute invested, in FLOP-days.
    pub progress: f64,
    /// Player toggle.
    pub enabled: bool,
}

/// The Dyson sphere under construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DysonSphere {
    /// Assembled mass in kg.
    pub mass: f64,
    /// Effective target mass in kg.
    pub target_mass: f64,
}

impl DysonSphere {
    /// True once the target mass is reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.target_mass > 0.0 && self.mass >= self.target_mass
    }
}

/// Whether a continuous transfer runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Moving probes every tick.
    #[default]
    Active,
    /// Suspended by the player.
    Paused,
}

/// A continuous probe transfer between zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    /// Transfer identifier.
    pub id: u64,
    /// Source zone.
    pub from: String,
    /// Destination zone.
    pub to: String,
    /// Probes per day.
    pub rate: f64,
    /// Energy cost of moving one probe.
    pub energy_per_probe: f64,
    /// Active or paused.
    pub status: TransferStatus,
    /// Probes moved so far.
    #[serde(default)]
    pub probes_moved: f64,
}

/// How a transfer left the active list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// One-time transfer that moved all its probes.
    Completed,
    /// Removed by the player.
    Deleted,
    /// Removed because its source ran out of probes.
    AutoRemoved,
}

/// Terminal record of a finished transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Transfer identifier.
    pub id: u64,
    /// Source zone.
    pub from: String,
    /// Destination zone.
    pub to: String,
    /// Probes moved over the transfer's lifetime.
    pub probes_moved: f64,
    /// Terminal outcome.
    pub outcome: TransferOutcome,
    /// Tick the record was written.
    pub tick: u64,
}

// ============================================================================
// Game state
// ============================================================================

/// Root of all mutable economy state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    /// Ticks simulated.
    pub tick: u64,
    /// Simulated days elapsed.
    pub time: f64,
    /// Global resource scalars.
    pub resources: Resources,
    /// Zones by id.
    pub zones: BTreeMap<String, Zone>,
    /// Global policy sliders.
    pub sliders: Sliders,
    /// Zone used for the display-only harvest estimate.
    pub harvest_zone: String,
    /// Cached task allocation per zone, derived from the sliders.
    pub allocations: BTreeMap<String, TaskAllocation>,
    /// Probe construction progress in kg (`{zone}_probe`, `{zone}_factory`).
    pub probe_progress: BTreeMap<String, f64>,
    /// Structure construction progress in kg (`{zone}_{building}`).
    pub structure_progress: BTreeMap<String, f64>,
    /// Structure keys under continuous construction.
    pub enabled_construction: BTreeSet<String>,
    /// Factory output percentage by building id (missing means 100).
    pub factory_production: BTreeMap<String, f64>,
    /// Research tiers by tree id, then tier key.
    pub research: BTreeMap<String, BTreeMap<String, TierState>>,
    /// The Dyson sphere.
    pub dyson: DysonSphere,
    /// Active continuous transfers, ordered by id.
    pub transfers: Vec<Transfer>,
    /// Next transfer id to hand out.
    pub next_transfer_id: u64,
    /// Finished transfers.
    pub transfer_history: Vec<TransferRecord>,
}

impl GameState {
    /// Build the initial state of a new game.
    #[must_use]
    pub fn new(data: &GameData) -> Self {
        let start = &data.rules.starting;
        let mut state = Self {
            resources: Resources {
                energy: start.energy.max(0.0),
                metal: start.metal.max(0.0),
                ..Resources::default()
            },
            harvest_zone: start.zone.clone(),
            next_transfer_id: 1,
            ..Self::default()
        };

        for zone_data in &data.zones {
            state
                .zones
                .insert(zone_data.id.clone(), Zone::from_data(zone_data));
        }

        if let Some(zone) = state.zones.get_mut(&start.zone) {
            zone.probes = start.probes.max(0.0);
            zone.structures = start.structures.clone();
        }

        state.ensure_research(data);
        state.dyson.target_mass = data.rules.dyson_target_mass;
        state
    }

    /// Insert default tier state for every tier the data defines.
    pub fn ensure_research(&mut self, data: &GameData) {
        for tree in &data.research_trees {
            let tiers = self.research.entry(tree.id.clone()).or_default();
            for (key, _) in tree.tier_entries() {
                tiers.entry(key).or_default();
            }
        }
    }

    /// Look up a zone.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownZone`] if the zone does not exist.
    pub fn zone(&self, id: &str) -> Result<&Zone> {
        self.zones
            .get(id)
            .ok_or_else(|| GameError::UnknownZone(id.to_string()))
    }

    /// Look up a zone mutably.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::UnknownZone`] if the zone does not exist.
    pub fn zone_mut(&mut self, id: &str) -> Result<&mut Zone> {
        self.zones
            .get_mut(id)
            .ok_or_else(|| GameError::UnknownZone(id.to_string()))
    }

    /// Total probes across all zones.
    #[must_use]
    pub fn total_probes(&self) -> f64 {
        self.zones.values().map(|z| z.probes).sum()
    }

    /// Factory output percentage for a building type.
    #[must_use]
    pub fn factory_percent(&self, building_id: &str) -> f64 {
        self.factory_production
            .get(building_id)
            .copied()
            .unwrap_or(100.0)
            .clamp(0.0, 100.0)
    }

    /// Tier state by tree and key.
    #[must_use]
    pub fn tier(&self, tree_id: &str, key: &str) -> Option<&TierState> {
        self.research.get(tree_id).and_then(|t| t.get(key))
    }

    /// Whether a zone has structure work (enabled or in-flight keys).
    #[must_use]
    pub fn zone_has_structure_work(&self, zone_id: &str) -> bool {
        let prefix = format!("{zone_id}_");
        self.enabled_construction
            .iter()
            .any(|key| key.starts_with(&prefix))
            || self
                .structure_progress
                .iter()
                .any(|(key, progress)| *progress > 0.0 && key.starts_with(&prefix))
    }

    /// Feed every field into a hasher in canonical order.
    ///
    /// Floats are hashed through their bit patterns.
    pub fn hash_into<H: Hasher>(&self, hasher: &mut H) {
        self.tick.hash(hasher);
        self.time.to_bits().hash(hasher);

        let r = &self.resources;
        for value in [
            r.energy,
            r.energy_stored,
            r.metal,
            r.intelligence,
            r.dexterity,
            r.slag,
        ] {
            value.to_bits().hash(hasher);
        }

        self.zones.len().hash(hasher);
        for (id, zone) in &self.zones {
            id.hash(hasher);
            zone.metal_remaining.to_bits().hash(hasher);
            zone.mass_remaining.to_bits().hash(hasher);
            zone.slag_produced.to_bits().hash(hasher);
            zone.probes.to_bits().hash(hasher);
            zone.structures.hash(hasher);
            zone.policy.mining_slider.map(f64::to_bits).hash(hasher);
            zone.policy.replication_slider.to_bits().hash(hasher);
            zone.policy.construct_slider.to_bits().hash(hasher);
        }

        let s = &self.sliders;
        for value in [
            s.economy,
            s.mine_build,
            s.build_allocation,
            s.dyson_power_allocation,
        ] {
            value.to_bits().hash(hasher);
        }
        self.harvest_zone.hash(hasher);

        for map in [&self.probe_progress, &self.structure_progress] {
            map.len().hash(hasher);
            for (key, value) in map {
                key.hash(hasher);
                value.to_bits().hash(hasher);
            }
        }
        self.enabled_construction.hash(hasher);
        for (key, value) in &self.factory_production {
            key.hash(hasher);
            value.to_bits().hash(hasher);
        }

        for (tree, tiers) in &self.research {
            tree.hash(hasher);
            for (key, tier) in tiers {
                key.hash(hasher);
                tier.tranches_completed.hash(hasher);
                tier.progress.to_bits().hash(hasher);
                tier.enabled.hash(hasher);
            }
        }

        self.dyson.mass.to_bits().hash(hasher);
        self.dyson.target_mass.to_bits().hash(hasher);

        self.next_transfer_id.hash(hasher);
        for transfer in &self.transfers {
            transfer.id.hash(hasher);
            transfer.from.hash(hasher);
            transfer.to.hash(hasher);
            transfer.rate.to_bits().hash(hasher);
            transfer.status.hash(hasher);
            transfer.probes_moved.to_bits().hash(hasher);
        }
        self.transfer_history.len().hash(hasher);
    }
}
