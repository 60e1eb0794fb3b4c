//! Load-time migration of JSON saves.
//!
//! Older saves tracked several probe types, kept structures in global maps
//! and stored every field flat at the root (`metal`, `probes_by_zone`,
//! `zone_metal_remaining`, `economy_slider`, ...). Everything is folded into
//! the per-zone representation once, on load; the tick loop only ever sees
//! canonical state.

use serde_json::{Map, Value};

use crate::allocation::reallocate;
use crate::data::GameData;
use crate::error::{GameError, Result};
use crate::state::{probe_key, split_structure_key, structure_key, GameState, Zone};

/// Probe type keys used by older saves. All are folded into one count.
pub const LEGACY_PROBE_TYPES: [&str; 5] = [
    "probe",
    "miner_probe",
    "compute_probe",
    "energy_probe",
    "construction_probe",
];

/// Flat resource scalars and their field in `resources`. Dexterity is
/// recomputed every tick and is not read back.
const LEGACY_RESOURCES: [&str; 5] = ["energy", "energy_stored", "metal", "intelligence", "slag"];

/// Flat slider fields and their field in `sliders`.
const LEGACY_SLIDERS: [(&str, &str); 4] = [
    ("economy_slider", "economy"),
    ("mine_build_slider", "mine_build"),
    ("build_allocation", "build_allocation"),
    ("dyson_power_allocation", "dyson_power_allocation"),
];

/// Flat per-zone stock maps and their field on each zone.
const LEGACY_ZONE_STOCKS: [(&str, &str); 3] = [
    ("zone_metal_remaining", "metal_remaining"),
    ("zone_mass_remaining", "mass_remaining"),
    ("zone_slag_produced", "slag_produced"),
];

fn probe_total(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0).max(0.0),
        Value::Object(map) => LEGACY_PROBE_TYPES
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(Value::as_f64)
            .map(|v| v.max(0.0))
            .sum(),
        _ => 0.0,
    }
}

fn structure_count(value: &Value) -> u32 {
    let count = value.as_f64().unwrap_or(0.0).round();
    // Clamped to the u32 range first
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = count.clamp(0.0, f64::from(u32::MAX)) as u32;
    whole
}

fn canonical_structures(map: &Map<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(building, count)| (building.clone(), Value::from(structure_count(count))))
            .collect(),
    )
}

/// Set `root.<path>` to `value` unless the save already has it.
///
/// Missing parents are created; a parent that is not an object is left
/// alone and the value dropped.
fn fill(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut map = root;
    for key in parents {
        let Some(next) = map
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
        else {
            return;
        };
        map = next;
    }
    map.entry((*last).to_string()).or_insert(value);
}

/// Canonical progress key for a legacy structure key.
///
/// Flat saves keyed progress by bare building id; that work belonged to the
/// start zone.
fn structure_progress_key(key: &str, data: &GameData) -> Option<String> {
    if split_structure_key(key, data).is_some() {
        return Some(key.to_string());
    }
    data.get_building(key)
        .map(|building| structure_key(&data.rules.starting.zone, &building.id))
}

fn legacy_policy(policy: &Map<String, Value>, is_dyson_zone: bool) -> Value {
    let mut canonical = Map::new();
    if let Some(replication) = policy.get("replication_slider") {
        canonical.insert("replication_slider".to_string(), replication.clone());
    }
    if is_dyson_zone {
        if let Some(construct) = policy.get("dyson_build_slider") {
            canonical.insert("construct_slider".to_string(), construct.clone());
        }
    } else if let Some(mining) = policy.get("mining_slider") {
        canonical.insert("mining_slider".to_string(), mining.clone());
    }
    Value::Object(canonical)
}

/// Fold the flat root-level layout into canonical fields.
///
/// Returns how many legacy fields were found.
fn migrate_flat_fields(root: &mut Map<String, Value>, data: &GameData) -> usize {
    let mut migrated = 0;

    for key in LEGACY_RESOURCES {
        if let Some(value) = root.remove(key) {
            fill(root, &["resources", key], value);
            migrated += 1;
        }
    }
    for (legacy, field) in LEGACY_SLIDERS {
        if let Some(value) = root.remove(legacy) {
            fill(root, &["sliders", field], value);
            migrated += 1;
        }
    }
    if let Some(mass) = root.remove("dyson_sphere_mass") {
        fill(root, &["dyson", "mass"], mass);
        migrated += 1;
    }

    for (legacy, field) in LEGACY_ZONE_STOCKS {
        let Some(Value::Object(stocks)) = root.remove(legacy) else {
            continue;
        };
        migrated += 1;
        for (zone_id, value) in stocks {
            if data.get_zone(&zone_id).is_some() {
                fill(root, &["zones", zone_id.as_str(), field], value);
            } else {
                tracing::warn!(zone = %zone_id, field, "Dropping legacy stock for unknown zone");
            }
        }
    }

    if let Some(Value::Object(by_zone)) = root.remove("probes_by_zone") {
        migrated += 1;
        for (zone_id, probes) in &by_zone {
            if data.get_zone(zone_id).is_some() {
                fill(root, &["zones", zone_id.as_str(), "probes"], Value::from(probe_total(probes)));
            } else {
                tracing::warn!(zone = %zone_id, "Dropping legacy probes for unknown zone");
            }
        }
    }

    if let Some(Value::Object(policies)) = root.remove("zone_policies") {
        migrated += 1;
        for (zone_id, policy) in &policies {
            let (Some(zone_data), Value::Object(policy)) = (data.get_zone(zone_id), policy) else {
                continue;
            };
            let canonical = legacy_policy(policy, zone_data.is_dyson_zone);
            fill(root, &["zones", zone_id.as_str(), "policy"], canonical);
        }
    }

    if let Some(Value::Object(progress)) = root.remove("zone_replication_progress") {
        migrated += 1;
        for (zone_id, by_type) in &progress {
            if data.get_zone(zone_id).is_some() {
                let key = probe_key(zone_id);
                fill(root, &["probe_progress", key.as_str()], Value::from(probe_total(by_type)));
            }
        }
    }
    if let Some(progress) = root.remove("probe_construction_progress") {
        migrated += 1;
        let total = probe_total(&progress);
        if total > 0.0 {
            let key = probe_key(&data.rules.starting.zone);
            fill(root, &["probe_progress", key.as_str()], Value::from(total));
        }
    }

    if let Some(Value::Object(progress)) = root.remove("structure_construction_progress") {
        migrated += 1;
        for (key, value) in progress {
            match structure_progress_key(&key, data) {
                Some(key) => fill(root, &["structure_progress", key.as_str()], value),
                None => tracing::warn!(%key, "Dropping legacy progress for unknown structure"),
            }
        }
    }
    if let Some(Value::Array(enabled)) = root.get_mut("enabled_construction") {
        for entry in enabled.iter_mut() {
            let Some(key) = entry.as_str() else {
                continue;
            };
            if split_structure_key(key, data).is_none() {
                if let Some(canonical) = structure_progress_key(key, data) {
                    *entry = Value::from(canonical);
                    migrated += 1;
                }
            }
        }
    }

    migrated
}

/// Rewrite per-zone legacy fields in place.
///
/// Zones saved without stocks start from the data set's stocks.
fn migrate_zones(root: &mut Map<String, Value>, data: &GameData) {
    let Some(Value::Object(zones)) = root.get_mut("zones") else {
        return;
    };
    for (zone_id, zone) in zones.iter_mut() {
        let Value::Object(zone) = zone else {
            continue;
        };
        if let Some(zone_data) = data.get_zone(zone_id) {
            zone.entry("metal_remaining")
                .or_insert_with(|| Value::from(zone_data.metal_stores_kg.max(0.0)));
            zone.entry("mass_remaining")
                .or_insert_with(|| Value::from(zone_data.total_mass_kg.max(zone_data.metal_stores_kg)));
        }
        if let Some(probes) = zone.get("probes") {
            let total = probe_total(probes);
            zone.insert("probes".to_string(), Value::from(total));
        }
        if let Some(Value::Object(structures)) = zone.get("structures") {
            let canonical = canonical_structures(structures);
            zone.insert("structures".to_string(), canonical);
        }
    }
}

fn add_structures(state: &mut GameState, zone_id: &str, structures: &Map<String, Value>) {
    let Some(zone) = state.zones.get_mut(zone_id) else {
        tracing::warn!(zone = zone_id, "Dropping legacy structures for unknown zone");
        return;
    };
    for (building, count) in structures {
        *zone.structures.entry(building.clone()).or_insert(0) += structure_count(count);
    }
}

/// Parse a JSON save, folding every legacy layout into canonical state.
///
/// Missing fields fall back to their defaults one by one.
///
/// # Errors
///
/// Returns [`GameError::InvalidState`] if the text is not a JSON object or
/// a field has the wrong type.
pub fn load_save_json(json: &str, data: &GameData) -> Result<GameState> {
    let mut root: Value = serde_json::from_str(json)
        .map_err(|e| GameError::InvalidState(format!("Failed to parse save: {e}")))?;
    let Value::Object(object) = &mut root else {
        return Err(GameError::InvalidState(
            "Save must be a JSON object".to_string(),
        ));
    };

    // Flat saves write the global maps next to the per-zone ones as totals.
    let has_zone_probes = object.contains_key("probes_by_zone");
    let legacy_probes = object.remove("probes").filter(|_| !has_zone_probes);
    let legacy_by_zone = object.remove("structures_by_zone");
    let legacy_structures = object
        .remove("structures")
        .filter(|_| legacy_by_zone.is_none());
    let migrated = migrate_flat_fields(object, data);
    if migrated > 0 {
        tracing::info!(fields = migrated, "Migrating legacy save layout");
    }
    migrate_zones(object, data);

    let mut state: GameState = serde_json::from_value(root)
        .map_err(|e| GameError::InvalidState(format!("Failed to read save: {e}")))?;
    normalize(&mut state, data);

    let start = data.rules.starting.zone.as_str();
    if let Some(probes) = legacy_probes {
        let total = probe_total(&probes);
        if let Some(zone) = state.zones.get_mut(start) {
            zone.probes += total;
        }
    }
    if let Some(Value::Object(structures)) = legacy_structures {
        add_structures(&mut state, start, &structures);
    }
    if let Some(Value::Object(by_zone)) = legacy_by_zone {
        for (zone_id, structures) in &by_zone {
            if let Value::Object(structures) = structures {
                add_structures(&mut state, zone_id, structures);
            }
        }
    }

    reallocate(&mut state, data.rules.allocation_epsilon);
    Ok(state)
}

/// Bring a loaded state in line with the current data set.
///
/// Adds zones and research tiers the save does not know about, refreshes
/// static zone fields, fixes counters and clamps resources at zero.
pub fn normalize(state: &mut GameState, data: &GameData) {
    for zone_data in &data.zones {
        state
            .zones
            .entry(zone_data.id.clone())
            .and_modify(|zone| zone.refresh_static(zone_data))
            .or_insert_with(|| Zone::from_data(zone_data));
    }
    for (id, zone) in &mut state.zones {
        zone.id.clone_from(id);
        zone.probes = zone.probes.max(0.0);
        zone.metal_remaining = zone.metal_remaining.max(0.0);
        zone.mass_remaining = zone.mass_remaining.max(0.0);
    }

    state.ensure_research(data);

    if state.dyson.target_mass <= 0.0 {
        state.dyson.target_mass = data.rules.dyson_target_mass;
    }

    let highest_id = state
        .transfers
        .iter()
        .map(|t| t.id)
        .chain(state.transfer_history.iter().map(|r| r.id))
        .max()
        .unwrap_or(0);
    state.next_transfer_id = state.next_transfer_id.max(highest_id + 1);

    if !state.zones.contains_key(&state.harvest_zone) {
        state.harvest_zone.clone_from(&data.rules.starting.zone);
    }

    let r = &mut state.resources;
    for value in [
        &mut r.energy,
        &mut r.energy_stored,
        &mut r.metal,
        &mut r.intelligence,
        &mut r.dexterity,
        &mut r.slag,
    ] {
        *value = value.max(0.0);
    }
}
