//! Probe transfers between zones.
//!
//! One-time transfers move probes atomically or fail with no effect.
//! Continuous transfers move `min(rate * dt, source probes)` every tick they
//! can afford, and skip the tick entirely when they cannot.

use crate::data::EconomicRules;
use crate::error::{GameError, Result};
use crate::state::{GameState, Transfer, TransferOutcome, TransferRecord, TransferStatus};

/// Simplified Hohmann delta-v between two orbits, in km/s.
#[must_use]
pub fn delta_v(rules: &EconomicRules, r1: f64, r2: f64) -> f64 {
    let (low, high) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
    if low <= 0.0 {
        return rules.transfer_base_delta_v;
    }
    rules.transfer_base_delta_v * (high / low).sqrt()
}

/// Kinetic energy of moving one probe between two zones.
///
/// # Errors
///
/// Returns [`GameError::UnknownZone`] if either zone is missing.
pub fn energy_per_probe(state: &GameState, rules: &EconomicRules, from: &str, to: &str) -> Result<f64> {
    let r1 = state.zone(from)?.radius_au;
    let r2 = state.zone(to)?.radius_au;
    let v = delta_v(rules, r1, r2);
    Ok(0.5 * rules.probe_mass * v * v)
}

fn validate_route(state: &GameState, from: &str, to: &str) -> Result<()> {
    state.zone(from)?;
    state.zone(to)?;
    if from == to {
        return Err(GameError::SameZoneTransfer(from.to_string()));
    }
    Ok(())
}

/// Move `count` probes immediately.
///
/// # Errors
///
/// Fails with no side effect on an unknown or identical zone, a
/// non-positive count, too few source probes or too little energy.
pub fn one_time_transfer(
    state: &mut GameState,
    rules: &EconomicRules,
    from: &str,
    to: &str,
    count: f64,
) -> Result<TransferRecord> {
    validate_route(state, from, to)?;
    if !(count > 0.0) || !count.is_finite() {
        return Err(GameError::InvalidTransferRate(count));
    }
    let available = state.zone(from)?.probes;
    if available < count {
        return Err(GameError::InsufficientProbes {
            zone: from.to_string(),
            required: count,
            available,
        });
    }
    let cost = count * energy_per_probe(state, rules, from, to)?;
    if state.resources.energy < cost {
        return Err(GameError::InsufficientResources {
            resource: "energy".to_string(),
            required: cost,
            available: state.resources.energy,
        });
    }

    state.resources.energy -= cost;
    state.zone_mut(from)?.probes = (available - count).max(0.0);
    state.zone_mut(to)?.probes += count;

    let record = TransferRecord {
        id: state.next_transfer_id,
        from: from.to_string(),
        to: to.to_string(),
        probes_moved: count,
        outcome: TransferOutcome::Completed,
        tick: state.tick,
    };
    state.next_transfer_id += 1;
    state.transfer_history.push(record.clone());
    Ok(record)
}

/// Register a continuous transfer and return its id.
///
/// # Errors
///
/// Fails on an unknown or identical zone or a non-positive rate.
pub fn create_continuous(
    state: &mut GameState,
    rules: &EconomicRules,
    from: &str,
    to: &str,
    rate: f64,
) -> Result<u64> {
    validate_route(state, from, to)?;
    if !(rate > 0.0) || !rate.is_finite() {
        return Err(GameError::InvalidTransferRate(rate));
    }
    let id = state.next_transfer_id;
    state.next_transfer_id += 1;
    state.transfers.push(Transfer {
        id,
        from: from.to_string(),
        to: to.to_string(),
        rate,
        energy_per_probe: energy_per_probe(state, rules, from, to)?,
        status: TransferStatus::Active,
        probes_moved: 0.0,
    });
    Ok(id)
}

fn find_mut(state: &mut GameState, id: u64) -> Result<&mut Transfer> {
    state
        .transfers
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or(GameError::TransferNotFound(id))
}

fn retire(state: &mut GameState, id: u64, outcome: TransferOutcome) -> Result<TransferRecord> {
    let index = state
        .transfers
        .iter()
        .position(|t| t.id == id)
        .ok_or(GameError::TransferNotFound(id))?;
    let transfer = state.transfers.remove(index);
    let record = TransferRecord {
        id,
        from: transfer.from,
        to: transfer.to,
        probes_moved: transfer.probes_moved,
        outcome,
        tick: state.tick,
    };
    state.transfer_history.push(record.clone());
    Ok(record)
}

/// Change the rate of a continuous transfer.
///
/// # Errors
///
/// Fails on an unknown id or a non-positive rate.
pub fn update_rate(state: &mut GameState, id: u64, rate: f64) -> Result<()> {
    if !(rate > 0.0) || !rate.is_finite() {
        return Err(GameError::InvalidTransferRate(rate));
    }
    find_mut(state, id)?.rate = rate;
    Ok(())
}

/// Swap source and destination.
///
/// # Errors
///
/// Fails on an unknown id.
pub fn reverse(state: &mut GameState, id: u64) -> Result<()> {
    let transfer = find_mut(state, id)?;
    std::mem::swap(&mut transfer.from, &mut transfer.to);
    Ok(())
}

/// Pause or resume.
///
/// # Errors
///
/// Fails on an unknown id.
pub fn set_paused(state: &mut GameState, id: u64, paused: bool) -> Result<()> {
    find_mut(state, id)?.status = if paused {
        TransferStatus::Paused
    } else {
        TransferStatus::Active
    };
    Ok(())
}

/// Remove a transfer, keeping a terminal record.
///
/// # Errors
///
/// Fails on an unknown id.
pub fn delete(state: &mut GameState, id: u64) -> Result<TransferRecord> {
    retire(state, id, TransferOutcome::Deleted)
}

/// What happened to one continuous transfer this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Probes moved.
    Moved {
        /// Transfer id.
        id: u64,
        /// Probes moved.
        probes: f64,
    },
    /// Not enough energy; nothing moved.
    Skipped {
        /// Transfer id.
        id: u64,
    },
    /// Source had no probes; transfer removed.
    AutoRemoved {
        /// Transfer id.
        id: u64,
    },
}

/// Process every active continuous transfer in id order.
pub fn process_continuous(state: &mut GameState, dt: f64) -> Vec<TransferEvent> {
    let mut events = Vec::new();
    let ids: Vec<u64> = state
        .transfers
        .iter()
        .filter(|t| t.status == TransferStatus::Active)
        .map(|t| t.id)
        .collect();

    for id in ids {
        let Some(transfer) = state.transfers.iter().find(|t| t.id == id).cloned() else {
            continue;
        };
        let source = state.zones.get(&transfer.from).map_or(0.0, |z| z.probes);

        if source <= 0.0 {
            if retire(state, id, TransferOutcome::AutoRemoved).is_ok() {
                tracing::warn!(id, from = %transfer.from, "Transfer source empty, removed");
                events.push(TransferEvent::AutoRemoved { id });
            }
            continue;
        }

        let moved = (transfer.rate * dt).min(source);
        if moved <= 0.0 {
            continue;
        }
        let cost = moved * transfer.energy_per_probe;
        if state.resources.energy < cost {
            tracing::warn!(id, required = cost, available = state.resources.energy, "Transfer skipped, insufficient energy");
            events.push(TransferEvent::Skipped { id });
            continue;
        }

        state.resources.energy -= cost;
        if let Some(zone) = state.zones.get_mut(&transfer.from) {
            zone.probes = (zone.probes - moved).max(0.0);
        }
        if let Some(zone) = state.zones.get_mut(&transfer.to) {
            zone.probes += moved;
        }
        if let Some(t) = state.transfers.iter_mut().find(|t| t.id == id) {
            t.probes_moved += moved;
        }
        events.push(TransferEvent::Moved { id, probes: moved });
    }

    events
}
