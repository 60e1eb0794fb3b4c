//! Action logs for recording and replaying games.
//!
//! A log stores the initial simulation and every accepted action with the
//! tick it was applied before. Replaying the log must reproduce the final
//! state hash exactly.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::actions::{Action, ActionOutcome};
use crate::error::{GameError, Result};
use crate::simulation::Simulation;

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Tick the action was applied before.
    pub tick: u64,
    /// The action.
    pub action: Action,
}

/// Action log format version.
pub const ACTION_LOG_VERSION: u32 = 1;

/// Recorded game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    /// Format version.
    pub version: u32,
    /// Free-form label.
    pub label: String,
    /// Serialized initial simulation.
    pub initial_state: Vec<u8>,
    /// Accepted actions in order.
    pub actions: Vec<ActionRecord>,
    /// Tick the recording stopped at.
    pub final_tick: u64,
    /// State hash at `final_tick`.
    pub final_hash: u64,
}

impl ActionLog {
    /// Start a log from a simulation's current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulation cannot be serialized.
    pub fn new(label: impl Into<String>, initial: &Simulation) -> Result<Self> {
        Ok(Self {
            version: ACTION_LOG_VERSION,
            label: label.into(),
            initial_state: initial.serialize()?,
            actions: Vec::new(),
            final_tick: initial.get_tick(),
            final_hash: initial.state_hash(),
        })
    }

    /// Record an action.
    pub fn record(&mut self, tick: u64, action: Action) {
        self.actions.push(ActionRecord { tick, action });
    }

    /// Apply an action to `sim` and record it if accepted.
    ///
    /// # Errors
    ///
    /// Returns the action's validation error; nothing is recorded then.
    pub fn apply(&mut self, sim: &mut Simulation, action: Action) -> Result<ActionOutcome> {
        let tick = sim.get_tick();
        let outcome = sim.apply_action(action.clone())?;
        self.record(tick, action);
        Ok(outcome)
    }

    /// Mark the end of the recording.
    pub fn finalize(&mut self, sim: &Simulation) {
        self.final_tick = sim.get_tick();
        self.final_hash = sim.state_hash();
    }

    /// Save to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize action log: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write action log: {e}")))?;
        Ok(())
    }

    /// Load from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails, or the version
    /// does not match.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read action log: {e}")))?;
        let log: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize action log: {e}")))?;

        if log.version != ACTION_LOG_VERSION {
            return Err(GameError::InvalidState(format!(
                "Action log version mismatch: expected {ACTION_LOG_VERSION}, got {}",
                log.version
            )));
        }
        Ok(log)
    }

    /// Rebuild the initial simulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored state cannot be deserialized.
    pub fn restore_initial_state(&self) -> Result<Simulation> {
        Simulation::deserialize(&self.initial_state)
    }

    /// Actions recorded for one tick.
    #[must_use]
    pub fn actions_at_tick(&self, tick: u64) -> Vec<&ActionRecord> {
        self.actions.iter().filter(|r| r.tick == tick).collect()
    }

    /// Re-run the log and check the final hash.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DesyncDetected`] if the replayed hash differs,
    /// or the first error of a recorded action that no longer applies.
    pub fn replay(&self) -> Result<Simulation> {
        let mut sim = self.restore_initial_state()?;
        let mut pending = self.actions.iter().peekable();

        while sim.get_tick() < self.final_tick {
            while let Some(record) = pending.next_if(|r| r.tick <= sim.get_tick()) {
                sim.apply_action(record.action.clone())?;
            }
            sim.tick();
        }
        for record in pending {
            sim.apply_action(record.action.clone())?;
        }

        let actual = sim.state_hash();
        if actual != self.final_hash {
            return Err(GameError::DesyncDetected {
                tick: sim.get_tick(),
                expected_hash: self.final_hash,
                actual_hash: actual,
            });
        }
        Ok(sim)
    }
}
