//! JSON protocol for headless economy sessions.
//!
//! The runner talks JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and state summaries
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers every command with one or more responses
//! 4. `quit` ends the session with `{"type":"bye"}`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"action","action":{"set_economy_slider":{"value":40.0}}}
//! <- {"type":"action_applied","action":"set_economy_slider","outcome":"applied"}
//! -> {"cmd":"tick","count":30}
//! <- {"type":"state","tick":30,"time":30.0,...}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","tick":30,"hash":1234567890}
//! -> {"cmd":"quit"}
//! <- {"type":"bye"}
//! ```

use serde::{Deserialize, Serialize};

use dyson_core::actions::{Action, ActionOutcome};
use dyson_core::error::GameError;
use dyson_core::simulation::Simulation;
use dyson_core::snapshot::StateSnapshot;
use dyson_core::state::Resources;

/// Protocol version reported in the ready message.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the simulation by N ticks (default: 1).
    Tick {
        /// Number of ticks.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Report a state summary without advancing time.
    Query,

    /// Report the full snapshot with every breakdown.
    Snapshot,

    /// Apply a player action.
    Action {
        /// The action to apply.
        action: Action,
    },

    /// Report the current state hash.
    Hash,

    /// Write the state as a JSON save.
    Save {
        /// Destination file.
        path: String,
    },

    /// Replace the simulation with a JSON save, migrating legacy fields.
    Load {
        /// Source file.
        path: String,
    },

    /// End the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// Human-readable message.
        message: String,
        /// Command that failed, when it could be parsed.
        cmd: Option<String>,
        /// Error class for engine errors.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        kind: Option<String>,
    },

    /// State summary.
    State(StateSummary),

    /// Full snapshot.
    Snapshot {
        /// The snapshot.
        snapshot: Box<StateSnapshot>,
    },

    /// An action was applied.
    ActionApplied {
        /// Action name.
        action: String,
        /// What the action did.
        outcome: ActionOutcome,
    },

    /// State hash for determinism verification.
    StateHash {
        /// Current tick.
        tick: u64,
        /// Hash of the canonical state.
        hash: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Compact per-tick view of the economy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    /// Current tick.
    pub tick: u64,
    /// Simulated days elapsed.
    pub time: f64,
    /// Global resource pools.
    pub resources: Resources,
    /// Probes across all zones.
    pub total_probes: f64,
    /// Dyson sphere mass in kg.
    pub dyson_mass: f64,
    /// Dyson sphere target mass in kg.
    pub dyson_target_mass: f64,
    /// Active transfers.
    pub active_transfers: usize,
    /// State hash.
    pub hash: u64,
}

impl StateSummary {
    /// Summarize a simulation.
    #[must_use]
    pub fn from_simulation(sim: &Simulation) -> Self {
        let state = sim.state();
        Self {
            tick: state.tick,
            time: state.time,
            resources: state.resources.clone(),
            total_probes: state.total_probes(),
            dyson_mass: state.dyson.mass,
            dyson_target_mass: state.dyson.target_mass,
            active_transfers: state.transfers.len(),
            hash: sim.state_hash(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
            kind: None,
        }
    }

    /// Create an error response from an engine error, keeping its class.
    #[must_use]
    pub fn game_error(error: &GameError, cmd: &str) -> Self {
        Self::Error {
            message: error.to_string(),
            cmd: Some(cmd.to_string()),
            kind: Some(error.kind().to_string()),
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}","cmd":null}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed or unknown commands.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name for acknowledgments and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Snapshot => "snapshot",
            Self::Action { .. } => "action",
            Self::Hash => "hash",
            Self::Save { .. } => "save",
            Self::Load { .. } => "load",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 60 }));
    }

    #[test]
    fn test_default_tick_count() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 1 }));
    }

    #[test]
    fn test_parse_action_command() {
        let json = r#"{"cmd":"action","action":{"create_transfer":{"from":"earth","to":"mars","mode":{"continuous":{"rate":2.5}}}}}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(cmd.name(), "action");
        assert!(matches!(
            cmd,
            Command::Action {
                action: Action::CreateTransfer { ref from, ref to, .. }
            } if from == "earth" && to == "mars"
        ));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Command::from_json(r#"{"cmd":"spawn"}"#).is_err());
        assert!(Command::from_json("not json").is_err());
    }

    #[test]
    fn test_serialize_responses() {
        let json = Response::StateHash { tick: 5, hash: 42 }.to_json_line();
        assert_eq!(json, "{\"type\":\"state_hash\",\"tick\":5,\"hash\":42}\n");

        let json = Response::game_error(&GameError::UnknownZone("pluto".to_string()), "action")
            .to_json_line();
        assert!(json.contains(r#""kind":"validation""#));
        assert!(json.contains("pluto"));

        let json = Response::ack("save").to_json_line();
        assert!(json.contains(r#""type":"ack""#));
    }
}
