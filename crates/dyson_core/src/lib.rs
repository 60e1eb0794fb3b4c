//! # Dyson Core
//!
//! Deterministic economy core for a Dyson swarm incremental game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No file IO outside explicit save helpers
//! - No randomness
//!
//! A host owns a [`simulation::Simulation`], calls
//! [`tick`](simulation::Simulation::tick) at a fixed rate, feeds player
//! [`actions::Action`]s in between and renders
//! [`snapshot`](simulation::Simulation::snapshot)s.
//!
//! ## Crate Structure
//!
//! - [`data`] - Static game data loaded from RON
//! - [`state`] - Mutable game state
//! - [`allocation`] - Sliders to per-zone task counts
//! - [`economy`] - Production and consumption calculators
//! - [`throttle`] - Energy and metal throttles
//! - [`construction`] - Probe, structure and Dyson trackers
//! - [`research`] - Research progression and bonuses
//! - [`transfers`] - Probe transfers between zones
//! - [`actions`] - Player actions
//! - [`snapshot`] - Read-only display views
//! - [`simulation`] - Core tick loop
//! - [`migration`] - Legacy save loading
//! - [`replay`] - Action logs

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod actions;
pub mod allocation;
pub mod construction;
pub mod data;
pub mod economy;
pub mod error;
pub mod migration;
pub mod replay;
pub mod research;
pub mod simulation;
pub mod snapshot;
pub mod state;
pub mod throttle;
pub mod transfers;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actions::{Action, ActionOutcome, TransferMode};
    pub use crate::data::{GameData, ResearchCategory};
    pub use crate::error::{GameError, Result};
    pub use crate::replay::ActionLog;
    pub use crate::simulation::{SimConfig, Simulation, TickEvents, TICK_RATE};
    pub use crate::snapshot::StateSnapshot;
    pub use crate::state::{GameState, TaskAllocation, ZonePolicy};
}
