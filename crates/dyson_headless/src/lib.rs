//! Headless driver for the Dyson swarm economy.
//!
//! Runs the simulation without a UI, controlled via JSON commands on stdin
//! with responses on stdout. This enables:
//!
//! - **Agent play**: a controller can play the economy through actions
//! - **CI verification**: automated checks of balance and determinism
//! - **Replay verification**: recorded sessions must reproduce their hash
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from the controller (tick, action, snapshot, ...)
//! - **stdout**: Responses (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See the [`protocol`] module for the full command and response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":30}' | cargo run -p dyson_headless
//!
//! # Start from a scenario and record the session
//! cargo run -p dyson_headless -- run --scenario scenarios/factory_rush.ron --record game.log
//!
//! # Verify a recorded session
//! cargo run -p dyson_headless -- replay --file game.log
//! ```

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{Command, Response, StateSummary};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
