//! Headless session loop.
//!
//! Reads commands line by line, drives a [`Simulation`] and writes one JSON
//! response per line. Generic over the reader and writer so sessions can be
//! scripted in tests.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use dyson_core::prelude::*;

use crate::protocol::{Command, Response, StateSummary};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output a state summary after every tick (vs once per `tick` command).
    pub auto_state_output: bool,
    /// Record accepted actions to this action log on shutdown.
    pub record_path: Option<PathBuf>,
}

/// Headless runner for scripted or agent-driven sessions.
pub struct HeadlessRunner {
    sim: Simulation,
    config: HeadlessConfig,
    log: Option<ActionLog>,
    should_quit: bool,
}

impl HeadlessRunner {
    /// Create a runner around a simulation.
    ///
    /// # Errors
    ///
    /// Returns an error if recording is enabled and the initial state
    /// cannot be serialized.
    pub fn new(sim: Simulation, config: HeadlessConfig) -> Result<Self> {
        let log = match config.record_path {
            Some(_) => Some(ActionLog::new("headless", &sim)?),
            None => None,
        };
        Ok(Self {
            sim,
            config,
            log,
            should_quit: false,
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether a `quit` command was received.
    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Parse and handle one input line.
    ///
    /// Blank lines produce no output.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        match Command::from_json(line) {
            Ok(cmd) => self.handle(cmd),
            Err(e) => vec![Response::error(format!("Parse error: {e}"), None)],
        }
    }

    /// Handle one command.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let cmd_name = cmd.name();
        let mut responses = Vec::new();

        match cmd {
            Command::Tick { count } => {
                for _ in 0..count {
                    self.sim.tick();
                    if self.config.auto_state_output {
                        responses.push(self.state_response());
                    }
                }
                if !self.config.auto_state_output || count == 0 {
                    responses.push(self.state_response());
                }
            }

            Command::Query => responses.push(self.state_response()),

            Command::Snapshot => responses.push(Response::Snapshot {
                snapshot: Box::new(self.sim.snapshot()),
            }),

            Command::Action { action } => {
                let name = action.name();
                let result = match self.log.as_mut() {
                    Some(log) => log.apply(&mut self.sim, action),
                    None => self.sim.apply_action(action),
                };
                responses.push(match result {
                    Ok(outcome) => Response::ActionApplied {
                        action: name.to_string(),
                        outcome,
                    },
                    Err(e) => Response::game_error(&e, cmd_name),
                });
            }

            Command::Hash => responses.push(Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            }),

            Command::Save { path } => {
                let written = self
                    .sim
                    .to_json()
                    .and_then(|json| {
                        std::fs::write(&path, json).map_err(|e| {
                            GameError::InvalidState(format!("Failed to write {path}: {e}"))
                        })
                    });
                responses.push(match written {
                    Ok(()) => {
                        tracing::info!(%path, tick = self.sim.get_tick(), "Saved game");
                        Response::ack(cmd_name)
                    }
                    Err(e) => Response::game_error(&e, cmd_name),
                });
            }

            Command::Load { path } => {
                let loaded = std::fs::read_to_string(&path)
                    .map_err(|e| GameError::InvalidState(format!("Failed to read {path}: {e}")))
                    .and_then(|json| {
                        Simulation::load_save_json(
                            self.sim.data().clone(),
                            &json,
                            *self.sim.config(),
                        )
                    });
                match loaded {
                    Ok(sim) => {
                        tracing::info!(%path, tick = sim.get_tick(), "Loaded game");
                        self.sim = sim;
                        if self.log.is_some() {
                            tracing::warn!("Recording restarted from the loaded state");
                            self.log = ActionLog::new("headless", &self.sim).ok();
                        }
                        responses.push(self.state_response());
                    }
                    Err(e) => responses.push(Response::game_error(&e, cmd_name)),
                }
            }

            Command::Quit => {
                self.should_quit = true;
                responses.push(Response::Bye);
            }
        }

        responses
    }

    /// Run a session until `quit` or end of input.
    ///
    /// Writes the ready message first and flushes after every command. The
    /// action log, when enabled, is saved at the end.
    ///
    /// # Errors
    ///
    /// Returns an IO error if reading input or writing output fails.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(Response::ready(self.sim.get_tick()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            for response in self.handle_line(&line) {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if self.should_quit {
                break;
            }
        }

        if let Err(e) = self.finish() {
            tracing::error!(error = %e, "Failed to save action log");
        }
        Ok(())
    }

    /// Run a session on stdin and stdout.
    ///
    /// # Errors
    ///
    /// Returns an IO error if reading input or writing output fails.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }

    /// Finalize and save the action log, if recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn finish(&mut self) -> Result<()> {
        let (Some(log), Some(path)) = (self.log.as_mut(), self.config.record_path.as_ref()) else {
            return Ok(());
        };
        log.finalize(&self.sim);
        log.save(path)?;
        tracing::info!(
            path = %path.display(),
            actions = log.actions.len(),
            final_tick = log.final_tick,
            "Action log saved"
        );
        Ok(())
    }

    fn state_response(&self) -> Response {
        Response::State(StateSummary::from_simulation(&self.sim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyson_test_utils::fixtures::{busy_economy, earth_scenario};
    use std::io::Cursor;

    fn runner() -> HeadlessRunner {
        HeadlessRunner::new(earth_scenario(), HeadlessConfig::default()).unwrap()
    }

    #[test]
    fn test_tick_reports_state() {
        let mut runner = runner();
        let responses = runner.handle(Command::Tick { count: 3 });
        assert_eq!(responses.len(), 1);
        let Response::State(summary) = &responses[0] else {
            panic!("expected state, got {responses:?}");
        };
        assert_eq!(summary.tick, 3);
        assert_eq!(summary.hash, runner.simulation().state_hash());
    }

    #[test]
    fn test_auto_state_output() {
        let config = HeadlessConfig {
            auto_state_output: true,
            ..HeadlessConfig::default()
        };
        let mut runner = HeadlessRunner::new(earth_scenario(), config).unwrap();
        let responses = runner.handle(Command::Tick { count: 4 });
        assert_eq!(responses.len(), 4);
    }

    #[test]
    fn test_action_applied_and_rejected() {
        let mut runner = runner();
        let responses = runner.handle(Command::Action {
            action: Action::SetEconomySlider { value: 30.0 },
        });
        assert!(matches!(
            &responses[0],
            Response::ActionApplied { action, outcome: ActionOutcome::Applied }
                if action == "set_economy_slider"
        ));
        assert_eq!(runner.simulation().state().sliders.economy, 30.0);

        let responses = runner.handle(Command::Action {
            action: Action::SetHarvestZone {
                zone: "pluto".to_string(),
            },
        });
        assert!(matches!(
            &responses[0],
            Response::Error { kind: Some(kind), .. } if kind == "validation"
        ));
    }

    #[test]
    fn test_parse_error_reported() {
        let mut runner = runner();
        let responses = runner.handle_line("{\"cmd\":\"warp\"}");
        assert!(matches!(&responses[0], Response::Error { cmd: None, .. }));
        assert!(runner.handle_line("   ").is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json").display().to_string();

        let mut runner = HeadlessRunner::new(busy_economy(), HeadlessConfig::default()).unwrap();
        runner.handle(Command::Tick { count: 5 });
        let responses = runner.handle(Command::Save { path: path.clone() });
        assert!(matches!(&responses[0], Response::Ack { .. }));

        let mut fresh = self::runner();
        let responses = fresh.handle(Command::Load { path });
        let Response::State(summary) = &responses[0] else {
            panic!("expected state, got {responses:?}");
        };
        assert_eq!(summary.tick, 5);
        assert_eq!(
            fresh.simulation().state().zones["earth"].structures,
            runner.simulation().state().zones["earth"].structures
        );
    }

    #[test]
    fn test_load_missing_file() {
        let mut runner = runner();
        let responses = runner.handle(Command::Load {
            path: "/nonexistent/save.json".to_string(),
        });
        assert!(matches!(
            &responses[0],
            Response::Error { kind: Some(kind), .. } if kind == "state"
        ));
    }

    #[test]
    fn test_scripted_session() {
        let input = concat!(
            "{\"cmd\":\"action\",\"action\":{\"set_mine_build_slider\":{\"value\":70.0}}}\n",
            "{\"cmd\":\"tick\",\"count\":2}\n",
            "{\"cmd\":\"hash\"}\n",
            "{\"cmd\":\"quit\"}\n",
            "{\"cmd\":\"tick\"}\n",
        );
        let mut output = Vec::new();
        let mut runner = runner();
        runner.run(Cursor::new(input), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("\"type\":\"ready\""));
        assert!(lines[1].contains("\"type\":\"action_applied\""));
        assert!(lines[2].contains("\"type\":\"state\""));
        assert!(lines[3].contains("\"type\":\"state_hash\""));
        assert_eq!(lines[4], "{\"type\":\"bye\"}");
        assert_eq!(runner.simulation().get_tick(), 2);
    }

    #[test]
    fn test_recorded_session_replays() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("session.log");
        let config = HeadlessConfig {
            record_path: Some(log_path.clone()),
            ..HeadlessConfig::default()
        };
        let mut runner = HeadlessRunner::new(busy_economy(), config).unwrap();
        runner.handle(Command::Action {
            action: Action::SetEconomySlider { value: 20.0 },
        });
        runner.handle(Command::Tick { count: 10 });
        runner.handle(Command::Action {
            action: Action::SetDysonPowerAllocation { value: 80.0 },
        });
        runner.handle(Command::Tick { count: 5 });
        runner.finish().unwrap();

        let log = ActionLog::load(&log_path).unwrap();
        assert_eq!(log.actions.len(), 2);
        let replayed = log.replay().unwrap();
        assert_eq!(replayed.state_hash(), runner.simulation().state_hash());
    }
}
