//! Headless Dyson swarm economy runner.
//!
//! Runs the economy without a UI, controlled via JSON on stdin/stdout.
//! Designed for agents, CI checks and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p dyson_headless
//!
//! # Interactive session from a scenario, recording accepted actions
//! cargo run -p dyson_headless -- run --scenario factory_rush.ron --record game.log
//!
//! # Verify determinism of a scenario
//! cargo run -p dyson_headless -- verify --ticks 1000 --runs 5
//!
//! # Verify a recorded session
//! cargo run -p dyson_headless -- replay --file game.log
//!
//! # Tick throughput
//! cargo run -p dyson_headless -- benchmark --ticks 100000
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information, filtered by `RUST_LOG`

use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dyson_core::prelude::*;
use dyson_headless::{HeadlessConfig, HeadlessRunner, Scenario};

#[derive(Parser)]
#[command(name = "dyson_headless")]
#[command(about = "Headless Dyson swarm economy runner for agents and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single interactive session
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Game data file, overriding the scenario's
        #[arg(short, long)]
        data: Option<String>,

        /// Simulated days per tick, overriding the scenario's
        #[arg(long)]
        dt: Option<f64>,

        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,

        /// Save an action log of the session to this file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Ticks per run (defaults to the scenario's)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Replay a recorded session and check its final hash
    Replay {
        /// Action log path
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36500")]
        ticks: u64,

        /// Scenario to benchmark
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for the protocol
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            data,
            dt,
            auto_state,
            record,
        }) => {
            cmd_run(scenario, data, dt, auto_state, record);
        }
        Some(Commands::Verify {
            scenario,
            ticks,
            runs,
        }) => {
            cmd_verify(scenario, ticks, runs);
        }
        Some(Commands::Replay { file }) => {
            cmd_replay(&file);
        }
        Some(Commands::Benchmark { ticks, scenario }) => {
            cmd_benchmark(ticks, scenario);
        }
        None => {
            // Default: interactive mode
            cmd_run(None, None, None, false, None);
        }
    }
}

/// Load a scenario file, or the default Earth start.
fn load_scenario(path: Option<PathBuf>) -> Scenario {
    let Some(path) = path else {
        return Scenario::earth_start();
    };
    match Scenario::load(&path) {
        Ok(scenario) => {
            tracing::info!(name = %scenario.name, path = %path.display(), "Loaded scenario");
            scenario
        }
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            process::exit(1);
        }
    }
}

fn build_simulation(scenario: &Scenario) -> Simulation {
    match scenario.build() {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Failed to build scenario '{}': {e}", scenario.name);
            process::exit(1);
        }
    }
}

/// Run a single interactive session
fn cmd_run(
    scenario: Option<PathBuf>,
    data: Option<String>,
    dt: Option<f64>,
    auto_state: bool,
    record: Option<PathBuf>,
) {
    let mut scenario = load_scenario(scenario);
    if data.is_some() {
        scenario.data = data;
    }
    if let Some(dt) = dt {
        scenario.delta_time = dt;
    }
    tracing::info!(scenario = %scenario.name, dt = scenario.delta_time, "Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        record_path: record,
    };
    let mut runner = match HeadlessRunner::new(build_simulation(&scenario), config) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Failed to start session: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = runner.run_stdio() {
        eprintln!("Session IO failed: {e}");
        process::exit(1);
    }
}

/// Verify determinism by running the same scenario multiple times
fn cmd_verify(scenario: Option<PathBuf>, ticks: Option<u64>, runs: u32) {
    let scenario = load_scenario(scenario);
    let ticks = ticks.unwrap_or(scenario.ticks);
    tracing::info!(scenario = %scenario.name, ticks, runs, "Verifying determinism");

    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut sim = build_simulation(&scenario);
            for _ in 0..ticks {
                sim.tick();
            }
            sim.state_hash()
        })
        .collect();

    if hashes.windows(2).all(|w| w[0] == w[1]) {
        eprintln!("PASS: All {runs} runs produced identical results");
        if let Some(hash) = hashes.first() {
            eprintln!("  Final hash: {hash:016x}");
        }
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (run, hash) in hashes.iter().enumerate() {
            eprintln!("  Run {run}: {hash:016x}");
        }
        process::exit(1);
    }
}

/// Replay a recorded session
fn cmd_replay(file: &Path) {
    tracing::info!(path = %file.display(), "Verifying replay");

    let log = match ActionLog::load(file) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Failed to load action log: {e}");
            process::exit(1);
        }
    };

    eprintln!("Loaded action log:");
    eprintln!("  Label: {}", log.label);
    eprintln!("  Actions: {}", log.actions.len());
    eprintln!("  Duration: {} ticks", log.final_tick);

    match log.replay() {
        Ok(sim) => {
            eprintln!("PASS: Replay verification successful");
            eprintln!("  Hash: {:016x}", sim.state_hash());
        }
        Err(GameError::DesyncDetected {
            tick,
            expected_hash,
            actual_hash,
        }) => {
            eprintln!("FAIL: Replay produced different hash at tick {tick}!");
            eprintln!("  Expected: {expected_hash:016x}");
            eprintln!("  Actual:   {actual_hash:016x}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: Replay error: {e}");
            process::exit(1);
        }
    }
}

/// Run N ticks for benchmarking
fn cmd_benchmark(ticks: u64, scenario: Option<PathBuf>) {
    let scenario = load_scenario(scenario);
    let mut sim = build_simulation(&scenario);
    tracing::info!(ticks, scenario = %scenario.name, "Running tick benchmark");

    let start = Instant::now();
    for _ in 0..ticks {
        sim.tick();
    }
    let elapsed = start.elapsed();
    let secs = elapsed.as_secs_f64();

    let state = sim.state();
    eprintln!("Benchmark complete:");
    eprintln!("  Ticks: {ticks}");
    eprintln!("  Time: {secs:.3}s");
    if secs > 0.0 {
        eprintln!("  Throughput: {:.0} ticks/s", ticks as f64 / secs);
    }
    eprintln!("  Probes: {:.1}", state.total_probes());
    eprintln!("  Metal: {:.1} kg", state.resources.metal);
    eprintln!("  Dyson mass: {:.3e} kg", state.dyson.mass);
    eprintln!("  Final hash: {:016x}", sim.state_hash());
}
