//! Dyson Swarm - Development Tools

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dyson-tools")]
#[command(about = "Development tools for the Dyson swarm economy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate game data files
    Validate {
        /// Path to data directory
        #[arg(default_value = "crates/dyson_core/data")]
        path: String,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {path}");
            match dyson_tools::validate::validate_data_directory(std::path::Path::new(&path)) {
                Ok(report) if report.is_ok() => {
                    for file in &report.files {
                        println!("OK    {}", file.path.display());
                    }
                    tracing::info!("Validation passed");
                }
                Ok(report) => {
                    for file in &report.files {
                        if file.is_ok() {
                            println!("OK    {}", file.path.display());
                            continue;
                        }
                        println!("FAIL  {}", file.path.display());
                        for error in &file.errors {
                            println!("      - {error}");
                        }
                    }
                    tracing::error!("Validation failed with {} errors", report.error_count());
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
