//! expman - offline inspection of the experiment collection
//!
//! Reads the persisted experiments data file without contacting any
//! collaborator:
//! - list tracked experiments with their state and window
//! - show one record
//! - check the collection for unknown states and double-booked plants

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plant_orchestrator::experiment::{find_conflict, ExperimentStore};
use plant_orchestrator::persistence::{JsonFileStore, Persistence};
use plant_orchestrator::OrchestratorConfig;

/// Experiment manager inspection tool
#[derive(Parser)]
#[command(name = "expman")]
#[command(about = "Inspect the experiment manager's persisted collection", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "EXPMAN_CONFIG")]
    config: Option<PathBuf>,

    /// Experiments data file, overriding the configured one
    #[arg(short, long, env = "EXPMAN_DATA")]
    data: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tracked experiments
    List,

    /// Print one experiment record as JSON
    Show {
        /// Experiment ID
        experiment_id: String,
    },

    /// Check the collection for inconsistencies. A corrupt file is quarantined.
    Check,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => OrchestratorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => OrchestratorConfig::default(),
    };
    let data_path = cli.data.unwrap_or(config.experiments_data_path);
    info!(path = %data_path.display(), "Reading experiments data");

    let mut persistence = Persistence::new(JsonFileStore::new(&data_path));
    let store = ExperimentStore::from_records(persistence.load_all());

    match cli.command {
        Commands::List => {
            for entry in store.entries() {
                let record = entry.record();
                println!(
                    "{:<24} {:<10} {} .. {}  [{}]",
                    record.experiment_id(),
                    entry.state(),
                    record.start_time().to_rfc3339(),
                    record.stop_time().to_rfc3339(),
                    record.plants().join(", ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Show { experiment_id } => {
            let entry = store
                .get(&experiment_id)
                .with_context(|| format!("experiment {experiment_id} not found"))?;
            println!("{}", serde_json::to_string_pretty(entry.record())?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let mut problems = 0usize;

            if let Some(err) = &persistence.health().last_load_error {
                println!("load failed: {err}");
                problems += 1;
            }
            if let Some(moved) = &persistence.health().quarantined_file {
                println!("corrupt file moved to {}", moved.display());
            }

            for entry in store.entries() {
                let record = entry.record();
                if record.state().known().is_none() {
                    println!(
                        "{}: unrecognised state {}, treated as failed",
                        record.experiment_id(),
                        record.state()
                    );
                    problems += 1;
                }
                if let Some(other) = find_conflict(
                    store.entries(),
                    record.experiment_id(),
                    record.plants(),
                    record.start_time(),
                    record.stop_time(),
                ) {
                    if !entry.state().is_terminal() {
                        println!(
                            "{}: plants double-booked with {}",
                            record.experiment_id(),
                            other.record().experiment_id()
                        );
                        problems += 1;
                    }
                }
            }

            println!("{} experiments, {problems} problem(s)", store.len());
            Ok(if problems == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
