//! # Plant Orchestrator: Experiment Lifecycle Management
//!
//! **Version**: 0.1.0
//!
//! Tracks experiments that reserve physical plants for a time window and
//! walks each one through its lifecycle: submission, supervisor approval,
//! hand-off to telemetry and scheduling, execution, termination.
//!
//! ## Design Principles
//!
//! - **Exclusive reservations**: no two live experiments share a plant over
//!   overlapping windows
//! - **Single update path**: every mutation validates the trigger, patches a
//!   copy, swaps it in and saves the collection
//! - **Compensated hand-off**: a failed scheduler submission stops the
//!   telemetry it started
//! - **Degraded, never down**: persistence failures are logged and surfaced
//!   through [`persistence::PersistenceHealth`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use plant_orchestrator::{OrchestratorConfig, Orchestrator};
//! # use plant_orchestrator::collaborators::Collaborators;
//! # fn collaborators() -> Collaborators { unimplemented!() }
//!
//! # async fn run() -> plant_orchestrator::Result<()> {
//! let config = OrchestratorConfig::load_or_default("expmanager.json");
//! let mut orchestrator = Orchestrator::from_config(&config, collaborators());
//!
//! let id = orchestrator.submit(&serde_json::json!({
//!     "experiment_id": "exp-001",
//!     "experimenter": "alice",
//!     "description": "Heat pump step response",
//!     "start_time": "2025-11-02T10:00:00+00:00",
//!     "stop_time": "2025-11-02T12:00:00+00:00",
//!     "plants": ["heatpump_A"]
//! }))?;
//! orchestrator.authorise(&id, "bob")?;
//! orchestrator
//!     .finalize(&id, vec!["controller_agent".into()], vec!["heatpump_A/setpoint".into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metadata;
pub mod orchestrator;
pub mod persistence;

pub use api::{ApiError, RemoteCall};
pub use config::OrchestratorConfig;
pub use error::{Error, ErrorKind, Result};
pub use experiment::{ExperimentRecord, ExperimentState};
pub use orchestrator::Orchestrator;
