//! Experiment lifecycle: records, state machine, validation and availability
//!
//! ## Lifecycle
//!
//! ```text
//! submitted ─> authorised ─> finalized ─> running ─> finished
//!     │            │             │           ├─────> failed
//!     └────────────┴─────────────┴───────────┴─────> canceled
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use plant_orchestrator::experiment::{
//!     validate_submission, ExperimentEntry, ExperimentStore, StateMachine, Trigger,
//! };
//!
//! let record = validate_submission(&serde_json::json!({
//!     "experiment_id": "exp-001",
//!     "experimenter": "alice",
//!     "description": "Heat pump step response",
//!     "start_time": "2025-11-02T10:00:00+00:00",
//!     "stop_time": "2025-11-02T12:00:00+00:00",
//!     "plants": ["heatpump_A"]
//! }))?;
//!
//! let mut store = ExperimentStore::new();
//! store.insert(ExperimentEntry::new(record, StateMachine::new()))?;
//! store.transition("exp-001", Trigger::Authorise, |_| {})?;
//! # Ok::<(), plant_orchestrator::Error>(())
//! ```

mod availability;
mod experiment_record;
mod state;
mod store;
mod validator;

pub use availability::{find_conflict, is_available, windows_overlap};
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder, StateLabel};
pub use state::{next_state, ExperimentState, StateMachine, TransitionError, Trigger, UnknownState};
pub use store::{ExperimentEntry, ExperimentStore};
pub use validator::{parse_timestamp, validate_submission, ValidationError};
