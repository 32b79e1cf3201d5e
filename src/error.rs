//! Error types for the plant orchestrator
//!
//! Every failure an operation can surface to a caller has its own variant.
//! Persistence I/O and best-effort telemetry shutdown are the only failures
//! that are logged instead of returned.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::collaborators::CallError;
use crate::experiment::{ExperimentState, TransitionError, ValidationError};

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestrator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Submitted or supplied data is malformed, missing or mistyped
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// An experiment with the same ID is already tracked
    #[error("Experiment already exists: {0}")]
    AlreadyExists(String),

    /// No experiment with the given ID is tracked
    #[error("Experiment not found: {0}")]
    NotFound(String),

    /// Plants are already reserved for an overlapping window
    #[error("Plants not available for experiment {experiment_id}: window overlaps experiment {conflicting_id}")]
    ResourceConflict {
        /// Experiment that was rejected
        experiment_id: String,
        /// Experiment currently holding the plants
        conflicting_id: String,
    },

    /// The state machine rejected the trigger
    #[error("Invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// The operation is not permitted from the current state
    #[error("Operation `{operation}` not permitted for experiment {experiment_id} in state `{state}`")]
    InvalidState {
        /// Experiment the operation targeted
        experiment_id: String,
        /// Operation that was refused
        operation: &'static str,
        /// State the experiment is in
        state: ExperimentState,
    },

    /// Required workers are not installed on the platform
    #[error("Not all agents are installed for experiment {experiment_id}: {agents:?}")]
    NotInstalled {
        /// Experiment being finalized
        experiment_id: String,
        /// Workers that were requested
        agents: Vec<String>,
    },

    /// A collaborator call failed, timed out or was rejected
    #[error("External call failed for experiment {experiment_id}: {source}")]
    ExternalCallFailed {
        /// Experiment being processed
        experiment_id: String,
        /// Underlying collaborator failure
        #[source]
        source: CallError,
    },

    /// Persisted data could not be read or decoded
    #[error("Corrupt experiments data in {}: {reason}", path.display())]
    CorruptData {
        /// Storage location that was read
        path: PathBuf,
        /// Where the unreadable data was moved, if it was
        quarantined_to: Option<PathBuf>,
        /// Decoder message
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error (JSON)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, caller-visible classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::Validation`]
    Validation,
    /// See [`Error::AlreadyExists`]
    AlreadyExists,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::ResourceConflict`]
    ResourceConflict,
    /// See [`Error::InvalidTransition`]
    InvalidTransition,
    /// See [`Error::InvalidState`]
    InvalidState,
    /// See [`Error::NotInstalled`]
    NotInstalled,
    /// See [`Error::ExternalCallFailed`]
    ExternalCallFailed,
    /// Storage, config, serialization and IO failures
    Internal,
}

impl ErrorKind {
    /// Wire label of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::ResourceConflict => "resource_conflict",
            Self::InvalidTransition => "invalid_transition",
            Self::InvalidState => "invalid_state",
            Self::NotInstalled => "not_installed",
            Self::ExternalCallFailed => "external_call_failed",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for callers that cannot match on the enum.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ResourceConflict { .. } => ErrorKind::ResourceConflict,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::NotInstalled { .. } => ErrorKind::NotInstalled,
            Self::ExternalCallFailed { .. } => ErrorKind::ExternalCallFailed,
            Self::CorruptData { .. } | Self::Config(_) | Self::Serialization(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}
