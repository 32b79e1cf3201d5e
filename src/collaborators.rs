//! External collaborators the orchestrator talks to
//!
//! The transport behind these traits is not part of this crate. Every call
//! made by the orchestrator is bounded by a fixed timeout and is never
//! retried; a call that does not answer in time counts as failed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Failure of a single collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No answer within the call timeout
    #[error("`{call}` timed out after {after:?}")]
    Timeout {
        /// Remote operation name
        call: &'static str,
        /// Timeout that elapsed
        after: Duration,
    },

    /// The collaborator answered `false`
    #[error("`{call}` was rejected by the collaborator")]
    Rejected {
        /// Remote operation name
        call: &'static str,
    },

    /// Transport or remote error
    #[error("`{call}` failed: {reason}")]
    Failed {
        /// Remote operation name
        call: &'static str,
        /// Error reported by the transport
        reason: String,
    },
}

impl CallError {
    /// Transport or remote failure of `call`.
    #[must_use]
    pub fn failed(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Failed {
            call,
            reason: reason.into(),
        }
    }
}

/// Result of a collaborator call.
pub type CallResult<T> = std::result::Result<T, CallError>;

/// Run window handed to the scheduler on finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Experiment to run
    pub experiment_id: String,
    /// Workers to start
    pub agents: Vec<String>,
    /// Window start
    pub start_time: DateTime<FixedOffset>,
    /// Window stop
    pub stop_time: DateTime<FixedOffset>,
}

/// Withdrawal of a previously submitted schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRemoval {
    /// Experiment to withdraw
    pub experiment_id: String,
    /// Workers that were scheduled
    pub agents: Vec<String>,
}

/// Worker-process supervisor.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Whether every listed worker is installed.
    async fn agents_are_installed(&self, agents: &[String]) -> CallResult<bool>;
}

/// Execution scheduler.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register a run window and its workers.
    async fn submit_experiment_schedule(&self, request: &ScheduleRequest) -> CallResult<bool>;

    /// Withdraw a run window.
    async fn remove_experiment_schedule(&self, removal: &ScheduleRemoval) -> CallResult<bool>;
}

/// Telemetry logger.
#[async_trait]
pub trait TelemetryLogger: Send + Sync {
    /// Start recording `topics` for an experiment.
    async fn start_logging_topics(&self, experiment_id: &str, topics: &[String])
        -> CallResult<bool>;

    /// Stop recording every topic of an experiment.
    async fn stop_logging_topics(&self, experiment_id: &str) -> CallResult<bool>;
}

/// Topic registry.
#[async_trait]
pub trait TopicRegistry: Send + Sync {
    /// Feedback channels of the command topics among `topics`.
    async fn get_feedback_topics(&self, topics: &[String]) -> CallResult<Vec<String>>;

    /// Status, error and sensor topics of the given plants.
    async fn get_plant_topics(&self, plants: &[String]) -> CallResult<Vec<String>>;
}

/// Handles to every collaborator.
#[derive(Clone)]
pub struct Collaborators {
    /// Process supervisor
    pub supervisor: Arc<dyn ProcessSupervisor>,
    /// Scheduler
    pub scheduler: Arc<dyn Scheduler>,
    /// Telemetry logger
    pub logger: Arc<dyn TelemetryLogger>,
    /// Topic registry
    pub topics: Arc<dyn TopicRegistry>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Await a collaborator call for at most `limit`.
///
/// # Errors
///
/// [`CallError::Timeout`] when `limit` elapses, otherwise whatever the call
/// returned.
pub async fn with_timeout<T, F>(call: &'static str, limit: Duration, fut: F) -> CallResult<T>
where
    F: Future<Output = CallResult<T>>,
{
    let result = tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(CallError::Timeout { call, after: limit }));
    if let Err(e) = &result {
        error!(call, error = %e, "RPC call failed");
    }
    result
}

/// Treat a `false` answer as [`CallError::Rejected`].
///
/// # Errors
///
/// Propagates `result` errors and rejects `Ok(false)`.
pub fn require_ack(call: &'static str, result: CallResult<bool>) -> CallResult<()> {
    match result? {
        true => Ok(()),
        false => Err(CallError::Rejected { call }),
    }
}
