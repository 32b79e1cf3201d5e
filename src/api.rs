//! Remote call surface
//!
//! Each operation other platform agents may invoke, as a JSON message:
//!
//! ```json
//! {"method": "authorise_experiment",
//!  "params": {"experiment_id": "exp-001", "supervisor_name": "bob"}}
//! ```
//!
//! Parameter-less calls may omit `params`. Malformed messages and mistyped
//! parameters are reported as `validation` errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::experiment::ValidationError;
use crate::orchestrator::Orchestrator;
use crate::{Error, ErrorKind};

/// A remote operation and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RemoteCall {
    /// Register a new experiment
    SubmitExperimentData {
        /// Untrusted submission payload
        experiment_data: Value,
    },
    /// Record a supervisor's approval
    AuthoriseExperiment {
        /// Target experiment
        experiment_id: String,
        /// Approving supervisor
        supervisor_name: String,
    },
    /// Run the finalize saga
    FinalizeExperiment {
        /// Target experiment
        experiment_id: String,
        /// Workers that will run the experiment
        #[serde(alias = "agents_for_experiment")]
        agents: Vec<String>,
        /// Topics to record
        #[serde(default, alias = "topics_to_log")]
        topics: Vec<String>,
    },
    /// Cancel an experiment
    CancelExperiment {
        /// Target experiment
        experiment_id: String,
    },
    /// Delete a terminal experiment
    RemoveExperiment {
        /// Target experiment
        experiment_id: String,
    },
    /// Scheduler callback: started
    ExperimentIsRunning {
        /// Target experiment
        experiment_id: String,
    },
    /// Scheduler callback: completed
    ExperimentIsFinished {
        /// Target experiment
        experiment_id: String,
    },
    /// Scheduler callback: failed
    ExperimentIsFailed {
        /// Target experiment
        experiment_id: String,
    },
    /// IDs of every experiment
    GetListExperimentIds,
    /// Every record
    GetListAllExperimentsData,
    /// One record, or `{}` if unknown
    GetDictExperimentData {
        /// Target experiment
        experiment_id: String,
    },
    /// This agent's metadata
    GetAgentData,
    /// Persistence health signal
    GetPersistenceHealth,
}

impl RemoteCall {
    /// Decode a remote call message.
    ///
    /// # Errors
    ///
    /// Returns a `validation` [`ApiError`] for unknown methods or bad params.
    pub fn from_value(message: Value) -> Result<Self, ApiError> {
        serde_json::from_value(message).map_err(|e| ApiError {
            kind: ErrorKind::Validation,
            message: format!("Malformed remote call: {e}"),
        })
    }

    /// Wire name of the method.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::SubmitExperimentData { .. } => "submit_experiment_data",
            Self::AuthoriseExperiment { .. } => "authorise_experiment",
            Self::FinalizeExperiment { .. } => "finalize_experiment",
            Self::CancelExperiment { .. } => "cancel_experiment",
            Self::RemoveExperiment { .. } => "remove_experiment",
            Self::ExperimentIsRunning { .. } => "experiment_is_running",
            Self::ExperimentIsFinished { .. } => "experiment_is_finished",
            Self::ExperimentIsFailed { .. } => "experiment_is_failed",
            Self::GetListExperimentIds => "get_list_experiment_ids",
            Self::GetListAllExperimentsData => "get_list_all_experiments_data",
            Self::GetDictExperimentData { .. } => "get_dict_experiment_data",
            Self::GetAgentData => "get_agent_data",
            Self::GetPersistenceHealth => "get_persistence_health",
        }
    }
}

/// Error returned to a remote caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    /// Machine-readable category
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Error::from(err).into()
    }
}

impl Orchestrator {
    /// Run a decoded remote call and encode its answer.
    ///
    /// Mutating calls answer `true`; `submit_experiment_data` answers the
    /// new experiment ID.
    ///
    /// # Errors
    ///
    /// The [`ApiError`] form of whatever the operation returned.
    pub async fn dispatch(&mut self, call: RemoteCall) -> Result<Value, ApiError> {
        tracing::debug!(method = call.method(), "Dispatching remote call");

        let answer = match call {
            RemoteCall::SubmitExperimentData { experiment_data } => {
                Value::String(self.submit(&experiment_data)?)
            }
            RemoteCall::AuthoriseExperiment {
                experiment_id,
                supervisor_name,
            } => {
                self.authorise(&experiment_id, &supervisor_name)?;
                Value::Bool(true)
            }
            RemoteCall::FinalizeExperiment {
                experiment_id,
                agents,
                topics,
            } => {
                self.finalize(&experiment_id, agents, topics).await?;
                Value::Bool(true)
            }
            RemoteCall::CancelExperiment { experiment_id } => {
                self.cancel(&experiment_id).await?;
                Value::Bool(true)
            }
            RemoteCall::RemoveExperiment { experiment_id } => {
                self.remove(&experiment_id)?;
                Value::Bool(true)
            }
            RemoteCall::ExperimentIsRunning { experiment_id } => {
                self.mark_running(&experiment_id)?;
                Value::Bool(true)
            }
            RemoteCall::ExperimentIsFinished { experiment_id } => {
                self.mark_finished(&experiment_id).await?;
                Value::Bool(true)
            }
            RemoteCall::ExperimentIsFailed { experiment_id } => {
                self.mark_failed(&experiment_id).await?;
                Value::Bool(true)
            }
            RemoteCall::GetListExperimentIds => to_json(&self.list_ids())?,
            RemoteCall::GetListAllExperimentsData => to_json(&self.list_all())?,
            RemoteCall::GetDictExperimentData { experiment_id } => {
                match self.get(&experiment_id) {
                    Some(record) => to_json(&record)?,
                    None => Value::Object(serde_json::Map::new()),
                }
            }
            RemoteCall::GetAgentData => to_json(self.agent_data())?,
            RemoteCall::GetPersistenceHealth => to_json(self.persistence_health())?,
        };

        Ok(answer)
    }

    /// Decode and run a raw remote call message.
    ///
    /// # Errors
    ///
    /// See [`RemoteCall::from_value`] and [`Orchestrator::dispatch`].
    pub async fn dispatch_value(&mut self, message: Value) -> Result<Value, ApiError> {
        let call = RemoteCall::from_value(message)?;
        self.dispatch(call).await
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| Error::from(e).into())
}
