//! Experiment lifecycle state machine
//!
//! ```text
//! submitted ──authorise──> authorised ──finalize──> finalized ──run──> running ──finish──> finished
//!     │                        │                        │                 │
//!     └────────cancel──────────┴─────────cancel─────────┴──────cancel─────┤──fail──> failed
//!                                                                         └────────> canceled
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentState {
    /// Submitted, waiting for a supervisor.
    Submitted,
    /// Authorised by a supervisor.
    Authorised,
    /// Handed off to scheduler and logger.
    Finalized,
    /// Currently executing.
    Running,
    /// Completed normally.
    Finished,
    /// Cancelled before completion.
    Canceled,
    /// Execution failed.
    Failed,
}

impl ExperimentState {
    /// Every defined state.
    pub const ALL: [Self; 7] = [
        Self::Submitted,
        Self::Authorised,
        Self::Finalized,
        Self::Running,
        Self::Finished,
        Self::Canceled,
        Self::Failed,
    ];

    /// Wire label of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Authorised => "authorised",
            Self::Finalized => "finalized",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }

    /// Terminal states have no outgoing transitions and no longer hold plants.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Canceled | Self::Failed)
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown state label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown experiment state `{0}`")]
pub struct UnknownState(pub String);

impl FromStr for ExperimentState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// Event that drives a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Supervisor approval.
    Authorise,
    /// Abort before or during execution.
    Cancel,
    /// Hand-off to execution and telemetry.
    Finalize,
    /// Execution started.
    Run,
    /// Execution completed.
    Finish,
    /// Execution failed.
    Fail,
}

impl Trigger {
    /// Wire label of the trigger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorise => "authorise",
            Self::Cancel => "cancel",
            Self::Finalize => "finalize",
            Self::Run => "run",
            Self::Finish => "finish",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal transitions: `(trigger, sources, destination)`.
const TRANSITIONS: &[(Trigger, &[ExperimentState], ExperimentState)] = &[
    (
        Trigger::Authorise,
        &[ExperimentState::Submitted],
        ExperimentState::Authorised,
    ),
    (
        Trigger::Cancel,
        &[
            ExperimentState::Submitted,
            ExperimentState::Authorised,
            ExperimentState::Finalized,
            ExperimentState::Running,
        ],
        ExperimentState::Canceled,
    ),
    (
        Trigger::Finalize,
        &[ExperimentState::Authorised],
        ExperimentState::Finalized,
    ),
    (
        Trigger::Run,
        &[ExperimentState::Finalized],
        ExperimentState::Running,
    ),
    (
        Trigger::Finish,
        &[ExperimentState::Running],
        ExperimentState::Finished,
    ),
    (
        Trigger::Fail,
        &[ExperimentState::Running],
        ExperimentState::Failed,
    ),
];

/// Look up the destination of `trigger` fired from `from`.
#[must_use]
pub fn next_state(from: ExperimentState, trigger: Trigger) -> Option<ExperimentState> {
    TRANSITIONS
        .iter()
        .find(|(t, sources, _)| *t == trigger && sources.contains(&from))
        .map(|(_, _, dest)| *dest)
}

/// A trigger was fired from a state that does not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("can't trigger `{trigger}` from `{from}`")]
pub struct TransitionError {
    /// Attempted trigger
    pub trigger: Trigger,
    /// State the machine was in
    pub from: ExperimentState,
}

/// State machine for a single experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMachine {
    state: ExperimentState,
}

impl StateMachine {
    /// Create a machine in the initial `submitted` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ExperimentState::Submitted,
        }
    }

    /// Rebuild a machine at a persisted state.
    #[must_use]
    pub const fn restore(state: ExperimentState) -> Self {
        Self { state }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ExperimentState {
        self.state
    }

    /// Whether `trigger` is legal from the current state.
    #[must_use]
    pub fn can_trigger(&self, trigger: Trigger) -> bool {
        next_state(self.state, trigger).is_some()
    }

    /// Fire `trigger`. The machine is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the current state does not accept `trigger`.
    pub fn apply(&mut self, trigger: Trigger) -> Result<ExperimentState, TransitionError> {
        let next = next_state(self.state, trigger).ok_or(TransitionError {
            trigger,
            from: self.state,
        })?;
        self.state = next;
        Ok(next)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
