//! Experiment Record - a reservation of plants for a time window

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::{ExperimentState, ValidationError};

/// Persisted state label of a record.
///
/// Records loaded from disk may carry a label that is not a defined state.
/// Such labels are kept verbatim until the next mutation overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateLabel {
    /// One of the defined lifecycle states.
    Known(ExperimentState),
    /// Anything else found in storage.
    Unrecognised(serde_json::Value),
}

impl StateLabel {
    /// The lifecycle state, if the label is a defined one.
    #[must_use]
    pub const fn known(&self) -> Option<ExperimentState> {
        match self {
            Self::Known(state) => Some(*state),
            Self::Unrecognised(_) => None,
        }
    }
}

impl From<ExperimentState> for StateLabel {
    fn from(state: ExperimentState) -> Self {
        Self::Known(state)
    }
}

impl std::fmt::Display for StateLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(state) => write!(f, "{state}"),
            Self::Unrecognised(value) => write!(f, "{value}"),
        }
    }
}

/// Experiment Record represents one experiment tracked by the orchestrator.
///
/// Field names are the persisted wire contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    experiment_id: String,
    experimenter: String,
    description: String,
    start_time: DateTime<FixedOffset>,
    stop_time: DateTime<FixedOffset>,
    plants: Vec<String>,
    external_control: bool,
    simulation_flag: bool,
    state: StateLabel,
    authorised_name: Option<String>,
    authorised_time: Option<DateTime<FixedOffset>>,
    agents: Option<Vec<String>>,
    topics: Option<Vec<String>>,
}

impl ExperimentRecord {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(
        experiment_id: impl Into<String>,
        start_time: DateTime<FixedOffset>,
        stop_time: DateTime<FixedOffset>,
    ) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(experiment_id, start_time, stop_time)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experimenter name.
    #[must_use]
    pub fn experimenter(&self) -> &str {
        &self.experimenter
    }

    /// Get the free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the start of the reservation window.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    /// Get the end of the reservation window.
    #[must_use]
    pub const fn stop_time(&self) -> DateTime<FixedOffset> {
        self.stop_time
    }

    /// Get the reserved plants.
    #[must_use]
    pub fn plants(&self) -> &[String] {
        &self.plants
    }

    /// Whether the experiment is controlled from outside the platform.
    #[must_use]
    pub const fn external_control(&self) -> bool {
        self.external_control
    }

    /// Whether the experiment runs against simulated plants.
    #[must_use]
    pub const fn simulation_flag(&self) -> bool {
        self.simulation_flag
    }

    /// Get the persisted state label.
    #[must_use]
    pub const fn state(&self) -> &StateLabel {
        &self.state
    }

    /// Get the authorising supervisor, once authorised.
    #[must_use]
    pub fn authorised_name(&self) -> Option<&str> {
        self.authorised_name.as_deref()
    }

    /// Get the authorisation timestamp, once authorised.
    #[must_use]
    pub const fn authorised_time(&self) -> Option<DateTime<FixedOffset>> {
        self.authorised_time
    }

    /// Get the workers assigned at finalize.
    #[must_use]
    pub fn agents(&self) -> Option<&[String]> {
        self.agents.as_deref()
    }

    /// Get the telemetry topics logged for the experiment, set at finalize.
    #[must_use]
    pub fn topics(&self) -> Option<&[String]> {
        self.topics.as_deref()
    }

    /// Whether `plants` shares at least one plant with this record.
    #[must_use]
    pub fn shares_plant(&self, plants: &[String]) -> bool {
        plants.iter().any(|p| self.plants.contains(p))
    }

    pub(crate) fn set_state(&mut self, state: ExperimentState) {
        self.state = StateLabel::Known(state);
    }

    pub(crate) fn set_authorisation(&mut self, name: String, time: DateTime<FixedOffset>) {
        self.authorised_name = Some(name);
        self.authorised_time = Some(time);
    }

    pub(crate) fn set_assignment(&mut self, agents: Vec<String>, topics: Vec<String>) {
        self.agents = Some(agents);
        self.topics = Some(topics);
    }
}

/// Builder for `ExperimentRecord`.
///
/// Produces records in the initial `submitted` state.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    experiment_id: String,
    experimenter: String,
    description: String,
    start_time: DateTime<FixedOffset>,
    stop_time: DateTime<FixedOffset>,
    plants: Vec<String>,
    external_control: bool,
    simulation_flag: bool,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        start_time: DateTime<FixedOffset>,
        stop_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            experimenter: String::new(),
            description: String::new(),
            start_time,
            stop_time,
            plants: Vec::new(),
            external_control: false,
            simulation_flag: true,
        }
    }

    /// Set the experimenter name.
    #[must_use]
    pub fn experimenter(mut self, experimenter: impl Into<String>) -> Self {
        self.experimenter = experimenter.into();
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a plant. Repeated plants are kept once.
    #[must_use]
    pub fn plant(mut self, plant: impl Into<String>) -> Self {
        let plant = plant.into();
        if !self.plants.contains(&plant) {
            self.plants.push(plant);
        }
        self
    }

    /// Add several plants.
    #[must_use]
    pub fn plants<I, S>(self, plants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        plants.into_iter().fold(self, Self::plant)
    }

    /// Set the external-control flag (default `false`).
    #[must_use]
    pub const fn external_control(mut self, external_control: bool) -> Self {
        self.external_control = external_control;
        self
    }

    /// Set the simulation flag (default `true`).
    #[must_use]
    pub const fn simulation_flag(mut self, simulation_flag: bool) -> Self {
        self.simulation_flag = simulation_flag;
        self
    }

    /// Build the `ExperimentRecord`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the ID is empty, the window is not
    /// strictly ordered, or no plant was given.
    pub fn build(self) -> Result<ExperimentRecord, ValidationError> {
        if self.experiment_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("experiment_id"));
        }
        if self.stop_time <= self.start_time {
            return Err(ValidationError::TimeOrder {
                start_time: self.start_time,
                stop_time: self.stop_time,
            });
        }
        if self.plants.is_empty() {
            return Err(ValidationError::EmptyField("plants"));
        }

        Ok(ExperimentRecord {
            experiment_id: self.experiment_id,
            experimenter: self.experimenter,
            description: self.description,
            start_time: self.start_time,
            stop_time: self.stop_time,
            plants: self.plants,
            external_control: self.external_control,
            simulation_flag: self.simulation_flag,
            state: StateLabel::Known(ExperimentState::Submitted),
            authorised_name: None,
            authorised_time: None,
            agents: None,
            topics: None,
        })
    }
}
