//! Experiment Lifecycle Orchestrator
//!
//! Public operation surface over the experiment collection. Operations run
//! one at a time (`&mut self`), so every mutation follows the same path
//! without interleaving: validate the trigger, fire it, patch a copy of the
//! record, swap the copy in, save the whole collection.
//!
//! ## Finalize saga
//!
//! ```text
//! agents_are_installed ──no──> NotInstalled
//!        │ yes
//! start_logging_topics ──err──> ExternalCallFailed
//!        │ ok
//! submit_experiment_schedule ──err──> stop_logging_topics ──> ExternalCallFailed
//!        │ ok
//! finalize trigger + agents/topics + save
//! ```

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::collaborators::{
    require_ack, with_timeout, CallError, Collaborators, ScheduleRemoval, ScheduleRequest,
};
use crate::config::OrchestratorConfig;
use crate::experiment::{
    find_conflict, is_available, validate_submission, ExperimentEntry, ExperimentRecord,
    ExperimentState, ExperimentStore, StateMachine, TransitionError, Trigger, ValidationError,
};
use crate::metadata::{AgentMetadata, AgentRegistry, MetadataService, MetadataUpdate};
use crate::persistence::{JsonFileStore, Persistence, PersistenceHealth, RecordStore};
use crate::{Error, Result};

/// The experiment lifecycle orchestrator.
#[derive(Debug)]
pub struct Orchestrator {
    experiments: ExperimentStore,
    persistence: Persistence,
    collaborators: Collaborators,
    metadata: MetadataService,
    call_timeout: Duration,
    resolve_plant_topics: bool,
}

impl Orchestrator {
    /// Open an orchestrator over `store`, rebuilding state machines from
    /// whatever the store holds.
    #[must_use]
    pub fn open(
        config: &OrchestratorConfig,
        store: impl RecordStore + 'static,
        collaborators: Collaborators,
    ) -> Self {
        let mut persistence = Persistence::new(store);
        let experiments = ExperimentStore::from_records(persistence.load_all());
        info!(
            identity = %config.identity,
            experiments = experiments.len(),
            "Experiment manager ready"
        );

        Self {
            experiments,
            persistence,
            collaborators,
            metadata: MetadataService::new(
                config.metadata.clone(),
                config.identity.clone(),
                config.agent_registry_identity.clone(),
            ),
            call_timeout: config.call_timeout(),
            resolve_plant_topics: config.resolve_plant_topics,
        }
    }

    /// Open an orchestrator persisting to `config.experiments_data_path`.
    #[must_use]
    pub fn from_config(config: &OrchestratorConfig, collaborators: Collaborators) -> Self {
        let store = JsonFileStore::new(&config.experiments_data_path);
        Self::open(config, store, collaborators)
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    /// Validate and register a new experiment in the `submitted` state.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`], [`Error::AlreadyExists`] or
    /// [`Error::ResourceConflict`].
    pub fn submit(&mut self, payload: &Value) -> Result<String> {
        let record = validate_submission(payload).map_err(|e| {
            warn!(error = %e, "Experiment validation failed");
            e
        })?;
        let experiment_id = record.experiment_id().to_string();

        if self.experiments.contains(&experiment_id) {
            warn!(experiment_id = %experiment_id, "Could not submit the experiment, the ID already exists");
            return Err(Error::AlreadyExists(experiment_id));
        }

        if let Some(blocking) = find_conflict(
            self.experiments.entries(),
            &experiment_id,
            record.plants(),
            record.start_time(),
            record.stop_time(),
        ) {
            let conflicting_id = blocking.record().experiment_id().to_string();
            warn!(
                experiment_id = %experiment_id,
                conflicting_id = %conflicting_id,
                "Could not submit the experiment, plants are not available for the selected time slot"
            );
            return Err(Error::ResourceConflict {
                experiment_id,
                conflicting_id,
            });
        }

        self.experiments
            .insert(ExperimentEntry::new(record, StateMachine::new()))?;
        self.persist();

        info!(experiment_id = %experiment_id, "Experiment submitted");
        Ok(experiment_id)
    }

    /// Record a supervisor's approval.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a blank name, [`Error::NotFound`] or
    /// [`Error::InvalidTransition`].
    pub fn authorise(&mut self, experiment_id: &str, supervisor_name: &str) -> Result<()> {
        if supervisor_name.trim().is_empty() {
            warn!(experiment_id, "Could not authorise the experiment, supervisor name not provided");
            return Err(ValidationError::EmptyField("supervisor_name").into());
        }

        let name = supervisor_name.to_string();
        let now = Utc::now().fixed_offset();
        self.transition(experiment_id, Trigger::Authorise, |record| {
            record.set_authorisation(name, now);
        })?;

        info!(experiment_id, supervisor = supervisor_name, "Experiment authorised");
        Ok(())
    }

    /// Hand an authorised experiment off to telemetry and scheduling.
    ///
    /// `topics` may be empty. Feedback channels of command topics and, when
    /// enabled, plant topics are merged in before logging starts.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an empty agent list, [`Error::NotFound`],
    /// [`Error::InvalidTransition`], [`Error::NotInstalled`] or
    /// [`Error::ExternalCallFailed`]. On error the record is unchanged.
    pub async fn finalize(
        &mut self,
        experiment_id: &str,
        agents: Vec<String>,
        topics: Vec<String>,
    ) -> Result<()> {
        if agents.is_empty() {
            warn!(experiment_id, "Could not finalize the experiment, no agents are listed");
            return Err(ValidationError::EmptyField("agents").into());
        }
        if topics.is_empty() {
            warn!(experiment_id, "No topics to log are provided for the experiment");
        }

        let entry = self.entry(experiment_id)?;
        if !entry.machine().can_trigger(Trigger::Finalize) {
            let err = TransitionError {
                trigger: Trigger::Finalize,
                from: entry.state(),
            };
            warn!(experiment_id, error = %err, "Could not finalize the experiment");
            return Err(err.into());
        }
        let record = entry.record().clone();

        let topics = self.resolve_topics(&record, topics).await;
        self.run_finalize_saga(&record, &agents, &topics).await?;

        self.transition(experiment_id, Trigger::Finalize, |record| {
            record.set_assignment(agents, topics);
        })?;

        info!(experiment_id, "Experiment finalized and ready to start");
        Ok(())
    }

    /// Cancel an experiment that has not reached a terminal state.
    ///
    /// Cancelling a finalized or running experiment also withdraws its
    /// schedule and stops its telemetry; those calls are best-effort.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::InvalidTransition`].
    pub async fn cancel(&mut self, experiment_id: &str) -> Result<()> {
        let previous = self.entry(experiment_id)?.state();
        self.transition(experiment_id, Trigger::Cancel, |_| {})?;

        if matches!(
            previous,
            ExperimentState::Finalized | ExperimentState::Running
        ) {
            let agents = self
                .experiments
                .get(experiment_id)
                .and_then(|e| e.record().agents().map(<[String]>::to_vec))
                .unwrap_or_default();
            self.withdraw_schedule(experiment_id, agents).await;
            self.stop_logging(experiment_id).await;
        }

        info!(experiment_id, from = %previous, "Experiment canceled");
        Ok(())
    }

    /// Delete a finished, canceled or failed experiment.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::InvalidState`].
    pub fn remove(&mut self, experiment_id: &str) -> Result<ExperimentRecord> {
        let state = self.entry(experiment_id)?.state();
        if !state.is_terminal() {
            warn!(
                experiment_id,
                state = %state,
                "Can not remove experiment, its state should be canceled, finished or failed"
            );
            return Err(Error::InvalidState {
                experiment_id: experiment_id.to_string(),
                operation: "remove",
                state,
            });
        }

        let removed = self
            .experiments
            .remove(experiment_id)
            .ok_or_else(|| Error::NotFound(experiment_id.to_string()))?;
        self.persist();

        info!(experiment_id, "Experiment removed");
        Ok(removed.into_record())
    }

    /// Scheduler callback: the experiment started.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::InvalidTransition`].
    pub fn mark_running(&mut self, experiment_id: &str) -> Result<()> {
        self.transition(experiment_id, Trigger::Run, |_| {})?;
        info!(experiment_id, "Experiment started");
        Ok(())
    }

    /// Scheduler callback: the experiment completed. Stops telemetry.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::InvalidTransition`].
    pub async fn mark_finished(&mut self, experiment_id: &str) -> Result<()> {
        self.transition(experiment_id, Trigger::Finish, |_| {})?;
        self.stop_logging(experiment_id).await;
        info!(experiment_id, "Experiment finished");
        Ok(())
    }

    /// Scheduler callback: the experiment failed. Stops telemetry.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::InvalidTransition`].
    pub async fn mark_failed(&mut self, experiment_id: &str) -> Result<()> {
        self.transition(experiment_id, Trigger::Fail, |_| {})?;
        self.stop_logging(experiment_id).await;
        warn!(experiment_id, "Experiment failed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// IDs of every tracked experiment.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.experiments.ids()
    }

    /// Copy of every record.
    #[must_use]
    pub fn list_all(&self) -> Vec<ExperimentRecord> {
        self.experiments.records()
    }

    /// Copy of one record.
    #[must_use]
    pub fn get(&self, experiment_id: &str) -> Option<ExperimentRecord> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.record().clone())
    }

    /// Authoritative state of one experiment.
    #[must_use]
    pub fn state(&self, experiment_id: &str) -> Option<ExperimentState> {
        self.experiments.get(experiment_id).map(ExperimentEntry::state)
    }

    /// Whether `plants` are free for the window, ignoring `candidate_id`.
    #[must_use]
    pub fn is_available(
        &self,
        candidate_id: &str,
        plants: &[String],
        start: DateTime<FixedOffset>,
        stop: DateTime<FixedOffset>,
    ) -> bool {
        is_available(self.experiments.entries(), candidate_id, plants, start, stop)
    }

    /// Health of the persistence layer.
    #[must_use]
    pub const fn persistence_health(&self) -> &PersistenceHealth {
        self.persistence.health()
    }

    /// Metadata describing this agent.
    #[must_use]
    pub const fn agent_data(&self) -> &AgentMetadata {
        self.metadata.agent_data()
    }

    /// Register this agent's metadata. Best-effort.
    pub async fn register_metadata(&self, registry: &dyn AgentRegistry) -> bool {
        self.metadata.register(registry, self.call_timeout).await
    }

    /// Apply a metadata change and re-register. Registration is best-effort.
    pub async fn update_metadata(
        &mut self,
        update: MetadataUpdate,
        registry: &dyn AgentRegistry,
    ) -> bool {
        self.metadata.update(update);
        info!("Agent metadata updated, registering again");
        self.register_metadata(registry).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn entry(&self, experiment_id: &str) -> Result<&ExperimentEntry> {
        self.experiments.get(experiment_id).ok_or_else(|| {
            warn!(experiment_id, "Experiment ID not found");
            Error::NotFound(experiment_id.to_string())
        })
    }

    fn transition<F>(
        &mut self,
        experiment_id: &str,
        trigger: Trigger,
        patch: F,
    ) -> Result<ExperimentState>
    where
        F: FnOnce(&mut ExperimentRecord),
    {
        match self.experiments.transition(experiment_id, trigger, patch) {
            Ok(state) => {
                self.persist();
                Ok(state)
            }
            Err(e) => {
                warn!(experiment_id, trigger = %trigger, error = %e, "Failed to update experiment state");
                Err(e)
            }
        }
    }

    fn persist(&mut self) {
        let records = self.experiments.records();
        self.persistence.save_all(&records);
    }

    async fn resolve_topics(&self, record: &ExperimentRecord, requested: Vec<String>) -> Vec<String> {
        let mut topics = Vec::with_capacity(requested.len());
        merge_unique(&mut topics, requested);

        if !topics.is_empty() {
            let call = self.collaborators.topics.get_feedback_topics(&topics);
            let feedback = with_timeout("get_feedback_topics", self.call_timeout, call).await;
            if let Ok(feedback) = feedback {
                merge_unique(&mut topics, feedback);
            }
        }

        if self.resolve_plant_topics {
            let call = self.collaborators.topics.get_plant_topics(record.plants());
            let plant_topics = with_timeout("get_plant_topics", self.call_timeout, call).await;
            if let Ok(plant_topics) = plant_topics {
                merge_unique(&mut topics, plant_topics);
            }
        }

        topics
    }

    async fn run_finalize_saga(
        &self,
        record: &ExperimentRecord,
        agents: &[String],
        topics: &[String],
    ) -> Result<()> {
        let experiment_id = record.experiment_id();
        let external = |source: CallError| Error::ExternalCallFailed {
            experiment_id: experiment_id.to_string(),
            source,
        };

        let call = self.collaborators.supervisor.agents_are_installed(agents);
        let installed = with_timeout("agents_are_installed", self.call_timeout, call)
            .await
            .map_err(external)?;
        if !installed {
            warn!(experiment_id, ?agents, "Could not finalize the experiment, not all agents are installed");
            return Err(Error::NotInstalled {
                experiment_id: experiment_id.to_string(),
                agents: agents.to_vec(),
            });
        }

        let call = self.collaborators.logger.start_logging_topics(experiment_id, topics);
        let started = with_timeout("start_logging_topics", self.call_timeout, call).await;
        if let Err(e) = require_ack("start_logging_topics", started) {
            // The logger may have acted on a call it never answered.
            if matches!(e, CallError::Timeout { .. }) {
                self.stop_logging(experiment_id).await;
            }
            warn!(experiment_id, error = %e, "Could not finalize the experiment, logging did not start");
            return Err(external(e));
        }

        let request = ScheduleRequest {
            experiment_id: experiment_id.to_string(),
            agents: agents.to_vec(),
            start_time: record.start_time(),
            stop_time: record.stop_time(),
        };
        let call = self.collaborators.scheduler.submit_experiment_schedule(&request);
        let scheduled = with_timeout("submit_experiment_schedule", self.call_timeout, call).await;
        if let Err(e) = require_ack("submit_experiment_schedule", scheduled) {
            warn!(experiment_id, error = %e, "Scheduler submission failed, stopping topic logging");
            self.stop_logging(experiment_id).await;
            return Err(external(e));
        }

        Ok(())
    }

    async fn stop_logging(&self, experiment_id: &str) {
        let call = self.collaborators.logger.stop_logging_topics(experiment_id);
        let stopped = with_timeout("stop_logging_topics", self.call_timeout, call).await;
        if let Err(e) = require_ack("stop_logging_topics", stopped) {
            warn!(experiment_id, error = %e, "Could not stop logging topics for experiment");
        }
    }

    async fn withdraw_schedule(&self, experiment_id: &str, agents: Vec<String>) {
        let removal = ScheduleRemoval {
            experiment_id: experiment_id.to_string(),
            agents,
        };
        let call = self.collaborators.scheduler.remove_experiment_schedule(&removal);
        let removed = with_timeout("remove_experiment_schedule", self.call_timeout, call).await;
        if let Err(e) = require_ack("remove_experiment_schedule", removed) {
            warn!(experiment_id, error = %e, "Could not withdraw experiment schedule");
        }
    }
}

/// Append the items of `extra` not already present in `topics`.
fn merge_unique(topics: &mut Vec<String>, extra: Vec<String>) {
    for topic in extra {
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_unique_keeps_first_occurrence_order() {
        let mut topics = Vec::new();
        merge_unique(&mut topics, vec!["a".into(), "b".into(), "a".into()]);
        merge_unique(&mut topics, vec!["c".into(), "b".into()]);
        assert_eq!(topics, ["a", "b", "c"]);
    }
}
