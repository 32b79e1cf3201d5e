//! Experiment Store - in-memory collection of tracked experiments
//!
//! Each entry owns its record and its state machine, so the two cannot
//! drift apart. Entries are keyed by experiment ID.

use std::collections::BTreeMap;

use tracing::warn;

use super::{ExperimentRecord, ExperimentState, StateMachine, Trigger};
use crate::{Error, Result};

/// A tracked experiment: persisted record plus its live state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentEntry {
    record: ExperimentRecord,
    machine: StateMachine,
}

impl ExperimentEntry {
    /// Pair a record with a machine.
    #[must_use]
    pub const fn new(record: ExperimentRecord, machine: StateMachine) -> Self {
        Self { record, machine }
    }

    /// Rebuild an entry from a persisted record.
    ///
    /// A record whose state label is not a defined state gets a machine
    /// forced into `failed`; the record keeps its label until the next
    /// mutation.
    #[must_use]
    pub fn restore(record: ExperimentRecord) -> Self {
        let machine = match record.state().known() {
            Some(state) => StateMachine::restore(state),
            None => {
                warn!(
                    experiment_id = record.experiment_id(),
                    state = %record.state(),
                    "Could not reinstate experiment state, the experiment will be initiated as failed"
                );
                StateMachine::restore(ExperimentState::Failed)
            }
        };
        Self { record, machine }
    }

    /// Get the record.
    #[must_use]
    pub const fn record(&self) -> &ExperimentRecord {
        &self.record
    }

    /// Get the state machine.
    #[must_use]
    pub const fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Take the record, dropping the machine.
    #[must_use]
    pub fn into_record(self) -> ExperimentRecord {
        self.record
    }

    /// Authoritative lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ExperimentState {
        self.machine.state()
    }
}

/// In-memory store for tracked experiments.
#[derive(Debug, Default)]
pub struct ExperimentStore {
    entries: BTreeMap<String, ExperimentEntry>,
}

impl ExperimentStore {
    /// Create a new empty experiment store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records.
    ///
    /// Duplicate IDs keep their first occurrence.
    #[must_use]
    pub fn from_records(records: Vec<ExperimentRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            let id = record.experiment_id().to_string();
            if store.entries.contains_key(&id) {
                warn!(experiment_id = %id, "Duplicate experiment in persisted data, keeping the first");
                continue;
            }
            store.entries.insert(id, ExperimentEntry::restore(record));
        }
        store
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether an experiment with this ID is tracked.
    #[must_use]
    pub fn contains(&self, experiment_id: &str) -> bool {
        self.entries.contains_key(experiment_id)
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get(&self, experiment_id: &str) -> Option<&ExperimentEntry> {
        self.entries.get(experiment_id)
    }

    /// Iterate over all entries, ordered by ID.
    pub fn entries(&self) -> impl Iterator<Item = &ExperimentEntry> {
        self.entries.values()
    }

    /// IDs of all tracked experiments.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Copy of every record, in ID order.
    #[must_use]
    pub fn records(&self) -> Vec<ExperimentRecord> {
        self.entries.values().map(|e| e.record.clone()).collect()
    }

    /// Add a freshly submitted experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if the ID is taken.
    pub fn insert(&mut self, entry: ExperimentEntry) -> Result<()> {
        let id = entry.record.experiment_id().to_string();
        if self.entries.contains_key(&id) {
            return Err(Error::AlreadyExists(id));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    /// Remove an experiment, returning it.
    pub fn remove(&mut self, experiment_id: &str) -> Option<ExperimentEntry> {
        self.entries.remove(experiment_id)
    }

    /// Fire `trigger` and apply `patch` to a copy of the record, then swap
    /// the copy in. Nothing changes unless the trigger is legal.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown ID, [`Error::InvalidTransition`]
    /// if the machine rejects the trigger.
    pub fn transition<F>(
        &mut self,
        experiment_id: &str,
        trigger: Trigger,
        patch: F,
    ) -> Result<ExperimentState>
    where
        F: FnOnce(&mut ExperimentRecord),
    {
        let entry = self
            .entries
            .get_mut(experiment_id)
            .ok_or_else(|| Error::NotFound(experiment_id.to_string()))?;

        let mut machine = entry.machine;
        let next = machine.apply(trigger)?;

        let mut updated = entry.record.clone();
        updated.set_state(next);
        patch(&mut updated);

        entry.machine = machine;
        entry.record = updated;
        Ok(next)
    }
}
