//! Persistence of the experiment collection
//!
//! The whole collection is saved on every mutation and loaded once at
//! startup. Failures never stop the orchestrator: loads fall back to an
//! empty collection and saves are dropped, but both are recorded in
//! [`PersistenceHealth`] so operators can see that durable state is at risk.
//!
//! # Example
//!
//! ```rust
//! use plant_orchestrator::persistence::{MemoryStore, Persistence};
//!
//! let mut persistence = Persistence::new(MemoryStore::new());
//! assert!(persistence.load_all().is_empty());
//! persistence.save_all(&[]);
//! assert!(persistence.health().is_healthy());
//! ```

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::experiment::ExperimentRecord;
use crate::{Error, Result};

/// Durable storage for the full experiment collection.
pub trait RecordStore: Send + Sync {
    /// Read every persisted record.
    ///
    /// Returns an empty collection when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read or decoded.
    fn load_all(&self) -> Result<Vec<ExperimentRecord>>;

    /// Replace the persisted collection with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn save_all(&self, records: &[ExperimentRecord]) -> Result<()>;
}

/// Observable state of the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistenceHealth {
    /// Error from the startup load, if it failed.
    pub last_load_error: Option<String>,
    /// Error from the most recent save, cleared by the next successful one.
    pub last_save_error: Option<String>,
    /// Saves that failed since the last success.
    pub consecutive_save_failures: u32,
    /// Time of the last successful save.
    pub last_successful_save: Option<DateTime<Utc>>,
    /// Where unreadable data was moved aside, if anywhere.
    pub quarantined_file: Option<PathBuf>,
}

impl PersistenceHealth {
    /// Whether durable state matches memory and nothing was lost on load.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.last_load_error.is_none() && self.last_save_error.is_none()
    }
}

/// A [`RecordStore`] plus the health bookkeeping around it.
pub struct Persistence {
    store: Box<dyn RecordStore>,
    health: PersistenceHealth,
}

impl Persistence {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: impl RecordStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            health: PersistenceHealth::default(),
        }
    }

    /// Load the collection, falling back to empty on any failure.
    ///
    /// An empty result is not proof of an empty system; check
    /// [`Self::health`].
    pub fn load_all(&mut self) -> Vec<ExperimentRecord> {
        match self.store.load_all() {
            Ok(records) => {
                info!(count = records.len(), "Loaded experiments data");
                records
            }
            Err(e) => {
                error!(error = %e, "Failed to load experiments data, starting empty");
                if let Error::CorruptData {
                    quarantined_to: Some(path),
                    ..
                } = &e
                {
                    self.health.quarantined_file = Some(path.clone());
                }
                self.health.last_load_error = Some(e.to_string());
                Vec::new()
            }
        }
    }

    /// Overwrite the persisted collection. Failures are logged and recorded.
    pub fn save_all(&mut self, records: &[ExperimentRecord]) {
        match self.store.save_all(records) {
            Ok(()) => {
                self.health.last_save_error = None;
                self.health.consecutive_save_failures = 0;
                self.health.last_successful_save = Some(Utc::now());
            }
            Err(e) => {
                error!(
                    error = %e,
                    failures = self.health.consecutive_save_failures + 1,
                    "Failed to save experiments, the experiments data will not be persisted"
                );
                self.health.last_save_error = Some(e.to_string());
                self.health.consecutive_save_failures += 1;
            }
        }
    }

    /// Current health snapshot.
    #[must_use]
    pub const fn health(&self) -> &PersistenceHealth {
        &self.health
    }
}

/// Decode a persisted collection. Blank input is an empty collection.
fn decode_records(bytes: &[u8]) -> serde_json::Result<Vec<ExperimentRecord>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes)
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}
