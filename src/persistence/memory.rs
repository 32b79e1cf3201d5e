//! In-memory backend.
//!
//! Holds the serialized collection so loads go through the same decoding as
//! the file backend. Clones share storage, which lets tests keep a handle
//! after handing the store to an orchestrator.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{decode_records, RecordStore};
use crate::experiment::ExperimentRecord;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    raw: Option<Vec<u8>>,
    fail_saves: bool,
    saves: usize,
}

/// In-memory record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `records`.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be serialized.
    pub fn with_records(records: &[ExperimentRecord]) -> Result<Self> {
        let store = Self::new();
        store.lock()?.raw = Some(serde_json::to_vec(records)?);
        Ok(store)
    }

    /// Replace the stored bytes verbatim.
    pub fn set_raw(&self, raw: Vec<u8>) {
        if let Ok(mut inner) = self.lock() {
            inner.raw = Some(raw);
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.fail_saves = fail;
        }
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().map_or(0, |inner| inner.saves)
    }

    /// Decode what is currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored bytes are not a valid collection.
    pub fn snapshot(&self) -> Result<Vec<ExperimentRecord>> {
        self.load_all()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Io(io::Error::other("memory store lock poisoned")))
    }
}

impl RecordStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<ExperimentRecord>> {
        let inner = self.lock()?;
        let Some(raw) = inner.raw.as_deref() else {
            return Ok(Vec::new());
        };
        decode_records(raw).map_err(|e| Error::CorruptData {
            path: PathBuf::from(":memory:"),
            quarantined_to: None,
            reason: e.to_string(),
        })
    }

    fn save_all(&self, records: &[ExperimentRecord]) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.fail_saves {
            return Err(Error::Io(io::Error::other("simulated write failure")));
        }
        inner.raw = Some(serde_json::to_vec(records)?);
        inner.saves += 1;
        Ok(())
    }
}
