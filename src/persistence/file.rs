//! JSON file backend.
//!
//! The collection is stored as a pretty-printed JSON list. Writes go to a
//! sibling temp file that is renamed over the target, so a crash mid-write
//! leaves the previous collection intact.
//!
//! A data file that exists but cannot be read or decoded is moved aside
//! before anything new is written. If it cannot be moved, saves are refused
//! for the lifetime of the store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{error, info, warn};

use super::{decode_records, RecordStore};
use crate::experiment::ExperimentRecord;
use crate::{Error, Result};

/// Experiment collection stored in a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    overwrite_blocked: AtomicBool,
}

impl JsonFileStore {
    /// Store backed by the file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overwrite_blocked: AtomicBool::new(false),
        }
    }

    /// Path of the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a failed load of an existing file, moving the file aside.
    fn unreadable(&self, reason: String) -> Error {
        let quarantined_to = self.quarantine();
        if quarantined_to.is_none() {
            self.overwrite_blocked.store(true, Ordering::SeqCst);
            error!(path = %self.path.display(), "Unreadable experiments data left in place, saves are disabled");
        }
        Error::CorruptData {
            path: self.path.clone(),
            quarantined_to,
            reason,
        }
    }

    /// Move unreadable data aside so the next save cannot overwrite it.
    fn quarantine(&self) -> Option<PathBuf> {
        let name = self.path.file_name()?.to_string_lossy().into_owned();
        let target = self.path.with_file_name(format!(
            "{name}.corrupt-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        ));
        match fs::rename(&self.path, &target) {
            Ok(()) => {
                warn!(from = %self.path.display(), to = %target.display(), "Quarantined corrupt experiments data");
                Some(target)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not quarantine corrupt experiments data");
                None
            }
        }
    }
}

impl RecordStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<ExperimentRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No experiments data file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.unreadable(e.to_string())),
        };

        decode_records(&bytes).map_err(|e| self.unreadable(e.to_string()))
    }

    fn save_all(&self, records: &[ExperimentRecord]) -> Result<()> {
        if self.overwrite_blocked.load(Ordering::SeqCst) {
            return Err(Error::CorruptData {
                path: self.path.clone(),
                quarantined_to: None,
                reason: "unreadable data could not be moved aside, refusing to overwrite".into(),
            });
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_vec_pretty(records)?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
