//! Orchestrator configuration
//!
//! Loaded from a JSON file. Every key is optional:
//!
//! ```json
//! {
//!     "identity": "expmanageragent-0.1_1",
//!     "experiments_data_path": "/var/lib/expmanager/experimentsdata.json",
//!     "call_timeout_ms": 2000,
//!     "resolve_plant_topics": true,
//!     "agent_registry_identity": "agentregistryagent-0.1_1",
//!     "metadata": { "role": ["Experiment Manager"], "version": "0.1" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metadata::AgentMetadata;
use crate::{Error, Result};

/// Default location of the experiment collection.
pub const DEFAULT_EXPERIMENTS_DATA_PATH: &str = "experimentsdata.json";

/// Default collaborator call timeout.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 2000;

/// Default identity of this agent.
pub const DEFAULT_IDENTITY: &str = "expmanageragent-0.1_1";

/// Default identity of the agent registry.
pub const DEFAULT_AGENT_REGISTRY_IDENTITY: &str = "agentregistryagent-0.1_1";

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Platform identity of the orchestrator.
    pub identity: String,
    /// JSON file holding the experiment collection.
    pub experiments_data_path: PathBuf,
    /// Timeout for each collaborator call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Add the plants' status, error and sensor topics on finalize.
    pub resolve_plant_topics: bool,
    /// Identity of the agent registry.
    pub agent_registry_identity: String,
    /// Metadata served to the agent registry.
    pub metadata: AgentMetadata,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            experiments_data_path: PathBuf::from(DEFAULT_EXPERIMENTS_DATA_PATH),
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            resolve_plant_topics: true,
            agent_registry_identity: DEFAULT_AGENT_REGISTRY_IDENTITY.to_string(),
            metadata: AgentMetadata::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Read a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_json(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on malformed JSON or mistyped keys.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a config file, falling back to defaults if it is absent or broken.
    #[must_use]
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            warn!(error = %e, "Using default configuration");
            Self::default()
        })
    }

    /// Timeout applied to each collaborator call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Set the data file.
    #[must_use]
    pub fn with_experiments_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.experiments_data_path = path.into();
        self
    }

    /// Set the collaborator call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable plant topic resolution.
    #[must_use]
    pub const fn with_plant_topics(mut self, resolve: bool) -> Self {
        self.resolve_plant_topics = resolve;
        self
    }
}
