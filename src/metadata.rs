//! Agent metadata service
//!
//! Describes this orchestrator to the platform's agent registry and answers
//! metadata lookups. Held by the orchestrator and invoked explicitly.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{with_timeout, CallResult};

/// Role that is never registered (the agent manager registers itself).
const AGENT_MANAGER_ROLE: &str = "Agent Manager";

/// Descriptive metadata of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentMetadata {
    /// Platform identity
    pub identity: String,
    /// Roles the agent fulfils
    pub role: Vec<String>,
    /// Free text
    pub description: String,
    /// Agent version
    pub version: String,
    /// Agent author
    pub author: String,
}

impl Default for AgentMetadata {
    fn default() -> Self {
        Self {
            identity: "unknown".to_string(),
            role: Vec::new(),
            description: "unknown".to_string(),
            version: "unknown".to_string(),
            author: "unknown".to_string(),
        }
    }
}

/// Partial metadata change. Absent keys leave the current value alone.
///
/// The identity is not updatable; an `identity` key is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    /// New roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Vec<String>>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// New author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Registry of agents on the platform.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Register or refresh an agent's metadata.
    async fn register_agent(&self, identity: &str, metadata: &AgentMetadata) -> CallResult<bool>;
}

/// Metadata this agent exposes, plus registration at the registry.
#[derive(Debug, Clone)]
pub struct MetadataService {
    metadata: AgentMetadata,
    registry_identity: String,
}

impl MetadataService {
    /// Service for the agent running as `identity`.
    #[must_use]
    pub fn new(
        mut metadata: AgentMetadata,
        identity: impl Into<String>,
        registry_identity: impl Into<String>,
    ) -> Self {
        metadata.identity = identity.into();
        Self {
            metadata,
            registry_identity: registry_identity.into(),
        }
    }

    /// Metadata served to lookups.
    #[must_use]
    pub const fn agent_data(&self) -> &AgentMetadata {
        &self.metadata
    }

    /// Overwrite the keys present in `update`.
    pub fn update(&mut self, update: MetadataUpdate) {
        let MetadataUpdate {
            role,
            description,
            version,
            author,
        } = update;
        if let Some(role) = role {
            self.metadata.role = role;
        }
        if let Some(description) = description {
            self.metadata.description = description;
        }
        if let Some(version) = version {
            self.metadata.version = version;
        }
        if let Some(author) = author {
            self.metadata.author = author;
        }
        debug!(metadata = ?self.metadata, "Updated agent metadata");
    }

    /// Register at the agent registry. Best-effort: failures are logged.
    pub async fn register(&self, registry: &dyn AgentRegistry, timeout: Duration) -> bool {
        if self.registry_identity.is_empty() {
            warn!("Agent registry identity is not set");
            return false;
        }
        if self.registry_identity == self.metadata.identity {
            info!("This agent is the agent registry, skipping registration");
            return true;
        }
        if self.metadata.role.iter().any(|r| r == AGENT_MANAGER_ROLE) {
            info!("Ignoring registration for the agent manager");
            return true;
        }

        let call = registry.register_agent(&self.metadata.identity, &self.metadata);
        match with_timeout("register_agent", timeout, call).await {
            Ok(true) => {
                info!(registry = %self.registry_identity, "Registered at agent registry");
                true
            }
            Ok(false) => {
                warn!(registry = %self.registry_identity, "Agent registry refused registration");
                false
            }
            Err(e) => {
                warn!(registry = %self.registry_identity, error = %e, "Failed to register at agent registry");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::CallError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRegistry {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AgentRegistry for RecordingRegistry {
        async fn register_agent(&self, identity: &str, _: &AgentMetadata) -> CallResult<bool> {
            self.calls.lock().unwrap().push(identity.to_string());
            if self.fail {
                Err(CallError::failed("register_agent", "unreachable"))
            } else {
                Ok(true)
            }
        }
    }

    fn service(role: &[&str]) -> MetadataService {
        let metadata = AgentMetadata {
            role: role.iter().map(ToString::to_string).collect(),
            ..AgentMetadata::default()
        };
        MetadataService::new(metadata, "expmanager", "agentregistry")
    }

    #[tokio::test]
    async fn test_register_sends_identity() {
        let registry = RecordingRegistry::default();
        assert!(service(&[]).register(&registry, Duration::from_secs(1)).await);
        assert_eq!(*registry.calls.lock().unwrap(), ["expmanager"]);
    }

    #[tokio::test]
    async fn test_register_failure_is_not_fatal() {
        let registry = RecordingRegistry {
            fail: true,
            ..RecordingRegistry::default()
        };
        assert!(!service(&[]).register(&registry, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_agent_manager_is_skipped() {
        let registry = RecordingRegistry::default();
        assert!(service(&["Agent Manager"]).register(&registry, Duration::from_secs(1)).await);
        assert!(registry.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_update_overwrites_only_present_keys() {
        let mut service = MetadataService::new(
            AgentMetadata {
                author: "Dany".into(),
                version: "0.1".into(),
                ..AgentMetadata::default()
            },
            "expmanager",
            "agentregistry",
        );
        let update: MetadataUpdate =
            serde_json::from_str(r#"{"version": "0.2", "identity": "spoofed"}"#).unwrap();
        service.update(update);

        let data = service.agent_data();
        assert_eq!(data.identity, "expmanager");
        assert_eq!(data.version, "0.2");
        assert_eq!(data.author, "Dany");
    }
}
