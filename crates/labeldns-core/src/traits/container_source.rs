// # Container Source Trait
//
// Defines the interface for discovering containers that carry DNS
// declarations in their labels.
//
// ## Implementations
//
// - Docker Engine API: `labeldns-docker` crate

use async_trait::async_trait;
use std::collections::HashMap;

/// The parts of a container this system looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDescriptor {
    /// Runtime-assigned container id
    pub id: String,
    /// All labels attached to the container
    pub labels: HashMap<String, String>,
}

impl ContainerDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: HashMap::new(),
        }
    }

    /// Attach a label (builder style)
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Trait for container runtime implementations
///
/// # Trust Level: Untrusted
///
/// Like DNS providers, container sources are single-shot transports: one
/// call, no retries, no caching.
#[async_trait]
pub trait ContainerSource: Send + Sync {
    /// List the containers carrying the label `label_filter`
    async fn list_containers(
        &self,
        label_filter: &str,
    ) -> Result<Vec<ContainerDescriptor>, crate::Error>;
}

/// Helper trait for constructing container sources from configuration
pub trait ContainerSourceFactory: Send + Sync {
    /// Create a ContainerSource instance from configuration
    fn create(
        &self,
        config: &crate::config::ContainerSourceConfig,
    ) -> Result<Box<dyn ContainerSource>, crate::Error>;
}
