// # Docker Container Source
//
// This crate lists labelled containers through the Docker Engine HTTP API.
//
// ## Behaviour
//
// - ✅ One `GET /containers/json` per call, filtered server-side by label
// - ✅ Returns container ids and labels verbatim
// - ❌ NO label parsing (owned by `DesiredStateExtractor`)
// - ❌ NO retries (the next sync cycle is the retry)
//
// ## Transport
//
// The Engine must be reachable over TCP (`http://host:2375`, or a
// socket proxy in front of `/var/run/docker.sock`).

use async_trait::async_trait;
use labeldns_core::ProviderRegistry;
use labeldns_core::config::ContainerSourceConfig;
use labeldns_core::traits::{ContainerDescriptor, ContainerSource, ContainerSourceFactory};
use labeldns_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default Docker Engine endpoint
pub const DEFAULT_DOCKER_HOST: &str = "http://localhost:2375";

/// Engine request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The subset of `ContainerSummary` this crate reads
#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

impl From<ContainerSummary> for ContainerDescriptor {
    fn from(summary: ContainerSummary) -> Self {
        ContainerDescriptor {
            id: summary.id,
            labels: summary.labels.unwrap_or_default(),
        }
    }
}

/// Docker Engine API container source
#[derive(Debug)]
pub struct DockerContainerSource {
    /// Engine endpoint without trailing slash
    host: String,

    /// HTTP client
    client: reqwest::Client,
}

impl DockerContainerSource {
    /// Create a new container source
    ///
    /// # Parameters
    ///
    /// - `host`: Engine endpoint (e.g., "http://localhost:2375")
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(Error::config("Docker host cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// The `filters` query value selecting containers that carry `label`
fn label_filter_query(label: &str) -> String {
    serde_json::json!({ "label": [label] }).to_string()
}

#[async_trait]
impl ContainerSource for DockerContainerSource {
    /// # API Call
    ///
    /// ```http
    /// GET /containers/json?filters={"label":["<label>"]}
    /// ```
    async fn list_containers(&self, label_filter: &str) -> Result<Vec<ContainerDescriptor>> {
        tracing::debug!(label = label_filter, "Listing labelled containers");

        let response = self
            .client
            .get(format!("{}/containers/json", self.host))
            .query(&[("filters", label_filter_query(label_filter))])
            .send()
            .await
            .map_err(|e| Error::container(format!("Docker request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::container(format!(
                "Docker Engine returned {}: {}",
                status,
                error_text.trim()
            )));
        }

        let summaries: Vec<ContainerSummary> = response
            .json()
            .await
            .map_err(|e| Error::container(format!("Failed to parse container list: {}", e)))?;

        tracing::debug!("Docker reported {} labelled containers", summaries.len());
        Ok(summaries.into_iter().map(ContainerDescriptor::from).collect())
    }
}

/// Factory for creating Docker container sources
pub struct DockerFactory;

impl ContainerSourceFactory for DockerFactory {
    fn create(&self, config: &ContainerSourceConfig) -> Result<Box<dyn ContainerSource>> {
        match config {
            ContainerSourceConfig::Docker { host } => {
                Ok(Box::new(DockerContainerSource::new(host.clone())?))
            }
            _ => Err(Error::config("Invalid config for Docker container source")),
        }
    }
}

/// Register the Docker container source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_container_source("docker", Box::new(DockerFactory));
}
