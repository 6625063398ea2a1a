//! Configuration types for the labeldns system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default project label, the first half of the tracking identifier
pub const DEFAULT_PROJECT_LABEL: &str = "docker-compose-external-dns";

/// Default instance id, the second half of the tracking identifier
pub const DEFAULT_INSTANCE_ID: &str = "1";

/// Main labeldns configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Identity of this deployment
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Container runtime configuration
    #[serde(default)]
    pub containers: ContainerSourceConfig,

    /// Public address lookup configuration
    #[serde(default)]
    pub ip_source: IpSourceConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.tracking.validate()?;
        self.provider.validate()?;
        self.containers.validate()?;
        self.ip_source.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Identity of one deployment.
///
/// Several deployments may share a provider account; each only ever sees
/// and touches the records carrying its own tracking identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_project_label")]
    pub project_label: String,

    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

impl TrackingConfig {
    pub fn new(project_label: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            project_label: project_label.into(),
            instance_id: instance_id.into(),
        }
    }

    /// The container label key and provider comment tag of this deployment
    pub fn tracking_id(&self) -> String {
        format!("{}.{}", self.project_label, self.instance_id)
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        for (field, value) in [
            ("project_label", &self.project_label),
            ("instance_id", &self.instance_id),
        ] {
            if value.is_empty() {
                return Err(crate::Error::config(format!("{field} cannot be empty")));
            }
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(crate::Error::config(format!(
                    "{field} '{value}' may only contain letters, digits, '-' and '_'"
                )));
            }
        }
        Ok(())
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT_LABEL, DEFAULT_INSTANCE_ID)
    }
}

fn default_project_label() -> String {
    DEFAULT_PROJECT_LABEL.to_string()
}

fn default_instance_id() -> String {
    DEFAULT_INSTANCE_ID.to_string()
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => validate_custom("provider", factory, config),
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            api_token: String::new(),
        }
    }
}

/// Container runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerSourceConfig {
    /// Docker Engine API over TCP
    Docker {
        /// Engine endpoint, e.g. `http://localhost:2375`
        host: String,
    },

    /// Custom container source
    Custom {
        factory: String,
        config: serde_json::Value,
    },
}

impl ContainerSourceConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ContainerSourceConfig::Docker { host } => validate_url("Docker host", host),
            ContainerSourceConfig::Custom { factory, config } => {
                validate_custom("container source", factory, config)
            }
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ContainerSourceConfig::Docker { .. } => "docker",
            ContainerSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ContainerSourceConfig {
    fn default() -> Self {
        ContainerSourceConfig::Docker {
            host: "http://localhost:2375".to_string(),
        }
    }
}

/// Public address lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpSourceConfig {
    /// HTTP-based lookup service
    Http {
        /// URL to fetch the address from
        url: String,
    },

    /// Custom IP source
    Custom {
        factory: String,
        config: serde_json::Value,
    },
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IpSourceConfig::Http { url } => validate_url("IP lookup URL", url),
            IpSourceConfig::Custom { factory, config } => {
                validate_custom("IP source", factory, config)
            }
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            IpSourceConfig::Http { .. } => "http",
            IpSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        IpSourceConfig::Http {
            url: "https://ipinfo.io".to_string(),
        }
    }
}

fn validate_url(what: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{what} cannot be empty")));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(crate::Error::config(format!(
            "{what} must use the http or https scheme (got {url})"
        )));
    }
    Ok(())
}

fn validate_custom(
    what: &str,
    factory: &str,
    config: &serde_json::Value,
) -> Result<(), crate::Error> {
    if factory.is_empty() {
        return Err(crate::Error::config(format!(
            "Custom {what} factory cannot be empty"
        )));
    }
    if config.is_null() {
        return Err(crate::Error::config(format!(
            "Custom {what} config cannot be null"
        )));
    }
    Ok(())
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between the end of one sync cycle and the start of the next
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Minutes between public address lookups
    #[serde(default = "default_ddns_interval_mins")]
    pub ddns_interval_mins: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.sync_interval_secs == 0 {
            return Err(crate::Error::config("sync interval must be at least 1 second"));
        }
        if self.ddns_interval_mins == 0 {
            return Err(crate::Error::config("DDNS interval must be at least 1 minute"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// The DDNS lookup interval, converted from minutes
    pub fn ddns_interval(&self) -> Duration {
        Duration::from_secs(self.ddns_interval_mins.saturating_mul(60))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            ddns_interval_mins: default_ddns_interval_mins(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_ddns_interval_mins() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    100
}
