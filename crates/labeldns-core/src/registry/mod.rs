//! Plugin-based provider registry
//!
//! The registry allows DNS providers, container sources and IP sources to
//! be registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labeldns_core::registry::ProviderRegistry;
//! use labeldns_core::config::ProviderConfig;
//!
//! // Create a registry
//! let registry = ProviderRegistry::new();
//!
//! // Register providers
//! registry.register_provider("cloudflare", Box::new(cloudflare_factory));
//!
//! // Create provider from config
//! let config = ProviderConfig::Cloudflare { ... };
//! let provider = registry.create_provider(&config)?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! # use labeldns_core::registry::ProviderRegistry;
//!
//! // In labeldns-provider-cloudflare crate
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider(
//!         "cloudflare",
//!         Box::new(CloudflareFactory),
//!     );
//! }
//! ```

use crate::config::{ContainerSourceConfig, IpSourceConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{ContainerSource, DnsProvider, IpSource};
use crate::traits::{ContainerSourceFactory, DnsProviderFactory, IpSourceFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Provider registry for plugin-based collaborator creation
///
/// The registry maintains a map of type names to factory objects,
/// allowing dynamic instantiation of collaborators based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered container source factories
    container_sources: RwLock<HashMap<String, Box<dyn ContainerSourceFactory>>>,

    /// Registered IP source factories
    ip_sources: RwLock<HashMap<String, Box<dyn IpSourceFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        write(&self.providers).insert(name.into(), factory);
    }

    /// Register a container source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Container source type name (e.g., "docker")
    /// - `factory`: Factory object for creating container source instances
    pub fn register_container_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ContainerSourceFactory>,
    ) {
        write(&self.container_sources).insert(name.into(), factory);
    }

    /// Register an IP source factory
    ///
    /// # Parameters
    ///
    /// - `name`: IP source type name (e.g., "http")
    /// - `factory`: Factory object for creating IP source instances
    pub fn register_ip_source(&self, name: impl Into<String>, factory: Box<dyn IpSourceFactory>) {
        write(&self.ip_sources).insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = read(&self.providers);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a container source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ContainerSource>)`: Created container source instance
    /// - `Err(Error)`: If source type is not registered or creation fails
    pub fn create_container_source(
        &self,
        config: &ContainerSourceConfig,
    ) -> Result<Box<dyn ContainerSource>> {
        let source_type = config.type_name();
        let sources = read(&self.container_sources);

        let factory = sources.get(source_type).ok_or_else(|| {
            Error::config(format!("Unknown container source type: {}", source_type))
        })?;

        factory.create(config)
    }

    /// Create an IP source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn IpSource>)`: Created IP source instance
    /// - `Err(Error)`: If source type is not registered or creation fails
    pub fn create_ip_source(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        let source_type = config.type_name();
        let sources = read(&self.ip_sources);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown IP source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        read(&self.providers).keys().cloned().collect()
    }

    /// List all registered container source types
    pub fn list_container_sources(&self) -> Vec<String> {
        read(&self.container_sources).keys().cloned().collect()
    }

    /// List all registered IP source types
    pub fn list_ip_sources(&self) -> Vec<String> {
        read(&self.ip_sources).keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        read(&self.providers).contains_key(name)
    }

    /// Check if a container source type is registered
    pub fn has_container_source(&self, name: &str) -> bool {
        read(&self.container_sources).contains_key(name)
    }

    /// Check if an IP source type is registered
    pub fn has_ip_source(&self, name: &str) -> bool {
        read(&self.ip_sources).contains_key(name)
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
