// # IP Source Trait
//
// Defines the interface for looking up this host's public address.
//
// ## Implementations
//
// - HTTP lookup service: `labeldns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use labeldns_core::IpSource;
//
// async fn show(source: &dyn IpSource) -> labeldns_core::Result<()> {
//     let reported = source.current().await?;
//     println!("public address reported as {reported}");
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for IP source implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform one lookup request per call
///
/// ## Forbidden Capabilities
/// - ❌ Spawning polling loops (the `DynamicAddressService` scheduler
///   decides when to look up)
/// - ❌ Caching results (owned by `DynamicAddressService`)
/// - ❌ Validating the result (owned by `DynamicAddressService`, which
///   keeps its previous address when a lookup reports garbage)
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Ask the lookup service for the public address.
    ///
    /// Returns the address exactly as reported (trimmed).
    async fn current(&self) -> Result<String, crate::Error>;
}

/// Helper trait for constructing IP sources from configuration
pub trait IpSourceFactory: Send + Sync {
    /// Create an IpSource instance from configuration
    fn create(
        &self,
        config: &crate::config::IpSourceConfig,
    ) -> Result<Box<dyn IpSource>, crate::Error>;
}
