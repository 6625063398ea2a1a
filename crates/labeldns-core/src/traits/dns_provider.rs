// # DNS Provider Trait
//
// Defines the interface for reading and writing DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `labeldns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use labeldns_core::DnsProvider;
//
// async fn first_page(provider: &dyn DnsProvider) -> labeldns_core::Result<()> {
//     let page = provider.list_zones(None).await?;
//     for zone in page.items {
//         println!("{} ({})", zone.name, zone.id);
//     }
//     Ok(())
// }
// ```

use crate::entry::Zone;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque position in a paginated listing.
///
/// Only the provider that produced a cursor knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub String);

/// One page of a paginated listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor of the next page, `None` on the last page
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    /// A page with no successor
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    pub fn has_next_page(&self) -> bool {
        self.next.is_some()
    }
}

/// A DNS record in the provider's native shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: String,
    pub name: String,
    /// Native record type, e.g. `A`, `TXT`, `SRV`
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub proxied: Option<bool>,
    #[serde(default)]
    pub priority: Option<u16>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Create/update payload for a provider record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordParams {
    /// Zone the record is written to (part of the request path)
    #[serde(skip)]
    pub zone_id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    /// Tracking comment identifying records owned by this deployment
    pub comment: String,
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are thin transports. Each method performs exactly one remote
/// call and reports success or failure.
///
/// ## Forbidden Capabilities
/// - ❌ Retrying or backing off (the next scheduled sync is the retry)
/// - ❌ Following pagination cursors (owned by `ObservedStateFetcher`)
/// - ❌ Deciding which records to write (owned by `SyncEngine`)
/// - ❌ Caching state between calls
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch one page of zones visible to the credentials.
    ///
    /// `cursor` is `None` for the first page.
    async fn list_zones(&self, cursor: Option<PageCursor>) -> Result<Page<Zone>, crate::Error>;

    /// Fetch one page of records in `zone_id` whose comment equals `comment`.
    ///
    /// Filtering is done server-side, so records not created by this
    /// deployment are never returned.
    async fn list_records(
        &self,
        zone_id: &str,
        comment: &str,
        cursor: Option<PageCursor>,
    ) -> Result<Page<ProviderRecord>, crate::Error>;

    /// Create a record
    async fn create_record(&self, params: &RecordParams) -> Result<(), crate::Error>;

    /// Replace the record `record_id` with `params`
    async fn update_record(&self, record_id: &str, params: &RecordParams)
    -> Result<(), crate::Error>;

    /// Delete the record `record_id` from `zone_id`
    async fn delete_record(&self, record_id: &str, zone_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
