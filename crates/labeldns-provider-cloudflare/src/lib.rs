// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the
// labeldns system.
//
// ## Behaviour
//
// - ✅ One HTTP request per trait call
// - ✅ Full error propagation to the engine (the next cycle is the retry)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ Page-number pagination exposed as an opaque cursor
// - ✅ Server-side filtering of records by tracking comment
// - ❌ NO retry or backoff logic (owned by the scheduler)
// - ❌ NO pagination loop (owned by `ObservedStateFetcher`)
// - ❌ NO caching between calls
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Provider fails fast (configuration error) if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?page=N&per_page=50`
// - List DNS Records: GET `/zones/:zone_id/dns_records?comment.exact=...&page=N`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use labeldns_core::config::ProviderConfig;
use labeldns_core::traits::{
    DnsProvider, DnsProviderFactory, Page, PageCursor, ProviderRecord, RecordParams,
};
use labeldns_core::{Error, Result, Zone};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Zones requested per page
const ZONES_PER_PAGE: u32 = 50;

/// Records requested per page
const RECORDS_PER_PAGE: u32 = 100;

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

impl ResultInfo {
    fn next_cursor(&self) -> Option<PageCursor> {
        (self.page < self.total_pages).then(|| PageCursor((self.page + 1).to_string()))
    }
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless, and single-shot. All coordination
/// (pagination, scheduling, retries) is owned by labeldns-core.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    ///
    /// # Errors
    ///
    /// A configuration error if the token is empty, an HTTP error if the
    /// client cannot be built.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_token, CLOUDFLARE_API_BASE)
    }

    /// Create a provider talking to `base_url` instead of the public API
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the Cloudflare envelope
    ///
    /// # Parameters
    ///
    /// - `request`: the prepared request (auth is added here)
    /// - `action`: description used in error messages
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<Envelope<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, action));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("Failed to parse response: {}", e))
        })?;

        if !envelope.success {
            let messages: Vec<String> = envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect();
            return Err(Error::provider(
                "cloudflare",
                format!("{} rejected: {}", action, messages.join(", ")),
            ));
        }

        Ok(envelope)
    }
}

/// Map HTTP status codes to specific errors
fn status_error(status: reqwest::StatusCode, error_text: &str, action: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("{} failed: not found. Status: {}", action, status),
        409 => format!(
            "Conflict: {} clashes with an existing record. Status: {} - {}",
            action, status, error_text
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!(
            "Cloudflare server error (transient): {} - {}",
            status, error_text
        ),
        _ => format!("{} failed: {} - {}", action, status, error_text),
    };
    Error::provider("cloudflare", message)
}

fn page_number(cursor: Option<PageCursor>) -> Result<u32> {
    match cursor {
        None => Ok(1),
        Some(PageCursor(page)) => page
            .parse()
            .map_err(|_| Error::provider("cloudflare", format!("Invalid page cursor: {}", page))),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// # API Call
    ///
    /// ```http
    /// GET /zones?page=1&per_page=50
    /// Authorization: Bearer <token>
    /// ```
    async fn list_zones(&self, cursor: Option<PageCursor>) -> Result<Page<Zone>> {
        let page = page_number(cursor)?;
        tracing::debug!("Listing Cloudflare zones, page {}", page);

        let request = self.client.get(self.url("/zones")).query(&[
            ("page", page.to_string()),
            ("per_page", ZONES_PER_PAGE.to_string()),
        ]);
        let envelope: Envelope<Vec<Zone>> = self.execute(request, "Zone listing").await?;

        Ok(Page {
            next: envelope.result_info.as_ref().and_then(ResultInfo::next_cursor),
            items: envelope.result.unwrap_or_default(),
        })
    }

    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?comment.exact=<comment>&page=1&per_page=100
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(
        &self,
        zone_id: &str,
        comment: &str,
        cursor: Option<PageCursor>,
    ) -> Result<Page<ProviderRecord>> {
        let page = page_number(cursor)?;
        tracing::debug!("Listing records of zone {}, page {}", zone_id, page);

        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .query(&[
                ("comment.exact", comment.to_string()),
                ("page", page.to_string()),
                ("per_page", RECORDS_PER_PAGE.to_string()),
            ]);
        let envelope: Envelope<Vec<ProviderRecord>> =
            self.execute(request, "Record listing").await?;

        Ok(Page {
            next: envelope.result_info.as_ref().and_then(ResultInfo::next_cursor),
            items: envelope.result.unwrap_or_default(),
        })
    }

    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {
    ///   "type": "A", "name": "a.example.com", "content": "1.2.3.4",
    ///   "proxied": false, "comment": "<tracking id>"
    /// }
    /// ```
    async fn create_record(&self, params: &RecordParams) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", params.zone_id)))
            .json(params);
        let _: Envelope<serde_json::Value> = self.execute(request, "Record creation").await?;

        tracing::debug!("Created {} record {}", params.record_type, params.name);
        Ok(())
    }

    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn update_record(&self, record_id: &str, params: &RecordParams) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!(
                "/zones/{}/dns_records/{}",
                params.zone_id, record_id
            )))
            .json(params);
        let _: Envelope<serde_json::Value> = self.execute(request, "Record update").await?;

        tracing::debug!("Updated record {} ({})", record_id, params.name);
        Ok(())
    }

    /// # API Call
    ///
    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, record_id: &str, zone_id: &str) -> Result<()> {
        let request = self.client.delete(self.url(&format!(
            "/zones/{}/dns_records/{}",
            zone_id, record_id
        )));
        let _: Envelope<serde_json::Value> = self.execute(request, "Record deletion").await?;

        tracing::debug!("Deleted record {} from zone {}", record_id, zone_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token is required"));
                }
                Ok(Box::new(CloudflareProvider::new(api_token.clone())?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// This function should be called during initialization to make the
/// Cloudflare provider available.
///
/// # Example
///
/// ```rust
/// use labeldns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// labeldns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &labeldns_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
