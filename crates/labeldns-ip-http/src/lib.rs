// # HTTP IP Source
//
// This crate provides an HTTP-based public address lookup for the labeldns
// system.
//
// ## Architecture
//
// Each call to `current()` performs exactly one GET against a "what is my
// IP" service (default `https://ipinfo.io`). Two response shapes are
// understood:
//
// - JSON objects carrying an `ip` field (ipinfo.io, ipify with `?format=json`)
// - Plain text bodies holding only the address (icanhazip.com, ifconfig.me/ip)
//
// Polling, caching and validation belong to `DynamicAddressService` in
// labeldns-core. This source reports what the service said, trimmed.

use labeldns_core::ProviderRegistry;
use labeldns_core::config::IpSourceConfig;
use labeldns_core::traits::{IpSource, IpSourceFactory};
use labeldns_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default lookup service
pub const DEFAULT_LOOKUP_URL: &str = "https://ipinfo.io";

/// Lookup request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: Option<String>,
}

/// HTTP-based IP source
#[derive(Debug)]
pub struct HttpIpSource {
    /// URL to fetch the address from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch the address from (e.g., "https://ipinfo.io")
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Pull the address out of a lookup response body
fn parse_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(Error::ip_source("Lookup service returned an empty body"));
    }

    if body.starts_with('{') {
        let response: LookupResponse = serde_json::from_str(body)
            .map_err(|e| Error::ip_source(format!("Malformed lookup response: {}", e)))?;
        return match response.ip {
            Some(ip) if !ip.trim().is_empty() => Ok(ip.trim().to_string()),
            _ => Err(Error::ip_source("Lookup response has no 'ip' field")),
        };
    }

    Ok(body.to_string())
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<String> {
        tracing::debug!(url = %self.url, "Looking up public address");

        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ip_source(format!("HTTP error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?;

        parse_body(&body)
    }
}

/// Factory for creating HTTP IP sources
pub struct HttpFactory;

impl IpSourceFactory for HttpFactory {
    fn create(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        match config {
            IpSourceConfig::Http { url } => Ok(Box::new(HttpIpSource::new(url.clone())?)),
            _ => Err(Error::config("Invalid config for HTTP IP source")),
        }
    }
}

/// Register the HTTP IP source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_source("http", Box::new(HttpFactory));
}
