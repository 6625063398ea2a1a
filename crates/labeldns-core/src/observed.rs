//! Observed-state fetcher
//!
//! Reads zones and tracked records from the DNS provider and performs the
//! individual record writes.
//!
//! ## Pagination
//!
//! The provider hands out one page per call. The fetcher follows the cursor
//! of each page strictly in order (each fetch awaits the previous one) and
//! concatenates the items in page order.
//!
//! ## Errors
//!
//! Provider failures are never retried here. They are wrapped with a
//! description of the attempted operation (and, for writes, the payload)
//! and returned; the next scheduled cycle is the retry.

use crate::entry::{Address, DnsEntry, ObservedEntry, RecordData, Zone};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, Page, PageCursor, ProviderRecord, RecordParams};
use std::future::Future;
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, warn};

const COMPONENT: &str = "ObservedStateFetcher";

/// Reads and writes provider state on behalf of the orchestrator
pub struct ObservedStateFetcher {
    provider: Arc<dyn DnsProvider>,

    /// Tracking comment used to filter record listings
    comment: OnceLock<String>,
}

impl ObservedStateFetcher {
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            comment: OnceLock::new(),
        }
    }

    /// Set the tracking comment of this deployment.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] when called twice.
    pub fn initialize(&self, comment: impl Into<String>) -> Result<()> {
        self.comment
            .set(comment.into())
            .map_err(|_| Error::AlreadyInitialized(COMPONENT))
    }

    fn comment(&self) -> Result<&str> {
        self.comment
            .get()
            .map(String::as_str)
            .ok_or(Error::NotInitialized(COMPONENT))
    }

    /// List every zone visible to the provider credentials
    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.comment()?;
        let provider = self.provider.as_ref();
        list_all_pages("zones", move |cursor| provider.list_zones(cursor))
            .await
            .map_err(|e| e.context("failed to list zones"))
    }

    /// List the tracked records of one zone, mapped to observed entries
    pub async fn list_zone_records(&self, zone_id: &str) -> Result<Vec<ObservedEntry>> {
        let comment = self.comment()?;
        let provider = self.provider.as_ref();
        let records = list_all_pages("records", move |cursor| {
            provider.list_records(zone_id, comment, cursor)
        })
        .await
        .map_err(|e| e.context(format!("failed to list records of zone {zone_id}")))?;

        debug!(zone_id, count = records.len(), "fetched tracked records");
        Ok(map_to_canonical(zone_id, records))
    }

    /// Create a record
    pub async fn create_entry(&self, params: &RecordParams) -> Result<()> {
        self.comment()?;
        self.provider
            .create_record(params)
            .await
            .map_err(|e| e.context(format!("failed to create record {}", payload(params))))
    }

    /// Replace the record `record_id`
    pub async fn update_entry(&self, record_id: &str, params: &RecordParams) -> Result<()> {
        self.comment()?;
        self.provider
            .update_record(record_id, params)
            .await
            .map_err(|e| {
                e.context(format!(
                    "failed to update record {record_id} with {}",
                    payload(params)
                ))
            })
    }

    /// Delete a record
    pub async fn delete_entry(&self, entry: &ObservedEntry) -> Result<()> {
        self.comment()?;
        self.provider
            .delete_record(&entry.id, &entry.zone_id)
            .await
            .map_err(|e| {
                e.context(format!(
                    "failed to delete record {} ({}) from zone {}",
                    entry.id, entry.entry, entry.zone_id
                ))
            })
    }
}

/// Follows page cursors until the last page, concatenating items in order
async fn list_all_pages<T, F, Fut>(what: &str, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = None;
    let mut page_count = 0usize;

    loop {
        let page = fetch(cursor.take()).await?;
        page_count += 1;
        debug!(page = page_count, count = page.items.len(), "fetched {} page", what);

        items.extend(page.items);
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(pages = page_count, total = items.len(), "listed all {}", what);
    Ok(items)
}

/// Maps provider records of `zone_id` to observed entries.
///
/// Records of unknown types, or whose content cannot be represented, become
/// `Unsupported` entries so they are routed to deletion.
pub fn map_to_canonical(zone_id: &str, records: Vec<ProviderRecord>) -> Vec<ObservedEntry> {
    records
        .into_iter()
        .map(|record| {
            let data = record_data(&record);
            if let RecordData::Unsupported { native_type } = &data {
                warn!(
                    record_id = %record.id,
                    zone_id,
                    "unsupported {} record {} ({}) is tracked and will be deleted",
                    native_type,
                    record.name,
                    record.id
                );
            }
            ObservedEntry::new(record.id, zone_id, DnsEntry::new(record.name, data))
        })
        .collect()
}

fn record_data(record: &ProviderRecord) -> RecordData {
    let proxied = record.proxied.unwrap_or(false);
    match record.record_type.as_str() {
        "A" => match record.content.parse() {
            Ok(ip) => RecordData::A {
                address: Address::Ip(ip),
                proxied,
            },
            Err(_) => unsupported(record),
        },
        "CNAME" => RecordData::Cname {
            target: record.content.clone(),
            proxied,
        },
        "MX" => RecordData::Mx {
            server: record.content.clone(),
            priority: record.priority.unwrap_or(0),
        },
        "NS" => RecordData::Ns {
            server: record.content.clone(),
        },
        _ => unsupported(record),
    }
}

fn unsupported(record: &ProviderRecord) -> RecordData {
    RecordData::Unsupported {
        native_type: record.record_type.clone(),
    }
}

fn payload(params: &RecordParams) -> String {
    let body = serde_json::to_string(params).unwrap_or_else(|_| format!("{params:?}"));
    format!("in zone {}: {}", params.zone_id, body)
}
