//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without talking to a real provider or container runtime.

#![allow(dead_code)]

use labeldns_core::config::EngineConfig;
use labeldns_core::error::{Error, Result};
use labeldns_core::traits::{
    ContainerDescriptor, ContainerSource, DnsProvider, IpSource, Page, PageCursor, ProviderRecord,
    RecordParams,
};
use labeldns_core::{EngineEvent, SyncEngine, Zone};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Tracking identifier used by every contract test
pub const TRACKING_ID: &str = "docker-compose-external-dns.1";

/// A write the engine issued against the mock provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Create(RecordParams),
    Update {
        record_id: String,
        params: RecordParams,
    },
    Delete {
        record_id: String,
        zone_id: String,
    },
}

/// A mock DnsProvider serving scripted pages and tracking calls
pub struct MockDnsProvider {
    /// Zone listing, one inner vec per page
    zone_pages: Vec<Vec<Zone>>,
    /// Record listings per zone id, one inner vec per page
    record_pages: HashMap<String, Vec<Vec<ProviderRecord>>>,
    /// Record names (creates/updates) or ids (deletes) whose writes fail
    failing: HashSet<String>,
    /// Call counter for list_zones()
    list_zones_count: Arc<AtomicUsize>,
    /// Call counter for list_records()
    list_records_count: Arc<AtomicUsize>,
    /// Cursors passed to list_zones(), in call order
    zone_cursors: Arc<Mutex<Vec<Option<PageCursor>>>>,
    /// Cursors passed to list_records(), in call order
    record_cursors: Arc<Mutex<Vec<Option<PageCursor>>>>,
    /// Comments passed to list_records()
    comments: Arc<Mutex<Vec<String>>>,
    /// Every write, in issue order
    writes: Arc<Mutex<Vec<WriteCall>>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            zone_pages: Vec::new(),
            record_pages: HashMap::new(),
            failing: HashSet::new(),
            list_zones_count: Arc::new(AtomicUsize::new(0)),
            list_records_count: Arc::new(AtomicUsize::new(0)),
            zone_cursors: Arc::new(Mutex::new(Vec::new())),
            record_cursors: Arc::new(Mutex::new(Vec::new())),
            comments: Arc::new(Mutex::new(Vec::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `zones` as a single page
    pub fn with_zones(self, zones: Vec<Zone>) -> Self {
        self.with_zone_pages(vec![zones])
    }

    pub fn with_zone_pages(mut self, pages: Vec<Vec<Zone>>) -> Self {
        self.zone_pages = pages;
        self
    }

    /// Serve `records` of `zone_id` as a single page
    pub fn with_records(self, zone_id: &str, records: Vec<ProviderRecord>) -> Self {
        self.with_record_pages(zone_id, vec![records])
    }

    pub fn with_record_pages(mut self, zone_id: &str, pages: Vec<Vec<ProviderRecord>>) -> Self {
        self.record_pages.insert(zone_id.to_string(), pages);
        self
    }

    /// Reject writes for the record name or id `key`
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    /// Create a new MockDnsProvider that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            zone_pages: other.zone_pages.clone(),
            record_pages: other.record_pages.clone(),
            failing: other.failing.clone(),
            list_zones_count: Arc::clone(&other.list_zones_count),
            list_records_count: Arc::clone(&other.list_records_count),
            zone_cursors: Arc::clone(&other.zone_cursors),
            record_cursors: Arc::clone(&other.record_cursors),
            comments: Arc::clone(&other.comments),
            writes: Arc::clone(&other.writes),
        }
    }

    pub fn list_zones_count(&self) -> usize {
        self.list_zones_count.load(Ordering::SeqCst)
    }

    pub fn list_records_count(&self) -> usize {
        self.list_records_count.load(Ordering::SeqCst)
    }

    pub fn zone_cursors(&self) -> Vec<Option<PageCursor>> {
        self.zone_cursors.lock().unwrap().clone()
    }

    pub fn record_cursors(&self) -> Vec<Option<PageCursor>> {
        self.record_cursors.lock().unwrap().clone()
    }

    pub fn comments(&self) -> Vec<String> {
        self.comments.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    fn record_write(&self, call: WriteCall, key: &str) -> Result<()> {
        self.writes.lock().unwrap().push(call);
        if self.failing.contains(key) {
            return Err(Error::provider("mock", format!("rejected write for {key}")));
        }
        Ok(())
    }
}

/// Serve page `cursor` of `pages`, cursors being page indexes
fn page_of<T: Clone>(pages: &[Vec<T>], cursor: Option<PageCursor>) -> Page<T> {
    let index = cursor.map_or(0, |c| c.0.parse::<usize>().unwrap());
    let items = pages.get(index).cloned().unwrap_or_default();
    let next = (index + 1 < pages.len()).then(|| PageCursor((index + 1).to_string()));
    Page { items, next }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_zones(&self, cursor: Option<PageCursor>) -> Result<Page<Zone>> {
        self.list_zones_count.fetch_add(1, Ordering::SeqCst);
        self.zone_cursors.lock().unwrap().push(cursor.clone());
        Ok(page_of(&self.zone_pages, cursor))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        comment: &str,
        cursor: Option<PageCursor>,
    ) -> Result<Page<ProviderRecord>> {
        self.list_records_count.fetch_add(1, Ordering::SeqCst);
        self.record_cursors.lock().unwrap().push(cursor.clone());
        self.comments.lock().unwrap().push(comment.to_string());
        let pages = self.record_pages.get(zone_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(page_of(pages, cursor))
    }

    async fn create_record(&self, params: &RecordParams) -> Result<()> {
        self.record_write(WriteCall::Create(params.clone()), &params.name)
    }

    async fn update_record(&self, record_id: &str, params: &RecordParams) -> Result<()> {
        self.record_write(
            WriteCall::Update {
                record_id: record_id.to_string(),
                params: params.clone(),
            },
            &params.name,
        )
    }

    async fn delete_record(&self, record_id: &str, zone_id: &str) -> Result<()> {
        self.record_write(
            WriteCall::Delete {
                record_id: record_id.to_string(),
                zone_id: zone_id.to_string(),
            },
            record_id,
        )
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock ContainerSource whose containers can be replaced between cycles
#[derive(Clone)]
pub struct MockContainerSource {
    containers: Arc<Mutex<Vec<ContainerDescriptor>>>,
    fail: Arc<Mutex<bool>>,
    filters: Arc<Mutex<Vec<String>>>,
}

impl MockContainerSource {
    pub fn new(containers: Vec<ContainerDescriptor>) -> Self {
        Self {
            containers: Arc::new(Mutex::new(containers)),
            fail: Arc::new(Mutex::new(false)),
            filters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_containers(&self, containers: Vec<ContainerDescriptor>) {
        *self.containers.lock().unwrap() = containers;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Label filters passed to list_containers()
    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContainerSource for MockContainerSource {
    async fn list_containers(&self, label_filter: &str) -> Result<Vec<ContainerDescriptor>> {
        self.filters.lock().unwrap().push(label_filter.to_string());
        if *self.fail.lock().unwrap() {
            return Err(Error::container("runtime unavailable"));
        }
        Ok(self.containers.lock().unwrap().clone())
    }
}

/// A controlled IpSource whose answer can be changed on demand
#[derive(Clone)]
pub struct ControlledIpSource {
    /// Current answer, `Err` simulates a failed lookup
    answer: Arc<Mutex<std::result::Result<String, String>>>,
    /// Call counter for current()
    current_call_count: Arc<AtomicUsize>,
}

impl ControlledIpSource {
    pub fn new(address: &str) -> Self {
        Self {
            answer: Arc::new(Mutex::new(Ok(address.to_string()))),
            current_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source whose lookups always fail
    pub fn failing() -> Self {
        let source = Self::new("");
        source.set_failing();
        source
    }

    pub fn set_address(&self, address: &str) {
        *self.answer.lock().unwrap() = Ok(address.to_string());
    }

    pub fn set_failing(&self) {
        *self.answer.lock().unwrap() = Err("lookup service unreachable".to_string());
    }

    /// Get the number of times current() was called
    pub fn current_call_count(&self) -> usize {
        self.current_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ControlledIpSource {
    async fn current(&self) -> Result<String> {
        self.current_call_count.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone().map_err(Error::ip_source)
    }
}

/// A container declaring `entries` (a JSON array) under the tracking label
pub fn labelled(id: &str, entries: serde_json::Value) -> ContainerDescriptor {
    ContainerDescriptor::new(id).with_label(TRACKING_ID, entries.to_string())
}

/// A tracked provider record
pub fn provider_record(id: &str, record_type: &str, name: &str, content: &str) -> ProviderRecord {
    ProviderRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: record_type.to_string(),
        content: content.to_string(),
        proxied: None,
        priority: None,
        comment: Some(TRACKING_ID.to_string()),
    }
}

/// Build an initialized engine over the given doubles
pub fn engine_with(
    provider: MockDnsProvider,
    containers: MockContainerSource,
    ip_source: ControlledIpSource,
) -> (Arc<SyncEngine>, mpsc::Receiver<EngineEvent>) {
    let (engine, events) = SyncEngine::new(
        Arc::new(provider),
        Arc::new(containers),
        Arc::new(ip_source),
        &EngineConfig::default(),
    )
    .expect("engine construction succeeds");
    engine
        .initialize(TRACKING_ID)
        .expect("first initialization succeeds");
    (Arc::new(engine), events)
}

/// Drain every event currently queued
pub fn drain(events: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
