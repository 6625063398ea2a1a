//! Reconciliation orchestrator
//!
//! The SyncEngine runs one reconciliation cycle at a time:
//! - Listing zones and the tracked records of every zone
//! - Extracting desired entries from container labels
//! - Substituting the discovered public address for `DDNS` entries
//! - Diffing desired against observed and issuing the writes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │ ContainerSource  │   │   DnsProvider    │   │ DynamicAddressService│
//! └──────────────────┘   └──────────────────┘   └──────────────────────┘
//!          │                 ▲         │                   │
//!          ▼                 │ writes  ▼ pages             ▼ address
//! ┌──────────────────┐   ┌──────────────────┐              │
//! │ DesiredState     │   │ ObservedState    │              │
//! │ Extractor        │   │ Fetcher          │              │
//! └──────────────────┘   └──────────────────┘              │
//!          │                      │                        │
//!          └──────────┬───────────┘                        │
//!                     ▼                                    │
//!              ┌──────────────┐                            │
//!              │  SyncEngine  │◀───────────────────────────┘
//!              └──────────────┘
//!                     │
//!                     ▼
//!              ┌──────────────┐
//!              │   Events     │
//!              └──────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. List zones (an empty list fails the cycle)
//! 2. Fetch every zone's records concurrently, while listing containers
//! 3. Check the desired side first, then merge the observed records
//! 4. Resolve dynamic addresses, starting or stopping discovery on demand
//! 5. Diff, then issue every create/update/delete concurrently
//! 6. Report the summary, or every rejected write at once
//!
//! The engine keeps no state between cycles. It is driven by a
//! [`Scheduler`](crate::scheduler::Scheduler) through its
//! [`PeriodicTask`] implementation.

use crate::config::EngineConfig;
use crate::ddns::DynamicAddressService;
use crate::diff::{SetDifference, diff};
use crate::entry::{DnsEntry, ObservedEntry, Zone};
use crate::error::{Error, Result};
use crate::extract::DesiredStateExtractor;
use crate::observed::ObservedStateFetcher;
use crate::params::RecordParamsBuilder;
use crate::scheduler::PeriodicTask;
use crate::traits::{ContainerSource, DnsProvider, IpSource};
use crate::zone;
use async_trait::async_trait;
use futures::future::{BoxFuture, join_all, try_join_all};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "SyncEngine";

/// Counts of one completed cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Creates issued (entries whose zone could not be resolved are not counted)
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} deleted, {} unchanged",
            self.added, self.updated, self.deleted, self.unchanged
        )
    }
}

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A cycle began
    CycleStarted,

    /// A cycle finished and every write succeeded
    CycleCompleted(SyncSummary),

    /// A cycle was aborted or some of its writes were rejected
    CycleFailed { error: String },
}

/// Reconciliation orchestrator
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Call [`SyncEngine::initialize()`] once with the tracking identifier
/// 3. Run [`SyncEngine::cycle()`] directly, or hand the engine to a
///    [`Scheduler`](crate::scheduler::Scheduler)
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When it is full the event is
/// dropped with a warning; a cycle never waits on its observers.
pub struct SyncEngine {
    containers: Arc<dyn ContainerSource>,

    fetcher: ObservedStateFetcher,

    extractor: DesiredStateExtractor,

    /// Public address discovery, started on demand
    dynamic_address: DynamicAddressService,

    /// Set by `initialize()`
    params: OnceLock<RecordParamsBuilder>,

    sync_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SyncEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `containers`: container runtime implementation
    /// - `ip_source`: public address lookup, used only for `DDNS` entries
    /// - `config`: engine settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        containers: Arc<dyn ContainerSource>,
        ip_source: Arc<dyn IpSource>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            containers,
            fetcher: ObservedStateFetcher::new(provider),
            extractor: DesiredStateExtractor::new(),
            dynamic_address: DynamicAddressService::new(ip_source, config.ddns_interval()),
            params: OnceLock::new(),
            sync_interval: config.sync_interval(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Bind the engine to a tracking identifier.
    ///
    /// The identifier is the container label key to read declarations from
    /// and the comment stamped on, and filtered by, every provider record.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] when called twice.
    pub fn initialize(&self, tracking_id: &str) -> Result<()> {
        self.params
            .set(RecordParamsBuilder::new(tracking_id))
            .map_err(|_| Error::AlreadyInitialized(COMPONENT))?;
        self.extractor.initialize(tracking_id)?;
        self.fetcher.initialize(tracking_id)?;

        info!("{}: initialized with tracking id {}", COMPONENT, tracking_id);
        Ok(())
    }

    /// The dynamic address subsystem owned by this engine
    pub fn dynamic_address(&self) -> &DynamicAddressService {
        &self.dynamic_address
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(SyncSummary)`: every planned write succeeded
    /// - `Err(Error)`: the cycle was aborted, or some writes were rejected
    ///   (`Error::WriteFailures`, issued after all writes settled)
    pub async fn cycle(&self) -> Result<SyncSummary> {
        self.emit_event(EngineEvent::CycleStarted);

        match self.reconcile().await {
            Ok(summary) => {
                info!("Sync complete: {}", summary);
                self.emit_event(EngineEvent::CycleCompleted(summary));
                Ok(summary)
            }
            Err(e) => {
                self.emit_event(EngineEvent::CycleFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn reconcile(&self) -> Result<SyncSummary> {
        let params = self.params.get().ok_or(Error::NotInitialized(COMPONENT))?;

        let zones = self.fetcher.list_zones().await?;
        if zones.is_empty() {
            return Err(Error::NoZones);
        }
        debug!("Found {} zones", zones.len());

        let observed = try_join_all(
            zones
                .iter()
                .map(|zone| self.fetcher.list_zone_records(&zone.id)),
        );
        let (observed, desired) = tokio::join!(observed, self.desired_entries());

        let desired = self.resolve_dynamic_addresses(desired?);
        let observed: Vec<ObservedEntry> = observed?.into_iter().flatten().collect();
        debug!(
            "Reconciling {} desired against {} observed entries",
            desired.len(),
            observed.len()
        );

        let difference = diff(&desired, &observed);
        self.apply(&zones, params, &difference).await
    }

    async fn desired_entries(&self) -> Result<Vec<DnsEntry>> {
        let label_key = self
            .extractor
            .label_key()
            .ok_or(Error::NotInitialized(COMPONENT))?;
        let containers = self
            .containers
            .list_containers(label_key)
            .await
            .map_err(|e| e.context("failed to list containers"))?;
        debug!("Found {} labelled containers", containers.len());

        self.extractor.extract(&containers)
    }

    /// Substitutes the discovered address into `DDNS` entries, or drops
    /// them while no address is known yet.
    fn resolve_dynamic_addresses(&self, desired: Vec<DnsEntry>) -> Vec<DnsEntry> {
        let service = &self.dynamic_address;

        if !service.is_required(&desired) {
            if service.is_running() {
                info!("No entry uses the dynamic address anymore, stopping discovery");
                if let Err(e) = service.stop() {
                    warn!("Failed to stop dynamic address discovery: {}", e);
                }
            }
            return desired;
        }

        if !service.is_running() {
            info!("Entries use the dynamic address, starting discovery");
            if let Err(e) = service.start() {
                warn!("Failed to start dynamic address discovery: {}", e);
            }
        }

        match service.address() {
            Some(address) => desired
                .iter()
                .map(|entry| entry.with_resolved_address(address))
                .collect(),
            None => {
                let skipped = desired.iter().filter(|e| e.uses_dynamic_address()).count();
                warn!(
                    "Public address not discovered yet, skipping {} entries using the dynamic address this cycle",
                    skipped
                );
                desired
                    .into_iter()
                    .filter(|entry| !entry.uses_dynamic_address())
                    .collect()
            }
        }
    }

    /// Issue every write of `difference` concurrently and wait for all of them
    async fn apply(
        &self,
        zones: &[Zone],
        params: &RecordParamsBuilder,
        difference: &SetDifference,
    ) -> Result<SyncSummary> {
        let mut writes: Vec<BoxFuture<'_, Result<()>>> = Vec::new();
        let mut summary = SyncSummary {
            unchanged: difference.unchanged.len(),
            ..SyncSummary::default()
        };

        for entry in &difference.add {
            let Some(zone) = zone::resolve(zones, entry) else {
                continue;
            };
            let record = params.build(&zone.id, entry)?;
            info!("Creating {} in zone {}", entry, zone.name);
            summary.added += 1;
            writes.push(Box::pin(async move { self.fetcher.create_entry(&record).await }));
        }

        for update in &difference.update {
            let record = params.build(&update.old.zone_id, &update.update)?;
            info!("Updating {} to {}", update.old.entry, update.update);
            summary.updated += 1;
            writes.push(Box::pin(async move {
                self.fetcher.update_entry(&update.old.id, &record).await
            }));
        }

        for entry in &difference.delete {
            info!("Deleting {}", entry.entry);
            summary.deleted += 1;
            writes.push(Box::pin(self.fetcher.delete_entry(entry)));
        }

        let attempted = writes.len();
        let errors: Vec<Error> = join_all(writes)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if errors.is_empty() {
            return Ok(summary);
        }
        for e in &errors {
            error!("{}", e);
        }
        Err(Error::WriteFailures {
            failed: errors.len(),
            attempted,
            errors,
        })
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, event discarded");
            }
        }
    }
}

#[async_trait]
impl PeriodicTask for SyncEngine {
    fn name(&self) -> &str {
        "SyncScheduler"
    }

    fn interval(&self) -> Duration {
        self.sync_interval
    }

    async fn run(&self) -> Result<()> {
        self.cycle().await.map(|_| ())
    }
}
