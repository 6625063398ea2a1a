//! Dynamic address subsystem
//!
//! Periodically asks an [`IpSource`] for this host's public address and
//! caches the last valid answer. A records declared with the `DDNS`
//! sentinel are rewritten to the cached address at sync time.
//!
//! A lookup never fails the schedule: network errors and garbage answers
//! are logged and the previous address is kept.

use crate::entry::DnsEntry;
use crate::error::Result;
use crate::scheduler::{PeriodicTask, Scheduler};
use crate::traits::IpSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The cached public address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSnapshot {
    pub address: IpAddr,
    /// When the address was first seen with this value
    pub changed_at: DateTime<Utc>,
}

/// One public address lookup, run by the scheduler
pub struct AddressDiscovery {
    source: Arc<dyn IpSource>,
    interval: Duration,
    snapshot: RwLock<Option<AddressSnapshot>>,
}

impl AddressDiscovery {
    pub fn new(source: Arc<dyn IpSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            snapshot: RwLock::new(None),
        }
    }

    /// Look up the public address once and update the cache
    pub async fn refresh(&self) {
        let reported = match self.source.current().await {
            Ok(reported) => reported,
            Err(e) => {
                warn!("Public address lookup failed, keeping the previous address: {}", e);
                return;
            }
        };

        let address = match reported.trim().parse::<IpAddr>() {
            Ok(address) => address,
            Err(_) => {
                warn!(
                    "Public address lookup returned an invalid address '{}', keeping the previous address",
                    reported
                );
                return;
            }
        };

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *snapshot;
        match previous {
            Some(current) if current.address == address => {
                debug!("Public address unchanged: {}", address);
            }
            Some(current) => {
                info!("Public address changed: {} -> {}", current.address, address);
                *snapshot = Some(AddressSnapshot {
                    address,
                    changed_at: Utc::now(),
                });
            }
            None => {
                info!("Public address discovered: {}", address);
                *snapshot = Some(AddressSnapshot {
                    address,
                    changed_at: Utc::now(),
                });
            }
        }
    }

    pub fn snapshot(&self) -> Option<AddressSnapshot> {
        *self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PeriodicTask for AddressDiscovery {
    fn name(&self) -> &str {
        "DynamicAddressService"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        self.refresh().await;
        Ok(())
    }
}

/// Scheduled public address discovery with a read-only cache
pub struct DynamicAddressService {
    scheduler: Scheduler<AddressDiscovery>,
}

impl DynamicAddressService {
    /// # Parameters
    ///
    /// - `source`: lookup service asked on every run
    /// - `interval`: delay between lookups
    pub fn new(source: Arc<dyn IpSource>, interval: Duration) -> Self {
        Self {
            scheduler: Scheduler::new(AddressDiscovery::new(source, interval)),
        }
    }

    /// True if any A entry uses the dynamic-address sentinel
    pub fn is_required(&self, entries: &[DnsEntry]) -> bool {
        entries.iter().any(DnsEntry::uses_dynamic_address)
    }

    /// The last valid public address, if one was discovered
    pub fn address(&self) -> Option<IpAddr> {
        self.snapshot().map(|snapshot| snapshot.address)
    }

    pub fn snapshot(&self) -> Option<AddressSnapshot> {
        self.scheduler.task().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Start the lookups; the first one runs immediately
    pub fn start(&self) -> Result<()> {
        self.scheduler.start()
    }

    pub fn stop(&self) -> Result<()> {
        self.scheduler.stop()
    }

    pub async fn stop_and_wait(&self) -> Result<()> {
        self.scheduler.stop_and_wait().await
    }
}
