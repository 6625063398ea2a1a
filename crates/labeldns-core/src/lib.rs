// # labeldns-core
//
// Core library for the label-driven DNS reconciliation system.
//
// ## Architecture Overview
//
// Containers declare the DNS records they need in a JSON label. Every sync
// cycle recomputes both sides from scratch and converges the provider:
// - **ContainerSource**: Trait for listing labelled containers
// - **DnsProvider**: Trait for reading and writing provider records
// - **IpSource**: Trait for looking up the public address of `DDNS` entries
// - **SyncEngine**: Orchestrates extract → fetch → diff → write
// - **Scheduler**: Runs the sync cycle (and address discovery) without overlap
// - **ProviderRegistry**: Plugin-based registry for the collaborators
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Stateless Cycles**: Nothing is persisted, the provider is the record
// 3. **Ownership by Tag**: Only records carrying this deployment's tracking
//    comment are ever listed, updated or deleted
// 4. **Plugin-Based**: Implementations are registered dynamically, no hard-coded if-else
// 5. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod ddns;
pub mod diff;
pub mod engine;
pub mod entry;
pub mod error;
pub mod extract;
pub mod observed;
pub mod params;
pub mod registry;
pub mod scheduler;
pub mod traits;
pub mod validation;
pub mod zone;

// Re-export core types for convenience
pub use config::{
    ContainerSourceConfig, EngineConfig, IpSourceConfig, ProviderConfig, SyncConfig,
    TrackingConfig,
};
pub use ddns::{AddressSnapshot, DynamicAddressService};
pub use diff::{SetDifference, Update, diff};
pub use engine::{EngineEvent, SyncEngine, SyncSummary};
pub use entry::{Address, DnsEntry, EntryKey, ObservedEntry, RecordData, RecordType, Zone};
pub use error::{Error, Result};
pub use extract::DesiredStateExtractor;
pub use observed::ObservedStateFetcher;
pub use params::RecordParamsBuilder;
pub use registry::ProviderRegistry;
pub use scheduler::{PeriodicTask, Scheduler};
pub use traits::{ContainerDescriptor, ContainerSource, DnsProvider, IpSource};
