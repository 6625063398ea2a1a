//! Core traits for the labeldns system
//!
//! This module defines the abstract interfaces to the outside world:
//!
//! - [`DnsProvider`]: Read and write DNS records via a provider API
//! - [`ContainerSource`]: List labelled containers from a container runtime
//! - [`IpSource`]: Look up this host's public address

pub mod container_source;
pub mod dns_provider;
pub mod ip_source;

pub use container_source::{ContainerDescriptor, ContainerSource, ContainerSourceFactory};
pub use dns_provider::{
    DnsProvider, DnsProviderFactory, Page, PageCursor, ProviderRecord, RecordParams,
};
pub use ip_source::{IpSource, IpSourceFactory};
