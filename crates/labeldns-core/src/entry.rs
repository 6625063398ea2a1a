//! Canonical DNS entry model
//!
//! Every other component speaks in terms of [`DnsEntry`] (a desired or
//! provider-independent record) and [`ObservedEntry`] (a record as it
//! currently exists at the provider, carrying the provider's identity).
//!
//! ## Identity
//!
//! Two entries occupy the same "record slot" when their [`EntryKey`] is
//! equal. The key is `"{type}-{name}"` and deliberately ignores the record
//! value, so a changed address turns into an update rather than a
//! delete/create pair.
//!
//! ## Value equality
//!
//! [`DnsEntry::has_same_value`] compares only the type-specific payload.
//! Provider identity (`id`, `zone_id`) lives on [`ObservedEntry`] and is
//! never consulted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Accepted spellings of the dynamic-address sentinel.
///
/// The first spelling is the canonical one used when an entry is rendered.
pub const DYNAMIC_ADDRESS_SENTINELS: &[&str] = &["DDNS", "DYNAMIC"];

/// DNS record types known to the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "MX")]
    Mx,
    #[serde(rename = "NS")]
    Ns,
    /// Provider-only tag for records this system does not manage
    Unsupported,
}

impl RecordType {
    /// Wire name of the type, as used by the provider and in entry keys
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of an A record: a concrete IP or the dynamic-address sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// A concrete IPv4 or IPv6 address
    Ip(IpAddr),
    /// Placeholder replaced by the discovered public address at sync time
    Dynamic,
}

impl Address {
    /// True for the dynamic-address sentinel
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Address::Dynamic)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(ip) => write!(f, "{ip}"),
            Address::Dynamic => f.write_str(DYNAMIC_ADDRESS_SENTINELS[0]),
        }
    }
}

impl FromStr for Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if DYNAMIC_ADDRESS_SENTINELS.contains(&s) {
            return Ok(Address::Dynamic);
        }
        s.parse().map(Address::Ip)
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Address::Ip(ip)
    }
}

/// Type-specific payload of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A { address: Address, proxied: bool },
    Cname { target: String, proxied: bool },
    Mx { server: String, priority: u16 },
    Ns { server: String },
    /// A provider record of a type this system does not manage
    Unsupported { native_type: String },
}

impl RecordData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::Cname { .. } => RecordType::Cname,
            RecordData::Mx { .. } => RecordType::Mx,
            RecordData::Ns { .. } => RecordType::Ns,
            RecordData::Unsupported { .. } => RecordType::Unsupported,
        }
    }
}

/// Identity of a record slot: `"{type}-{name}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(record_type: RecordType, name: &str) -> Self {
        Self(format!("{record_type}-{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical DNS entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsEntry {
    /// Fully-qualified domain name of the record
    pub name: String,
    /// Type-specific payload
    pub data: RecordData,
}

impl DnsEntry {
    pub fn new(name: impl Into<String>, data: RecordData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Convenience constructor for an A record
    pub fn a(name: impl Into<String>, address: impl Into<Address>, proxied: bool) -> Self {
        Self::new(
            name,
            RecordData::A {
                address: address.into(),
                proxied,
            },
        )
    }

    /// Convenience constructor for a CNAME record
    pub fn cname(name: impl Into<String>, target: impl Into<String>, proxied: bool) -> Self {
        Self::new(
            name,
            RecordData::Cname {
                target: target.into(),
                proxied,
            },
        )
    }

    /// Convenience constructor for an MX record
    pub fn mx(name: impl Into<String>, server: impl Into<String>, priority: u16) -> Self {
        Self::new(
            name,
            RecordData::Mx {
                server: server.into(),
                priority,
            },
        )
    }

    /// Convenience constructor for an NS record
    pub fn ns(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self::new(
            name,
            RecordData::Ns {
                server: server.into(),
            },
        )
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    /// The record slot this entry occupies
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.record_type(), &self.name)
    }

    /// True if this is an A record using the dynamic-address sentinel
    pub fn uses_dynamic_address(&self) -> bool {
        matches!(self.data, RecordData::A { address: Address::Dynamic, .. })
    }

    /// Compares the record values only.
    ///
    /// Entries of different types never have the same value. Unsupported
    /// entries never match anything, themselves included, so they can never
    /// be treated as unchanged.
    pub fn has_same_value(&self, other: &DnsEntry) -> bool {
        match (&self.data, &other.data) {
            (
                RecordData::A { address, proxied },
                RecordData::A {
                    address: other_address,
                    proxied: other_proxied,
                },
            ) => address == other_address && proxied == other_proxied,
            (
                RecordData::Cname { target, proxied },
                RecordData::Cname {
                    target: other_target,
                    proxied: other_proxied,
                },
            ) => target == other_target && proxied == other_proxied,
            (
                RecordData::Mx { server, priority },
                RecordData::Mx {
                    server: other_server,
                    priority: other_priority,
                },
            ) => server == other_server && priority == other_priority,
            (RecordData::Ns { server }, RecordData::Ns { server: other_server }) => {
                server == other_server
            }
            _ => false,
        }
    }

    /// Returns a copy of this entry with the dynamic sentinel replaced.
    ///
    /// Entries that do not use the sentinel are returned unchanged.
    pub fn with_resolved_address(&self, ip: IpAddr) -> DnsEntry {
        match &self.data {
            RecordData::A {
                address: Address::Dynamic,
                proxied,
            } => DnsEntry::a(self.name.clone(), ip, *proxied),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for DnsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            RecordData::A { address, proxied } => {
                write!(f, "A {} -> {} (proxied: {})", self.name, address, proxied)
            }
            RecordData::Cname { target, proxied } => {
                write!(f, "CNAME {} -> {} (proxied: {})", self.name, target, proxied)
            }
            RecordData::Mx { server, priority } => {
                write!(f, "MX {} -> {} (priority: {})", self.name, server, priority)
            }
            RecordData::Ns { server } => write!(f, "NS {} -> {}", self.name, server),
            RecordData::Unsupported { native_type } => {
                write!(f, "{} {} (unsupported)", native_type, self.name)
            }
        }
    }
}

/// A DNS zone at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    /// DNS suffix served by the zone, e.g. `example.com`
    pub name: String,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// An entry as observed at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEntry {
    /// Provider-assigned record id
    pub id: String,
    /// Zone the record belongs to
    pub zone_id: String,
    pub entry: DnsEntry,
}

impl ObservedEntry {
    pub fn new(id: impl Into<String>, zone_id: impl Into<String>, entry: DnsEntry) -> Self {
        Self {
            id: id.into(),
            zone_id: zone_id.into(),
            entry,
        }
    }

    pub fn key(&self) -> EntryKey {
        self.entry.key()
    }

    pub fn is_unsupported(&self) -> bool {
        self.entry.record_type() == RecordType::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn key_is_type_dash_name() {
        assert_eq!(
            DnsEntry::a("test.example.com", ip("1.1.1.1"), false).key().as_str(),
            "A-test.example.com"
        );
        assert_eq!(
            DnsEntry::cname("www.example.com", "example.com", true).key().as_str(),
            "CNAME-www.example.com"
        );
        assert_eq!(
            DnsEntry::mx("example.com", "mail.example.com", 10).key().as_str(),
            "MX-example.com"
        );
        assert_eq!(
            DnsEntry::ns("sub.example.com", "ns1.example.com").key().as_str(),
            "NS-sub.example.com"
        );
    }

    #[test]
    fn key_ignores_value_fields() {
        let first = DnsEntry::a("a.example.com", ip("1.1.1.1"), false);
        let second = DnsEntry::a("a.example.com", ip("9.9.9.9"), true);
        assert_eq!(first.key(), second.key());
    }

    #[test]
    fn key_differs_by_type_or_name() {
        let a = DnsEntry::a("a.example.com", ip("1.1.1.1"), false);
        let other_name = DnsEntry::a("b.example.com", ip("1.1.1.1"), false);
        let other_type = DnsEntry::cname("a.example.com", "b.example.com", false);
        assert_ne!(a.key(), other_name.key());
        assert_ne!(a.key(), other_type.key());
    }

    #[test]
    fn same_value_ignores_provider_identity() {
        let entry = DnsEntry::mx("example.com", "mail.example.com", 10);
        let first = ObservedEntry::new("rec1", "zone1", entry.clone());
        let second = ObservedEntry::new("rec2", "zone2", entry);
        assert!(first.entry.has_same_value(&second.entry));
    }

    #[test]
    fn same_value_compares_every_payload_field() {
        let base = DnsEntry::cname("www.example.com", "example.com", false);
        assert!(base.has_same_value(&DnsEntry::cname("www.example.com", "example.com", false)));
        assert!(!base.has_same_value(&DnsEntry::cname("www.example.com", "example.com", true)));
        assert!(!base.has_same_value(&DnsEntry::cname("www.example.com", "other.com", false)));

        let mx = DnsEntry::mx("example.com", "mail.example.com", 10);
        assert!(!mx.has_same_value(&DnsEntry::mx("example.com", "mail.example.com", 20)));
    }

    #[test]
    fn same_value_is_false_across_types() {
        let ns = DnsEntry::ns("example.com", "ns.example.com");
        let mx = DnsEntry::mx("example.com", "ns.example.com", 0);
        assert!(!ns.has_same_value(&mx));
    }

    #[test]
    fn unsupported_never_has_same_value() {
        let txt = DnsEntry::new(
            "example.com",
            RecordData::Unsupported {
                native_type: "TXT".to_string(),
            },
        );
        assert!(!txt.has_same_value(&txt.clone()));
    }

    #[test]
    fn address_parses_ip_and_sentinels() {
        assert_eq!("1.2.3.4".parse::<Address>().unwrap(), Address::Ip(ip("1.2.3.4")));
        assert_eq!("::1".parse::<Address>().unwrap(), Address::Ip(ip("::1")));
        assert_eq!("DDNS".parse::<Address>().unwrap(), Address::Dynamic);
        assert_eq!("DYNAMIC".parse::<Address>().unwrap(), Address::Dynamic);
        assert!("ddns".parse::<Address>().is_err());
        assert!("999.1.1.1".parse::<Address>().is_err());
    }

    #[test]
    fn resolving_dynamic_address_leaves_original_untouched() {
        let original = DnsEntry::a("home.example.com", Address::Dynamic, true);
        let resolved = original.with_resolved_address(ip("5.6.7.8"));

        assert!(original.uses_dynamic_address());
        assert_eq!(resolved, DnsEntry::a("home.example.com", ip("5.6.7.8"), true));
        assert_eq!(original.key(), resolved.key());
    }
}
