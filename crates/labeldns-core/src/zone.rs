//! Zone resolution
//!
//! Picks the zone a new entry should be created in.

use crate::entry::{DnsEntry, Zone};
use tracing::warn;

/// Returns the first zone (in provider order) whose name is a suffix of the
/// entry name, or `None` after logging a warning.
///
/// Matching is label-aware and ASCII case-insensitive: zone `example.com`
/// matches `example.com` and `api.example.com`, never `badexample.com`.
pub fn resolve<'a>(zones: &'a [Zone], entry: &DnsEntry) -> Option<&'a Zone> {
    let zone = zones.iter().find(|zone| is_in_zone(&entry.name, &zone.name));
    if zone.is_none() {
        let candidates: Vec<&str> = zones.iter().map(|zone| zone.name.as_str()).collect();
        warn!(
            "Zone not found for entry {}, available zones: [{}]",
            entry,
            candidates.join(", ")
        );
    }
    zone
}

fn is_in_zone(name: &str, zone: &str) -> bool {
    let name = name.trim_end_matches('.');
    let zone = zone.trim_end_matches('.');
    if zone.is_empty() || name.len() < zone.len() {
        return false;
    }

    let split = name.len() - zone.len();
    if !name.is_char_boundary(split) || !name[split..].eq_ignore_ascii_case(zone) {
        return false;
    }
    split == 0 || name.as_bytes()[split - 1] == b'.'
}
