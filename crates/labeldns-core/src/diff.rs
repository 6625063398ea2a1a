//! Reconciliation engine
//!
//! [`diff`] compares the desired entries against the observed ones and
//! sorts every record slot into exactly one bucket of a [`SetDifference`].
//! It is a pure function: no I/O, no logging, same input same output.

use crate::entry::{DnsEntry, EntryKey, ObservedEntry};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// An observed entry paired with the desired value replacing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// The record as it exists at the provider (its id and zone are reused)
    pub old: ObservedEntry,
    /// The desired value
    pub update: DnsEntry,
}

/// Output of [`diff`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDifference {
    pub add: Vec<DnsEntry>,
    pub update: Vec<Update>,
    pub delete: Vec<ObservedEntry>,
    /// Provider records already holding the desired value
    pub unchanged: Vec<ObservedEntry>,
}

impl SetDifference {
    /// True when no provider write is needed
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Computes the changes needed to turn `observed` into `desired`.
///
/// - desired slot with no observed record: `add`
/// - observed record with no desired slot: `delete`
/// - both, same value: `unchanged`
/// - both, different value: `update`
///
/// Unsupported observed records always go to `delete`. When the provider
/// holds several records for the same slot, the first one is matched and
/// the others are deleted. Lists keep input order.
pub fn diff(desired: &[DnsEntry], observed: &[ObservedEntry]) -> SetDifference {
    let mut result = SetDifference::default();

    let mut wanted: HashMap<EntryKey, &DnsEntry> = HashMap::with_capacity(desired.len());
    for entry in desired {
        wanted.entry(entry.key()).or_insert(entry);
    }

    let mut matched: HashMap<EntryKey, &ObservedEntry> = HashMap::with_capacity(observed.len());
    for current in observed {
        if current.is_unsupported() {
            result.delete.push(current.clone());
            continue;
        }
        match matched.entry(current.key()) {
            Entry::Occupied(_) => result.delete.push(current.clone()),
            Entry::Vacant(slot) => {
                slot.insert(current);
            }
        }
    }

    for entry in desired {
        let key = entry.key();
        if !matched.contains_key(&key) && wanted.remove(&key).is_some() {
            result.add.push(entry.clone());
        }
    }

    for current in observed {
        let key = current.key();
        let is_match = matched
            .get(&key)
            .is_some_and(|first| std::ptr::eq(*first, current));
        if !is_match {
            continue;
        }
        match wanted.get(&key) {
            None => result.delete.push(current.clone()),
            Some(entry) if entry.has_same_value(&current.entry) => {
                result.unchanged.push(current.clone())
            }
            Some(entry) => result.update.push(Update {
                old: current.clone(),
                update: (*entry).clone(),
            }),
        }
    }

    result
}
