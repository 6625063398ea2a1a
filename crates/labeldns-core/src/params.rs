//! Record parameter builder
//!
//! Maps a canonical entry to the payload of a provider create/update call.

use crate::entry::{Address, DnsEntry, RecordData};
use crate::error::{Error, Result};
use crate::traits::RecordParams;

/// Builds provider write payloads carrying this deployment's tracking comment
#[derive(Debug, Clone)]
pub struct RecordParamsBuilder {
    comment: String,
}

impl RecordParamsBuilder {
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
        }
    }

    /// The tracking comment attached to every payload
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Build the payload for writing `entry` into `zone_id`.
    ///
    /// # Errors
    ///
    /// [`Error::Unreachable`] for unsupported entries and for A records
    /// still holding the dynamic sentinel. Both are filtered out before
    /// any write is planned.
    pub fn build(&self, zone_id: &str, entry: &DnsEntry) -> Result<RecordParams> {
        let (content, proxied, priority) = match &entry.data {
            RecordData::A {
                address: Address::Ip(ip),
                proxied,
            } => (ip.to_string(), Some(*proxied), None),
            RecordData::A {
                address: Address::Dynamic,
                ..
            } => {
                return Err(Error::Unreachable(format!(
                    "dynamic address of {entry} was not resolved before the write"
                )));
            }
            RecordData::Cname { target, proxied } => (target.clone(), Some(*proxied), None),
            RecordData::Mx { server, priority } => (server.clone(), None, Some(*priority)),
            RecordData::Ns { server } => (server.clone(), None, None),
            RecordData::Unsupported { native_type } => {
                return Err(Error::Unreachable(format!(
                    "cannot build write parameters for unsupported {native_type} record {}",
                    entry.name
                )));
            }
        };

        Ok(RecordParams {
            zone_id: zone_id.to_string(),
            record_type: entry.record_type().as_str().to_string(),
            name: entry.name.clone(),
            content,
            proxied,
            priority,
            comment: self.comment.clone(),
        })
    }
}
