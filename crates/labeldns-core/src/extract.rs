//! Desired-state extraction
//!
//! Turns the JSON label attached to each container into validated
//! [`DnsEntry`] values.
//!
//! ## Label format
//!
//! The label value is always a JSON array, even for a single entry:
//!
//! ```json
//! [
//!   { "type": "A", "name": "home.example.com", "address": "DDNS", "proxied": false },
//!   { "type": "CNAME", "name": "www.example.com", "target": "example.com", "proxied": true },
//!   { "type": "MX", "name": "example.com", "server": "mail.example.com", "priority": 10 },
//!   { "type": "NS", "name": "sub.example.com", "server": "ns1.example.com" }
//! ]
//! ```
//!
//! Nothing in a label is ever fatal. Every problem is reported as an
//! [`ExtractionWarning`], logged once, and the offending container or
//! element is skipped.
//!
//! ## Conflicts
//!
//! When several declarations claim the same [`EntryKey`], none of them
//! wins, even when their values are identical: every contributor is
//! dropped for the cycle and one warning lists the containers involved.

use crate::entry::{DnsEntry, EntryKey, RecordData, RecordType};
use crate::error::{Error, Result};
use crate::traits::ContainerDescriptor;
use crate::validation::{self, Violation};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

const COMPONENT: &str = "DesiredStateExtractor";

/// A skipped container, element or conflicting key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionWarning {
    /// The container does not carry the tracking label at all
    MissingLabel { container_id: String },
    /// The label value is not JSON
    InvalidJson { container_id: String, error: String },
    /// The label value is JSON but not an array
    NotAnArray { container_id: String },
    /// The label value is an empty array
    EmptyArray { container_id: String },
    /// An element is not a JSON object
    NotAnObject { container_id: String, index: usize },
    /// An element carries a provider-owned `id`
    IdentityField { container_id: String, index: usize },
    /// An element has a missing or unrecognised `type`
    UnrecognizedType { container_id: String, index: usize },
    /// An element failed field validation
    Invalid {
        container_id: String,
        index: usize,
        violations: Vec<Violation>,
    },
    /// The same record slot was declared more than once
    Conflict {
        record_type: RecordType,
        name: String,
        container_ids: Vec<String>,
    },
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::MissingLabel { container_id } => {
                write!(f, "container {container_id} does not carry the tracking label")
            }
            ExtractionWarning::InvalidJson {
                container_id,
                error,
            } => write!(
                f,
                "container {container_id} has a non JSON formatted label ({error})"
            ),
            ExtractionWarning::NotAnArray { container_id } => write!(
                f,
                "container {container_id} has a label that is not a JSON array, wrap entries in [ ]"
            ),
            ExtractionWarning::EmptyArray { container_id } => {
                write!(f, "container {container_id} has an empty array as its label")
            }
            ExtractionWarning::NotAnObject {
                container_id,
                index,
            } => write!(
                f,
                "container {container_id} entry #{index} is not a JSON object"
            ),
            ExtractionWarning::IdentityField {
                container_id,
                index,
            } => write!(
                f,
                "container {container_id} entry #{index} has 'id' within its JSON label, please remove it"
            ),
            ExtractionWarning::UnrecognizedType {
                container_id,
                index,
            } => write!(
                f,
                "container {container_id} entry #{index} has a missing or unrecognised type, expected A, CNAME, MX or NS"
            ),
            ExtractionWarning::Invalid {
                container_id,
                index,
                violations,
            } => write!(
                f,
                "container {container_id} entry #{index} has validation errors: {}",
                validation::describe(violations)
            ),
            ExtractionWarning::Conflict {
                record_type,
                name,
                container_ids,
            } => write!(
                f,
                "duplicate declarations for {{type: {record_type}, name: {name}}} in containers [{}], all of them are ignored",
                container_ids.join(", ")
            ),
        }
    }
}

/// Result of one extraction pass
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Valid, conflict-free entries in first-seen order
    pub entries: Vec<DnsEntry>,
    /// Everything that was skipped
    pub warnings: Vec<ExtractionWarning>,
}

/// Extracts desired entries from container labels
#[derive(Debug, Default)]
pub struct DesiredStateExtractor {
    label_key: OnceLock<String>,
}

impl DesiredStateExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label key holding the declarations.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] when called twice.
    pub fn initialize(&self, label_key: impl Into<String>) -> Result<()> {
        self.label_key
            .set(label_key.into())
            .map_err(|_| Error::AlreadyInitialized(COMPONENT))
    }

    /// The label key, once initialised
    pub fn label_key(&self) -> Option<&str> {
        self.label_key.get().map(String::as_str)
    }

    /// Extract the desired entries, logging every warning.
    pub fn extract(&self, containers: &[ContainerDescriptor]) -> Result<Vec<DnsEntry>> {
        let extraction = self.extract_with_warnings(containers)?;
        for warning in &extraction.warnings {
            warn!("{COMPONENT}: {warning}");
        }
        Ok(extraction.entries)
    }

    /// Extract the desired entries and return the warnings instead of
    /// logging them.
    pub fn extract_with_warnings(&self, containers: &[ContainerDescriptor]) -> Result<Extraction> {
        let label_key = self
            .label_key
            .get()
            .ok_or(Error::NotInitialized(COMPONENT))?;

        let mut warnings = Vec::new();
        let mut order: Vec<EntryKey> = Vec::new();
        let mut groups: HashMap<EntryKey, Vec<(String, DnsEntry)>> = HashMap::new();

        for container in containers {
            let declarations = match read_label(container, label_key) {
                Ok(declarations) => declarations,
                Err(warning) => {
                    warnings.push(warning);
                    continue;
                }
            };

            for (index, declaration) in declarations.iter().enumerate() {
                match parse_declaration(declaration) {
                    Ok(entry) => {
                        let key = entry.key();
                        let group = groups.entry(key.clone()).or_default();
                        if group.is_empty() {
                            order.push(key);
                        }
                        group.push((container.id.clone(), entry));
                    }
                    Err(rejection) => {
                        warnings.push(rejection.into_warning(&container.id, index));
                    }
                }
            }
        }

        let mut entries = Vec::with_capacity(order.len());
        for key in order {
            let Some(mut group) = groups.remove(&key) else {
                continue;
            };
            if group.len() == 1 {
                let (_, entry) = group.swap_remove(0);
                entries.push(entry);
                continue;
            }
            let (_, first) = &group[0];
            warnings.push(ExtractionWarning::Conflict {
                record_type: first.record_type(),
                name: first.name.clone(),
                container_ids: group.iter().map(|(id, _)| id.clone()).collect(),
            });
        }

        Ok(Extraction { entries, warnings })
    }
}

fn read_label(
    container: &ContainerDescriptor,
    label_key: &str,
) -> std::result::Result<Vec<Value>, ExtractionWarning> {
    let container_id = container.id.clone();
    let Some(raw) = container.label(label_key) else {
        return Err(ExtractionWarning::MissingLabel { container_id });
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) if items.is_empty() => {
            Err(ExtractionWarning::EmptyArray { container_id })
        }
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(ExtractionWarning::NotAnArray { container_id }),
        Err(e) => Err(ExtractionWarning::InvalidJson {
            container_id,
            error: e.to_string(),
        }),
    }
}

enum Rejection {
    NotAnObject,
    IdentityField,
    UnrecognizedType,
    Invalid(Vec<Violation>),
}

impl Rejection {
    fn into_warning(self, container_id: &str, index: usize) -> ExtractionWarning {
        let container_id = container_id.to_string();
        match self {
            Rejection::NotAnObject => ExtractionWarning::NotAnObject {
                container_id,
                index,
            },
            Rejection::IdentityField => ExtractionWarning::IdentityField {
                container_id,
                index,
            },
            Rejection::UnrecognizedType => ExtractionWarning::UnrecognizedType {
                container_id,
                index,
            },
            Rejection::Invalid(violations) => ExtractionWarning::Invalid {
                container_id,
                index,
                violations,
            },
        }
    }
}

/// Builds a typed entry from one declaration, collecting every violation
fn parse_declaration(declaration: &Value) -> std::result::Result<DnsEntry, Rejection> {
    let Value::Object(fields) = declaration else {
        return Err(Rejection::NotAnObject);
    };
    if fields.contains_key("id") {
        return Err(Rejection::IdentityField);
    }
    let record_type = fields
        .get("type")
        .and_then(parse_type)
        .ok_or(Rejection::UnrecognizedType)?;

    let mut violations = Vec::new();
    let name = fqdn_field(fields, "name", &mut violations);

    let data = match record_type {
        RecordType::A => {
            let address = string_field(fields, "address", &mut violations).and_then(|value| {
                validation::check_ip_or_dynamic(value)
                    .map_err(|message| violations.push(Violation::new("address", message)))
                    .ok()
            });
            let proxied = proxied_field(fields, &mut violations);
            address
                .zip(proxied)
                .map(|(address, proxied)| RecordData::A { address, proxied })
        }
        RecordType::Cname => {
            let target = fqdn_field(fields, "target", &mut violations);
            let proxied = proxied_field(fields, &mut violations);
            target
                .zip(proxied)
                .map(|(target, proxied)| RecordData::Cname { target, proxied })
        }
        RecordType::Mx => {
            let server = fqdn_field(fields, "server", &mut violations);
            let priority = priority_field(fields, &mut violations);
            server
                .zip(priority)
                .map(|(server, priority)| RecordData::Mx { server, priority })
        }
        RecordType::Ns => fqdn_field(fields, "server", &mut violations)
            .map(|server| RecordData::Ns { server }),
        RecordType::Unsupported => return Err(Rejection::UnrecognizedType),
    };

    match (name, data) {
        (Some(name), Some(data)) if violations.is_empty() => Ok(DnsEntry::new(name, data)),
        _ => Err(Rejection::Invalid(violations)),
    }
}

/// Accepts the type names, or the numeric discriminants `0..=3`
fn parse_type(value: &Value) -> Option<RecordType> {
    match value {
        Value::String(s) => match s.as_str() {
            "A" => Some(RecordType::A),
            "CNAME" => Some(RecordType::Cname),
            "MX" => Some(RecordType::Mx),
            "NS" => Some(RecordType::Ns),
            _ => None,
        },
        Value::Number(n) => match n.as_u64()? {
            0 => Some(RecordType::A),
            1 => Some(RecordType::Cname),
            2 => Some(RecordType::Mx),
            3 => Some(RecordType::Ns),
            _ => None,
        },
        _ => None,
    }
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    field: &str,
    violations: &mut Vec<Violation>,
) -> Option<&'a str> {
    match fields.get(field) {
        Some(Value::String(value)) => Some(value),
        Some(_) => {
            violations.push(Violation::new(field, "must be a string"));
            None
        }
        None => {
            violations.push(Violation::new(field, "is required"));
            None
        }
    }
}

fn fqdn_field(
    fields: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    let value = string_field(fields, field, violations)?;
    match validation::check_fqdn(value) {
        Ok(()) => Some(value.to_string()),
        Err(message) => {
            violations.push(Violation::new(field, message));
            None
        }
    }
}

/// `proxied`, with `proxy` accepted as an alias
fn proxied_field(fields: &Map<String, Value>, violations: &mut Vec<Violation>) -> Option<bool> {
    let (field, value) = ["proxied", "proxy"]
        .into_iter()
        .find_map(|field| fields.get(field).map(|value| (field, value)))
        .unzip();
    match value {
        Some(Value::Bool(proxied)) => Some(*proxied),
        Some(_) => {
            violations.push(Violation::new(field.unwrap_or("proxied"), "must be a boolean"));
            None
        }
        None => {
            violations.push(Violation::new("proxied", "is required"));
            None
        }
    }
}

fn priority_field(fields: &Map<String, Value>, violations: &mut Vec<Violation>) -> Option<u16> {
    let value = match fields.get("priority") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(_) => None,
        None => {
            violations.push(Violation::new("priority", "is required"));
            return None;
        }
    };
    let Some(value) = value else {
        violations.push(Violation::new("priority", "must be an integer"));
        return None;
    };
    validation::check_priority(value)
        .map_err(|message| violations.push(Violation::new("priority", message)))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Address;
    use serde_json::json;

    const LABEL: &str = "project-label.instance-id";

    fn extractor() -> DesiredStateExtractor {
        let extractor = DesiredStateExtractor::new();
        extractor.initialize(LABEL).unwrap();
        extractor
    }

    fn container(id: &str, label: Value) -> ContainerDescriptor {
        ContainerDescriptor::new(id).with_label(LABEL, label.to_string())
    }

    fn raw_container(id: &str, label: &str) -> ContainerDescriptor {
        ContainerDescriptor::new(id).with_label(LABEL, label)
    }

    #[test]
    fn requires_initialization() {
        let extractor = DesiredStateExtractor::new();
        let result = extractor.extract(&[]);
        assert!(matches!(result, Err(Error::NotInitialized(_))));
    }

    #[test]
    fn initialize_twice_fails() {
        let extractor = extractor();
        assert!(matches!(
            extractor.initialize("other"),
            Err(Error::AlreadyInitialized(_))
        ));
        assert_eq!(extractor.label_key(), Some(LABEL));
    }

    #[test]
    fn extracts_every_supported_type() {
        let label = json!([
            { "type": "A", "name": "a.example.com", "address": "1.1.1.1", "proxied": false },
            { "type": "CNAME", "name": "www.example.com", "target": "example.com", "proxied": true },
            { "type": "MX", "name": "example.com", "server": "mail.example.com", "priority": 10 },
            { "type": "NS", "name": "sub.example.com", "server": "ns1.example.com" },
        ]);

        let extraction = extractor()
            .extract_with_warnings(&[container("c1", label)])
            .unwrap();

        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        assert_eq!(
            extraction.entries,
            vec![
                DnsEntry::a("a.example.com", "1.1.1.1".parse::<std::net::IpAddr>().unwrap(), false),
                DnsEntry::cname("www.example.com", "example.com", true),
                DnsEntry::mx("example.com", "mail.example.com", 10),
                DnsEntry::ns("sub.example.com", "ns1.example.com"),
            ]
        );
    }

    #[test]
    fn accepts_numeric_types_and_proxy_alias() {
        let label = json!([{ "type": 0, "name": "a.example.com", "address": "DDNS", "proxy": true }]);

        let entries = extractor().extract(&[container("c1", label)]).unwrap();

        assert_eq!(entries, vec![DnsEntry::a("a.example.com", Address::Dynamic, true)]);
    }

    #[test]
    fn empty_array_warns_once() {
        let extraction = extractor()
            .extract_with_warnings(&[raw_container("c1", "[]")])
            .unwrap();

        assert!(extraction.entries.is_empty());
        assert_eq!(
            extraction.warnings,
            vec![ExtractionWarning::EmptyArray {
                container_id: "c1".to_string()
            }]
        );
    }

    #[test]
    fn non_json_and_non_array_labels_are_distinguished() {
        let extraction = extractor()
            .extract_with_warnings(&[
                raw_container("c1", "not json"),
                raw_container("c2", r#"{"type":"A"}"#),
                ContainerDescriptor::new("c3"),
            ])
            .unwrap();

        assert!(extraction.entries.is_empty());
        assert!(matches!(
            &extraction.warnings[0],
            ExtractionWarning::InvalidJson { container_id, .. } if container_id == "c1"
        ));
        assert_eq!(
            extraction.warnings[1],
            ExtractionWarning::NotAnArray {
                container_id: "c2".to_string()
            }
        );
        assert_eq!(
            extraction.warnings[2],
            ExtractionWarning::MissingLabel {
                container_id: "c3".to_string()
            }
        );
    }

    #[test]
    fn skips_elements_with_identity_field() {
        let label = json!([
            { "id": "abc", "type": "NS", "name": "sub.example.com", "server": "ns1.example.com" },
            { "type": "NS", "name": "other.example.com", "server": "ns1.example.com" },
        ]);

        let extraction = extractor()
            .extract_with_warnings(&[container("c1", label)])
            .unwrap();

        assert_eq!(extraction.entries, vec![DnsEntry::ns("other.example.com", "ns1.example.com")]);
        assert_eq!(
            extraction.warnings,
            vec![ExtractionWarning::IdentityField {
                container_id: "c1".to_string(),
                index: 0
            }]
        );
    }

    #[test]
    fn skips_unrecognized_types() {
        let label = json!([
            { "type": "invalid", "something": "hi" },
            { "type": -1, "name": "invalid-2" },
            { "type": "Unsupported", "name": "x.example.com" },
            { "type": 4, "name": "x.example.com" },
            { "name": "no-type.example.com" },
        ]);

        let extraction = extractor()
            .extract_with_warnings(&[container("c1", label)])
            .unwrap();

        assert!(extraction.entries.is_empty());
        assert_eq!(extraction.warnings.len(), 5);
        assert!(extraction
            .warnings
            .iter()
            .all(|w| matches!(w, ExtractionWarning::UnrecognizedType { .. })));
    }

    #[test]
    fn collects_every_violation_of_an_element() {
        let label = json!([
            { "type": "MX", "name": "not a name", "server": 12, "priority": 70000 },
        ]);

        let extraction = extractor()
            .extract_with_warnings(&[container("c1", label)])
            .unwrap();

        let ExtractionWarning::Invalid { violations, .. } = &extraction.warnings[0] else {
            panic!("expected a validation warning, got {:?}", extraction.warnings);
        };
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "server", "priority"]);
    }

    #[test]
    fn validates_a_record_fields() {
        let label = json!([
            { "type": "A", "name": "a.example.com", "address": "not-an-ip", "proxied": false },
            { "type": "A", "name": "b.example.com", "address": "1.1.1.1", "proxied": "yes" },
            { "type": "A", "name": "c.example.com", "address": "1.1.1.1" },
            { "type": "MX", "name": "example.com", "server": "mail.example.com", "priority": 1.5 },
        ]);

        let extraction = extractor()
            .extract_with_warnings(&[container("c1", label)])
            .unwrap();

        assert!(extraction.entries.is_empty());
        let fields: Vec<Vec<String>> = extraction
            .warnings
            .iter()
            .map(|w| match w {
                ExtractionWarning::Invalid { violations, .. } => {
                    violations.iter().map(|v| v.field.clone()).collect()
                }
                other => panic!("unexpected warning {other:?}"),
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                vec!["address".to_string()],
                vec!["proxied".to_string()],
                vec!["proxied".to_string()],
                vec!["priority".to_string()],
            ]
        );
    }

    #[test]
    fn conflicting_declarations_drop_every_contributor() {
        let first = json!([{ "type": "A", "name": "test.example.com", "address": "1.1.1.1", "proxied": false }]);
        let second = json!([{ "type": "A", "name": "test.example.com", "address": "2.2.2.2", "proxied": false }]);
        let other = json!([{ "type": "NS", "name": "sub.example.com", "server": "ns1.example.com" }]);

        let extraction = extractor()
            .extract_with_warnings(&[
                container("c1", first),
                container("c2", other),
                container("c3", second),
            ])
            .unwrap();

        assert_eq!(extraction.entries, vec![DnsEntry::ns("sub.example.com", "ns1.example.com")]);
        assert_eq!(
            extraction.warnings,
            vec![ExtractionWarning::Conflict {
                record_type: RecordType::A,
                name: "test.example.com".to_string(),
                container_ids: vec!["c1".to_string(), "c3".to_string()],
            }]
        );
        let message = extraction.warnings[0].to_string();
        assert!(message.contains("c1") && message.contains("c3"));
    }

    #[test]
    fn conflicts_within_one_container_are_detected() {
        let label = json!([
            { "type": "NS", "name": "sub.example.com", "server": "ns1.example.com" },
            { "type": "NS", "name": "sub.example.com", "server": "ns2.example.com" },
        ]);

        let extraction = extractor()
            .extract_with_warnings(&[container("c1", label)])
            .unwrap();

        assert!(extraction.entries.is_empty());
        assert_eq!(extraction.warnings.len(), 1);
    }

    #[test]
    fn identical_declarations_are_duplicates_too() {
        let label = json!([{ "type": "MX", "name": "duplicate.example.com", "server": "mail.example.com", "priority": 10 }]);

        let extraction = extractor()
            .extract_with_warnings(&[container("dup-1", label.clone()), container("dup-2", label)])
            .unwrap();

        assert!(extraction.entries.is_empty());
        assert_eq!(
            extraction.warnings,
            vec![ExtractionWarning::Conflict {
                record_type: RecordType::Mx,
                name: "duplicate.example.com".to_string(),
                container_ids: vec!["dup-1".to_string(), "dup-2".to_string()],
            }]
        );
    }
}
