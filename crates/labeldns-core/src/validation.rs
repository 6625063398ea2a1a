//! Field validation for desired entries
//!
//! Each rule is a plain function. Callers run every rule that applies to a
//! declaration and collect the resulting [`Violation`]s, so a single warning
//! can name all offending fields at once.

use crate::entry::Address;
use std::fmt;

/// Maximum length of a domain name in presentation format (RFC 1035)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of one label
const MAX_LABEL_LEN: usize = 63;

/// A single failed validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the offending field, as it appears in the label JSON
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Renders a list of violations for a log line
pub fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks that `value` is a fully-qualified domain name.
///
/// Rules:
/// - at most 253 characters, no trailing dot
/// - at least two labels, each 1..=63 characters
/// - labels are ASCII alphanumerics and hyphens, not starting or ending
///   with a hyphen
/// - the top-level label is alphabetic (or an `xn--` punycode label)
pub fn check_fqdn(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }
    if value.len() > MAX_NAME_LEN {
        return Err(format!(
            "must be at most {MAX_NAME_LEN} characters (got {})",
            value.len()
        ));
    }

    let labels: Vec<&str> = value.split('.').collect();
    if labels.len() < 2 {
        return Err(format!("'{value}' is not fully qualified"));
    }

    for label in &labels {
        if label.is_empty() {
            return Err(format!("'{value}' contains an empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(format!(
                "label '{label}' is longer than {MAX_LABEL_LEN} characters"
            ));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("label '{label}' contains invalid characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label '{label}' starts or ends with a hyphen"));
        }
    }

    let tld = labels[labels.len() - 1];
    let punycode = tld.len() > 4 && tld[..4].eq_ignore_ascii_case("xn--");
    if !punycode && !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("top-level domain '{tld}' must be alphabetic"));
    }

    Ok(())
}

/// Checks that `value` is an IPv4/IPv6 address or the dynamic sentinel
pub fn check_ip_or_dynamic(value: &str) -> Result<Address, String> {
    value
        .parse::<Address>()
        .map_err(|_| format!("'{value}' must be an IPv4/IPv6 address or \"DDNS\""))
}

/// Checks that `value` is an integer in `0..=65535`
pub fn check_priority(value: i64) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("{value} must be between 0 and 65535"))
}
