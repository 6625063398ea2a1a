//! Error types for the labeldns system
//!
//! This module defines all error types used throughout the crate.
//!
//! Fatal conditions (double initialisation, scheduler misuse, empty zone
//! listings, provider failures) are variants of [`Error`]. Degraded
//! conditions such as a malformed container label never become an `Error`;
//! they are logged and skipped where they are detected.

use thiserror::Error;

/// Result type alias for labeldns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the labeldns system
#[derive(Error, Debug)]
pub enum Error {
    /// A component was initialised twice
    #[error("{0}: already initialized, but attempted to initialize again")]
    AlreadyInitialized(&'static str),

    /// A component was used before `initialize()` was called
    #[error("{0}: not initialized, call initialize first")]
    NotInitialized(&'static str),

    /// `start()` was called on a running scheduler
    #[error("{0}: scheduler already started")]
    SchedulerAlreadyStarted(String),

    /// `stop()` was called on a stopped scheduler
    #[error("{0}: scheduler already stopped")]
    SchedulerAlreadyStopped(String),

    /// The provider returned no zones, nothing can be reconciled
    #[error("no zones returned by the DNS provider")]
    NoZones,

    /// An internal invariant was violated
    #[error("unreachable state: {0}")]
    Unreachable(String),

    /// Container runtime errors
    #[error("Container source error: {0}")]
    Container(String),

    /// Public IP lookup errors
    #[error("IP source error: {0}")]
    IpSource(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// An error wrapped with the operation that was being attempted
    #[error("{message}: {source}")]
    Context {
        /// What was being attempted
        message: String,
        /// The underlying cause
        #[source]
        source: Box<Error>,
    },

    /// One or more provider writes of a sync cycle were rejected
    #[error("{failed} of {attempted} provider writes failed: {}", summarize(.errors))]
    WriteFailures {
        /// Number of rejected writes
        failed: usize,
        /// Number of writes issued
        attempted: usize,
        /// Every rejection, in issue order
        errors: Vec<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn summarize(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a container source error
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with a description of the failed operation.
    ///
    /// The original error stays reachable through
    /// [`std::error::Error::source`].
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
