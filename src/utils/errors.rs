//! Error types for pa-query
//!
//! All error types use thiserror for clean error handling.
//! SECURITY: Error messages MUST NOT contain API keys or sensitive data.

/// Top-level error type for appliance operations
///
/// The four variants map to the failure classes the rest of the crate
/// branches on:
///
/// - `Configuration`: malformed/missing configuration. Fatal at construction,
///   never retried.
/// - `Authentication`: credential rejected by the appliance. Fatal to
///   single-target construction; in fleet mode the target is dropped.
/// - `Connection`: transport failure (refused, timeout, name resolution).
///   The only retryable class.
/// - `Api`: the appliance accepted the request and answered with a
///   protocol-level error. Deterministic, never retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApplianceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),
}

impl ApplianceError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only transport-level failures are transient. A protocol-level error is
    /// deterministic: the appliance parsed the request and rejected it, so
    /// retrying the same request cannot succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApplianceError::Connection(_))
    }
}
