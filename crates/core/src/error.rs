//! Error taxonomy shared by every layer.

use thiserror::Error;

/// Result type used across the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is converted at the HTTP boundary into `{ "error": <message> }`.
/// Only `Configuration` and `Gateway` carry processor-specific detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required secret or field is missing. Never retried.
    #[error("{0}")]
    Configuration(String),

    /// A payment processor rejected the request. The processor's explanation is
    /// preserved verbatim.
    #[error("{0}")]
    Gateway(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller does not own the store it is acting on. Never retried.
    #[error("unauthorized")]
    Unauthorized,

    /// A uniqueness rule was violated (e.g. duplicate ledger-account code).
    #[error("{0}")]
    Conflict(String),

    /// A requested resource (store, method, account) does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The storage layer failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether a caller (e.g. a reconciliation job) may try the same call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::Storage(_))
    }
}
