use paybook_core::DomainError;
use thiserror::Error;

/// Failure talking to a processor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// The processor said no. Message is the processor's own explanation.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Malformed(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

impl From<GatewayError> for DomainError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Configuration(msg) => DomainError::Configuration(msg),
            GatewayError::InvalidRequest(msg) => DomainError::Validation(msg),
            other => DomainError::Gateway(other.to_string()),
        }
    }
}
