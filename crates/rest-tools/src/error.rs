//! Error types for `unrelated-rest-tools`.

use crate::retry::RetryPolicy;
use crate::safety::sanitize_reqwest_error;
use serde_json::Value;
use thiserror::Error;

/// Failure of a REST gateway operation.
#[derive(Error, Debug)]
pub enum RestError {
    /// Configuration errors (invalid base URL, client build failure).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request could not be built (bad path, bad header, unserializable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Outbound request refused by the safety policy.
    #[error("Outbound HTTP blocked: {0}")]
    Blocked(String),

    /// Network failure, timeout, connection refused.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status.
    #[error("API returned {status} {status_text}: {body}")]
    Backend {
        status: u16,
        status_text: String,
        body: Value,
    },

    /// The backend answered 2xx, but the body is not usable JSON.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type alias for REST gateway operations.
pub type Result<T> = std::result::Result<T, RestError>;

impl RestError {
    /// Whether a failed attempt may be retried under `policy`.
    #[must_use]
    pub fn is_retryable(&self, policy: &RetryPolicy) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Backend { status, .. } => policy.retryable_statuses.contains(status),
            Self::Config(_) | Self::InvalidRequest(_) | Self::Blocked(_) | Self::Decode(_) => false,
        }
    }

    /// HTTP status code, if the backend produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() {
            Self::InvalidRequest(sanitize_reqwest_error(&value))
        } else {
            Self::Transport(sanitize_reqwest_error(&value))
        }
    }
}
