//! Error types for the provider client.
//!
//! The dispatcher depends on exactly one thing from the provider contract:
//! every failure falls into one of three classes (rate limited, transient,
//! or fatal), and [`ProviderError::class`] performs that mapping.

use thiserror::Error;

/// How the retry layer must treat a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The provider throttled the active credential: rotate, back off, retry.
    RateLimited,
    /// Server-side or network trouble: back off and retry, no rotation.
    Transient,
    /// The request itself is bad: propagate immediately, never retry.
    Fatal,
}

/// Failures from a single provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider returned HTTP 429. `retry_after_ms` carries the
    /// `retry-after` header when present; it is logged but the dispatcher's
    /// own backoff schedule governs the actual delay.
    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    /// A 5xx-class response: the provider is having a bad moment.
    #[error("provider server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// A non-429 4xx-class response: the request was rejected.
    #[error("provider rejected request (status {status}): {message}")]
    Request { status: u16, message: String },

    /// Failure in the network layer (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a body we could not decode.
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::RateLimited { .. } => ErrorClass::RateLimited,
            ProviderError::Server { .. }
            | ProviderError::Network(_)
            | ProviderError::Parse(_) => ErrorClass::Transient,
            ProviderError::Request { .. } => ErrorClass::Fatal,
        }
    }

    /// Map a non-success, non-429 HTTP status to the matching variant.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        if (500..600).contains(&status) {
            ProviderError::Server { status, message }
        } else {
            ProviderError::Request { status, message }
        }
    }
}
