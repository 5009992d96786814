use thiserror::Error;

use crate::provider::ProviderError;

/// Failures crossing the dispatcher boundary.
///
/// Rate-limit and transient provider failures are absorbed inside the retry
/// layer up to the configured budget; only budget exhaustion and fatal
/// classifications surface here.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no provider credentials configured")]
    NoCredentials,

    /// A fatal provider rejection, propagated without retry.
    #[error("provider rejected the request: {0}")]
    Fatal(#[source] ProviderError),

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Distributed mode only: no result arrived within the reply timeout.
    /// The job may still complete later; its orphaned result expires via TTL.
    #[error("timed out waiting for a distributed job result")]
    BrokerTimeout,

    /// A broker frame carried a job kind this build does not know.
    #[error("unknown job kind: {0}")]
    UnknownJobKind(String),

    #[error("broker error: {0}")]
    Broker(#[from] redis::RedisError),

    #[error("failed to encode or decode a job frame: {0}")]
    Codec(#[from] serde_json::Error),

    /// A worker in another process ran the job and reported failure.
    #[error("remote worker failed: {0}")]
    Remote(String),

    #[error("dispatcher is shut down")]
    Closed,
}
