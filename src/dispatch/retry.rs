use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use super::credentials::CredentialPool;
use super::metrics::Metrics;
use crate::error::DispatchError;
use crate::provider::{ErrorClass, ProviderError};

/// Upper bound on the random jitter added to every backoff delay. Jitter
/// de-synchronizes retry storms when many callers hit the rate limit at the
/// same instant on a shared credential pool.
const MAX_JITTER_MS: u64 = 500;

/// Retry settings for provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. Zero means a single attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_millis(1200),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay for a zero-indexed attempt, with fresh jitter:
    /// `base * 2^attempt + jitter(0..500ms)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..MAX_JITTER_MS));
        self.delay_with_jitter(attempt, jitter)
    }

    /// Delay with an explicit jitter value (deterministic, for tests).
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .saturating_add(jitter)
    }
}

/// Wraps a single provider call with bounded retries, exponential backoff,
/// and credential rotation on rate limiting.
///
/// The call closure receives the currently active credential on every
/// attempt, so a rotation triggered by one attempt is visible to the next.
pub struct RetryExecutor {
    pool: Arc<CredentialPool>,
    policy: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl RetryExecutor {
    pub fn new(pool: Arc<CredentialPool>, policy: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            policy,
            metrics,
        }
    }

    /// Run `call` until it succeeds, fails fatally, or the retry budget is
    /// spent.
    ///
    /// Rate-limit failures rotate the pool before backing off; transient
    /// failures back off in place; fatal failures propagate immediately.
    /// No rotation or sleep happens once the budget is gone, so
    /// `max_retries = 0` performs exactly one attempt.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<T, DispatchError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let credential = self.pool.active()?;
            let err = match call(credential).await {
                Ok(value) => {
                    self.metrics.job_processed();
                    return Ok(value);
                }
                Err(err) => err,
            };

            match err.class() {
                ErrorClass::Fatal => {
                    tracing::warn!(error = %err, "provider rejected job, not retrying");
                    return Err(DispatchError::Fatal(err));
                }
                _ if attempt >= self.policy.max_retries => {
                    return Err(DispatchError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: err,
                    });
                }
                ErrorClass::RateLimited => self.pool.rotate(),
                ErrorClass::Transient => {}
            }

            let delay = self.policy.delay_for_attempt(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "provider call failed, backing off"
            );
            self.metrics.retry();
            sleep(delay).await;
            attempt += 1;
        }
    }
}
