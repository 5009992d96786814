use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::DispatchError;

/// Well-known key of the shared job queue.
pub const JOB_QUEUE_KEY: &str = "courier:jobs";

/// How long a submitter waits for its result before giving up.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long an undelivered result lives before the store drops it.
pub const RESULT_TTL: Duration = Duration::from_secs(60);

/// Per-job result key; only the submitting caller ever pops it.
pub fn result_key(id: &str) -> String {
    format!("courier:result:{id}")
}

/// The contract the dispatcher needs from a shared store: a FIFO list per
/// string key with blocking pop and per-key expiry. Payloads are opaque.
/// Pop has atomic take-one semantics, so competing worker processes each
/// receive a given frame exactly once; everything stronger (durability,
/// cross-key ordering) is the store's concern, not ours.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a payload to the tail of the list at `key`.
    async fn push(&self, key: &str, payload: &str) -> Result<(), DispatchError>;

    /// Pop from the head of the list at `key`, waiting up to `timeout`
    /// (`None` blocks indefinitely). `Ok(None)` means the wait timed out.
    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, DispatchError>;

    /// Schedule `key` for deletion after `ttl`.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), DispatchError>;
}

/// Redis-backed broker: RPUSH / BLPOP / EXPIRE over a managed connection.
pub struct RedisBroker {
    conn: redis::aio::ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self, DispatchError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("connected to broker");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn push(&self, key: &str, payload: &str) -> Result<(), DispatchError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(key, payload).await?;
        Ok(())
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, DispatchError> {
        let mut conn = self.conn.clone();
        // BLPOP treats 0 as "block forever".
        let timeout_secs = timeout.map_or(0.0, |t| t.as_secs_f64());
        let popped: Option<(String, String)> = conn.blpop(key, timeout_secs).await?;
        Ok(popped.map(|(_, value)| value))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), DispatchError> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }
}

/// In-memory broker with the same push/blocking-pop semantics as the Redis
/// implementation. Stands in for a live server in tests; polling keeps the
/// double simple.
#[cfg(test)]
pub(crate) struct MemoryBroker {
    queues: std::sync::Mutex<std::collections::HashMap<String, std::collections::VecDeque<String>>>,
}

#[cfg(test)]
impl MemoryBroker {
    pub(crate) fn new() -> Self {
        Self {
            queues: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn pop_now(&self, key: &str) -> Option<String> {
        self.queues
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|queue| queue.pop_front())
    }
}

#[cfg(test)]
#[async_trait]
impl Broker for MemoryBroker {
    async fn push(&self, key: &str, payload: &str) -> Result<(), DispatchError> {
        self.queues
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, DispatchError> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            if let Some(value) = self.pop_now(key) {
                return Ok(Some(value));
            }
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), DispatchError> {
        // Entries live until popped; real expiry is the external store's job.
        Ok(())
    }
}
