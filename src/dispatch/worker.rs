//! Shared-queue worker loop.
//!
//! Every process with a broker configured runs one of these: it pops jobs
//! from the well-known queue, executes them through the retry layer, and
//! pushes the reply onto the job's per-id result key with a short TTL.
//! Multiple instances compete safely because the broker's pop hands each
//! frame to exactly one of them.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use super::broker::{Broker, JOB_QUEUE_KEY, RESULT_TTL, result_key};
use super::job::{JobReply, decode_job};
use super::retry::RetryExecutor;
use crate::provider::ProviderApi;

/// Pause after a failed pop before hitting the broker again.
const POP_RETRY_PAUSE: Duration = Duration::from_secs(1);

pub(crate) async fn run_worker(
    broker: Arc<dyn Broker>,
    api: Arc<dyn ProviderApi>,
    executor: RetryExecutor,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(queue = JOB_QUEUE_KEY, "worker loop started");
    loop {
        let popped = tokio::select! {
            _ = shutdown.changed() => break,
            popped = broker.blocking_pop(JOB_QUEUE_KEY, None) => popped,
        };

        let raw = match popped {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(err) => {
                tracing::error!(error = %err, "failed to pop from job queue");
                tokio::time::sleep(POP_RETRY_PAUSE).await;
                continue;
            }
        };

        let job = match decode_job(&raw) {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(error = %err, "discarding undecodable job frame");
                // Unblock the caller if the frame at least carried an id.
                if let Some(id) = wire_id(&raw) {
                    deliver(broker.as_ref(), &id, &JobReply::failure(&err)).await;
                }
                continue;
            }
        };

        tracing::debug!(job_id = %job.id, kind = %job.kind, "executing distributed job");
        let call_api = Arc::clone(&api);
        let kind = job.kind;
        let payload = job.payload.clone();
        let outcome = executor
            .execute(move |credential| {
                let api = Arc::clone(&call_api);
                let payload = payload.clone();
                async move { api.call(kind, &credential, &payload).await }
            })
            .await;

        let reply = match outcome {
            Ok(data) => JobReply::success(data),
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "distributed job failed");
                JobReply::failure(&err)
            }
        };
        deliver(broker.as_ref(), &job.id, &reply).await;
    }
    tracing::info!("worker loop stopped");
}

async fn deliver(broker: &dyn Broker, id: &str, reply: &JobReply) {
    let key = result_key(id);
    let encoded = match serde_json::to_string(reply) {
        Ok(encoded) => encoded,
        Err(err) => {
            tracing::error!(job_id = %id, error = %err, "failed to encode job reply");
            return;
        }
    };
    if let Err(err) = broker.push(&key, &encoded).await {
        tracing::error!(job_id = %id, error = %err, "failed to deliver job reply");
        return;
    }
    if let Err(err) = broker.expire(&key, RESULT_TTL).await {
        tracing::warn!(job_id = %id, error = %err, "failed to set reply expiry");
    }
}

fn wire_id(raw: &str) -> Option<String> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::dispatch::broker::MemoryBroker;
    use crate::dispatch::credentials::CredentialPool;
    use crate::dispatch::job::{Job, JobKind};
    use crate::dispatch::metrics::Metrics;
    use crate::dispatch::retry::RetryPolicy;
    use crate::provider::ProviderError;

    /// Echoes the payload back, tagged with the kind that ran.
    struct EchoProvider;

    #[async_trait]
    impl ProviderApi for EchoProvider {
        async fn call(
            &self,
            kind: JobKind,
            _credential: &str,
            payload: &Value,
        ) -> Result<Value, ProviderError> {
            Ok(json!({"kind": kind.as_str(), "echo": payload}))
        }
    }

    /// Always rejects with a fatal error.
    struct RejectingProvider;

    #[async_trait]
    impl ProviderApi for RejectingProvider {
        async fn call(
            &self,
            _kind: JobKind,
            _credential: &str,
            _payload: &Value,
        ) -> Result<Value, ProviderError> {
            Err(ProviderError::Request {
                status: 400,
                message: "malformed".into(),
            })
        }
    }

    fn spawn_worker(
        broker: Arc<MemoryBroker>,
        api: Arc<dyn ProviderApi>,
    ) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let pool = Arc::new(CredentialPool::new(vec!["k1".into()]));
        let executor = RetryExecutor::new(
            pool,
            RetryPolicy {
                max_retries: 0,
                base_backoff: Duration::from_millis(1),
            },
            Arc::new(Metrics::default()),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_worker(broker, api, executor, rx));
        (tx, handle)
    }

    async fn pop_reply(broker: &MemoryBroker, id: &str) -> JobReply {
        let raw = broker
            .blocking_pop(&result_key(id), Some(Duration::from_secs(2)))
            .await
            .unwrap()
            .expect("worker should have delivered a reply");
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn worker_executes_jobs_and_delivers_replies() {
        let broker = Arc::new(MemoryBroker::new());
        let (_tx, _handle) = spawn_worker(Arc::clone(&broker), Arc::new(EchoProvider));

        let job = Job::new(JobKind::Chat, json!({"q": 1}));
        broker
            .push(JOB_QUEUE_KEY, &serde_json::to_string(&job).unwrap())
            .await
            .unwrap();

        let reply = pop_reply(&broker, &job.id).await;
        assert!(reply.ok);
        assert_eq!(reply.data.unwrap(), json!({"kind": "chat", "echo": {"q": 1}}));
    }

    #[tokio::test]
    async fn failed_jobs_still_unblock_the_caller() {
        let broker = Arc::new(MemoryBroker::new());
        let (_tx, _handle) = spawn_worker(Arc::clone(&broker), Arc::new(RejectingProvider));

        let job = Job::new(JobKind::Chat, json!({}));
        broker
            .push(JOB_QUEUE_KEY, &serde_json::to_string(&job).unwrap())
            .await
            .unwrap();

        let reply = pop_reply(&broker, &job.id).await;
        assert!(!reply.ok);
        assert!(reply.error.unwrap().contains("provider rejected"));
    }

    #[tokio::test]
    async fn unknown_kind_frames_get_an_error_reply() {
        let broker = Arc::new(MemoryBroker::new());
        let (_tx, _handle) = spawn_worker(Arc::clone(&broker), Arc::new(EchoProvider));

        broker
            .push(
                JOB_QUEUE_KEY,
                r#"{"id":"mystery-1","kind":"video","payload":{}}"#,
            )
            .await
            .unwrap();

        let reply = pop_reply(&broker, "mystery-1").await;
        assert!(!reply.ok);
        assert!(reply.error.unwrap().contains("unknown job kind: video"));
    }

    #[tokio::test]
    async fn worker_keeps_running_after_a_bad_frame() {
        let broker = Arc::new(MemoryBroker::new());
        let (_tx, _handle) = spawn_worker(Arc::clone(&broker), Arc::new(EchoProvider));

        broker.push(JOB_QUEUE_KEY, "garbage").await.unwrap();
        let job = Job::new(JobKind::Transcribe, json!({"file": "AAAA"}));
        broker
            .push(JOB_QUEUE_KEY, &serde_json::to_string(&job).unwrap())
            .await
            .unwrap();

        let reply = pop_reply(&broker, &job.id).await;
        assert!(reply.ok);
        assert_eq!(reply.data.unwrap()["kind"], "transcribe");
    }

    #[tokio::test]
    async fn worker_stops_on_shutdown_signal() {
        let broker = Arc::new(MemoryBroker::new());
        let (tx, handle) = spawn_worker(Arc::clone(&broker), Arc::new(EchoProvider));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly")
            .unwrap();
    }
}
