use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::broker::{Broker, JOB_QUEUE_KEY, REPLY_TIMEOUT, RedisBroker, result_key};
use super::credentials::CredentialPool;
use super::job::{Job, JobKind, JobReply};
use super::local::LocalDispatcher;
use super::metrics::{Metrics, MetricsSnapshot};
use super::retry::RetryExecutor;
use super::worker::run_worker;
use crate::config::CourierConfig;
use crate::error::DispatchError;
use crate::provider::{ProviderApi, ProviderClient};

/// How a submitted job reaches an executor. Selected once at construction,
/// never re-checked per call.
#[async_trait]
trait JobTransport: Send + Sync {
    async fn submit(&self, job: Job) -> Result<Value, DispatchError>;

    fn close(&self) {}
}

/// Runs jobs in this process, bounded by the concurrency limit.
struct LocalTransport {
    queue: LocalDispatcher,
    executor: RetryExecutor,
    api: Arc<dyn ProviderApi>,
}

#[async_trait]
impl JobTransport for LocalTransport {
    async fn submit(&self, job: Job) -> Result<Value, DispatchError> {
        let Job { id, kind, payload } = job;
        tracing::debug!(job_id = %id, kind = %kind, "running job locally");
        let api = Arc::clone(&self.api);
        self.queue
            .run(self.executor.execute(move |credential| {
                let api = Arc::clone(&api);
                let payload = payload.clone();
                async move { api.call(kind, &credential, &payload).await }
            }))
            .await
    }

    fn close(&self) {
        self.queue.close();
    }
}

/// Hands jobs to the fleet through the shared broker and waits for the
/// reply pushed under this job's correlation id.
struct BrokerTransport {
    broker: Arc<dyn Broker>,
    metrics: Arc<Metrics>,
    reply_timeout: std::time::Duration,
}

#[async_trait]
impl JobTransport for BrokerTransport {
    async fn submit(&self, job: Job) -> Result<Value, DispatchError> {
        let encoded = serde_json::to_string(&job)?;
        tracing::debug!(job_id = %job.id, kind = %job.kind, "pushing job to shared queue");

        self.metrics.job_queued();
        let waited = async {
            self.broker.push(JOB_QUEUE_KEY, &encoded).await?;
            self.broker
                .blocking_pop(&result_key(&job.id), Some(self.reply_timeout))
                .await
        }
        .await;
        self.metrics.job_dequeued();

        let raw = match waited? {
            Some(raw) => raw,
            None => return Err(DispatchError::BrokerTimeout),
        };
        let reply: JobReply = serde_json::from_str(&raw)?;
        if reply.ok {
            Ok(reply.data.unwrap_or(Value::Null))
        } else {
            Err(DispatchError::Remote(
                reply.error.unwrap_or_else(|| "unknown worker failure".into()),
            ))
        }
    }
}

/// The single entry point business code talks to.
///
/// Owns its credential pool, queue, and metrics: constructed explicitly,
/// torn down with [`Dispatcher::shutdown`], never a process-wide global.
/// The transport behind it (in-process pool or shared broker) is invisible
/// to callers.
pub struct Dispatcher {
    transport: Box<dyn JobTransport>,
    metrics: Arc<Metrics>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Build a dispatcher for the given configuration: distributed when a
    /// broker URL is configured, local otherwise.
    pub async fn from_config(config: &CourierConfig) -> Result<Self, DispatchError> {
        let api: Arc<dyn ProviderApi> =
            Arc::new(ProviderClient::with_base_url(config.api_url.clone()));
        match &config.redis_url {
            Some(url) => {
                let broker = Arc::new(RedisBroker::connect(url).await?);
                Ok(Self::with_broker(broker, api, config))
            }
            None => Ok(Self::local(api, config)),
        }
    }

    /// Local mode: jobs run in this process under the concurrency limit.
    pub fn local(api: Arc<dyn ProviderApi>, config: &CourierConfig) -> Self {
        let metrics = Arc::new(Metrics::default());
        let pool = Self::pool_from(config);
        let executor = RetryExecutor::new(pool, config.retry_policy(), Arc::clone(&metrics));
        let (shutdown, _) = watch::channel(false);
        tracing::info!(
            mode = "local",
            concurrency = config.concurrency,
            "dispatcher ready"
        );
        Self {
            transport: Box::new(LocalTransport {
                queue: LocalDispatcher::new(config.concurrency, Arc::clone(&metrics)),
                executor,
                api,
            }),
            metrics,
            shutdown,
            worker: Mutex::new(None),
        }
    }

    /// Distributed mode: submissions go through `broker` and a worker loop
    /// for the shared queue is spawned in this process.
    pub fn with_broker(
        broker: Arc<dyn Broker>,
        api: Arc<dyn ProviderApi>,
        config: &CourierConfig,
    ) -> Self {
        let metrics = Arc::new(Metrics::default());
        let pool = Self::pool_from(config);
        let executor = RetryExecutor::new(pool, config.retry_policy(), Arc::clone(&metrics));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(
            Arc::clone(&broker),
            Arc::clone(&api),
            executor,
            shutdown_rx,
        ));
        tracing::info!(mode = "distributed", "dispatcher ready, worker loop running");
        Self {
            transport: Box::new(BrokerTransport {
                broker,
                metrics: Arc::clone(&metrics),
                reply_timeout: REPLY_TIMEOUT,
            }),
            metrics,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    fn pool_from(config: &CourierConfig) -> Arc<CredentialPool> {
        let pool = Arc::new(CredentialPool::new(config.api_keys.clone()));
        if pool.is_empty() {
            tracing::warn!("no provider credentials configured, jobs will fail");
        }
        pool
    }

    /// Submit a chat-completion job and wait for the provider's response.
    pub async fn submit_chat(&self, payload: Value) -> Result<Value, DispatchError> {
        self.submit(JobKind::Chat, payload).await
    }

    /// Submit an audio-transcription job and wait for the provider's response.
    pub async fn submit_transcription(&self, payload: Value) -> Result<Value, DispatchError> {
        self.submit(JobKind::Transcribe, payload).await
    }

    async fn submit(&self, kind: JobKind, payload: Value) -> Result<Value, DispatchError> {
        self.transport.submit(Job::new(kind, payload)).await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Stop admitting jobs and stop the worker loop, waiting for it to wind
    /// down. Idempotent.
    pub async fn shutdown(&self) {
        self.transport.close();
        let _ = self.shutdown.send(true);
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.await;
        }
    }
}
