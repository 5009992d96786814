use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use super::metrics::Metrics;
use crate::error::DispatchError;

/// In-process bounded-concurrency job runner.
///
/// At most `concurrency` admitted tasks run at any instant; everything else
/// waits. Tokio's semaphore queues waiters fairly, so waiting jobs are
/// admitted in FIFO submission order and no job is ever dropped. This is a
/// token-gated pool, not a fixed set of long-lived workers.
#[derive(Debug)]
pub struct LocalDispatcher {
    permits: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl LocalDispatcher {
    pub fn new(concurrency: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            metrics,
        }
    }

    /// Wait for admission, then drive `task` to completion.
    ///
    /// The task future is lazy: no provider work starts until a permit is
    /// held. Fails with `Closed` once [`LocalDispatcher::close`] has run.
    pub async fn run<T>(
        &self,
        task: impl Future<Output = Result<T, DispatchError>>,
    ) -> Result<T, DispatchError> {
        self.metrics.job_queued();
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.metrics.job_dequeued();
                return Err(DispatchError::Closed);
            }
        };
        self.metrics.job_dequeued();
        let result = task.await;
        drop(permit);
        result
    }

    /// Stop admitting jobs. Already-admitted tasks run to completion.
    pub fn close(&self) {
        self.permits.close();
    }
}
