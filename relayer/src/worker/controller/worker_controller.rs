use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::core::config::Config;
use crate::error::{EventSystemError, EventSystemResult};
use crate::types::queue::QueueType;
use crate::worker::handlers::JobHandler;
use crate::worker::repeat::RepeatDriver;

/// One queue consumer to start.
#[derive(Clone)]
pub struct WorkerSpec {
    pub queue: QueueType,
    pub handler: Arc<dyn JobHandler>,
    pub concurrency: usize,
}

/// Starts the queue consumers of a process, plus the repeat driver when asked to, and stops
/// them together.
#[derive(Clone)]
pub struct WorkerController {
    config: Arc<Config>,
    workers: Vec<WorkerSpec>,
    repeat_tick: Option<Duration>,
    cancellation_token: CancellationToken,
}

impl WorkerController {
    pub fn new(config: Arc<Config>, cancellation_token: CancellationToken) -> Self {
        Self { config, workers: Vec::new(), repeat_tick: None, cancellation_token }
    }

    pub fn with_worker(mut self, queue: QueueType, handler: Arc<dyn JobHandler>, concurrency: usize) -> Self {
        self.workers.push(WorkerSpec { queue, handler, concurrency });
        self
    }

    /// Also fire the repeatable jobs of the consumed queues every `tick`.
    pub fn with_repeat_driver(mut self, tick: Duration) -> Self {
        self.repeat_tick = Some(tick);
        self
    }

    /// Runs every worker until shutdown. A worker that fails takes the others down with it.
    pub async fn run(&self) -> EventSystemResult<()> {
        let mut worker_set = JoinSet::new();
        for spec in self.workers.iter().cloned() {
            let self_clone = self.clone();
            worker_set.spawn(async move { self_clone.create_span(spec).await });
        }

        if let Some(tick) = self.repeat_tick {
            let queues = self.workers.iter().map(|spec| spec.queue).collect();
            let driver = RepeatDriver::new(
                self.config.job_queue().clone(),
                queues,
                tick,
                self.cancellation_token.child_token(),
            );
            worker_set.spawn(async move {
                driver.run().instrument(info_span!("repeat_driver")).await;
                Ok(())
            });
        }

        while let Some(result) = worker_set.join_next().await {
            let outcome = result.map_err(|e| EventSystemError::WorkerPanicked(e.to_string())).and_then(|r| r);
            if let Err(e) = outcome {
                self.cancellation_token.cancel();
                while worker_set.join_next().await.is_some() {}
                return Err(e);
            }
        }
        Ok(())
    }

    async fn create_span(&self, spec: WorkerSpec) -> EventSystemResult<()> {
        let q = spec.queue;
        let span = info_span!("worker", q = %q);

        async move {
            let token = self.cancellation_token.child_token();
            let result = self.config.job_queue().clone().consume(q, spec.concurrency, spec.handler, token).await;
            match result {
                Ok(()) if self.cancellation_token.is_cancelled() => Ok(()),
                Ok(()) => {
                    warn!("Worker for queue {} completed unexpectedly", q);
                    Err(EventSystemError::WorkerStopped(q))
                }
                Err(e) => {
                    error!("Worker for queue {} failed with infrastructure error: {:?}", q, e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Signals every worker to stop. In-flight jobs finish before `run` returns.
    pub fn shutdown(&self) {
        info!("Initiating WorkerController graceful shutdown");
        self.cancellation_token.cancel();
    }
}
