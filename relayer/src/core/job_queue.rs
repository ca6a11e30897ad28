//! Durable job queue: named, versioned job messages on top of a [`QueueClient`], with
//! fixed-delay retries, permanent failure records and a store-backed repeat registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use omniqueue::Delivery;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::client::queue::{QueueClient, QueueError};
use crate::core::client::storage::StorageClient;
use crate::error::{ErrorCategory, EventSystemResult, JobError};
use crate::types::jobs::{FailedJob, JobMessage, JobOptions, JobPayload, RepeatableJob, VersionedJobMessage};
use crate::types::queue::QueueType;
use crate::worker::controller::event_worker::EventWorker;
use crate::worker::handlers::JobHandler;

/// What happened to a job whose handler failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Re-enqueued as attempt `attempts_made` after `delay`
    Retried { attempts_made: u32, delay: Duration },
    /// Attempt budget exhausted or error not retryable, a [`FailedJob`] was recorded
    Failed,
}

pub struct JobQueue {
    queue: Arc<dyn QueueClient>,
    storage: Arc<dyn StorageClient>,
    registry_lock: Mutex<()>,
}

fn repeat_registry_key(queue: QueueType) -> String {
    format!("repeat:{queue}")
}

fn failed_job_key(queue: QueueType, name: &str) -> String {
    format!("failed:{queue}:{name}")
}

impl JobQueue {
    pub fn new(queue: Arc<dyn QueueClient>, storage: Arc<dyn StorageClient>) -> Self {
        Self { queue, storage, registry_lock: Mutex::new(()) }
    }

    async fn send(&self, queue: QueueType, message: JobMessage, delay: Option<Duration>) -> Result<(), QueueError> {
        let job_id = message.id;
        let name = message.name.clone();
        let payload = serde_json::to_string(&VersionedJobMessage::from(message))?;

        self.queue.send_message(queue, payload, delay).await.inspect_err(|e| {
            tracing::error!(q = %queue, job_id = %job_id, name = %name, error = ?e, "Failed to send message to queue");
        })?;

        tracing::debug!(
            q = %queue,
            job_id = %job_id,
            name = %name,
            delay_ms = ?delay.map(|d| d.as_millis()),
            "Sent job to queue"
        );
        Ok(())
    }

    /// Adds a job to `queue`.
    ///
    /// With a repeat option the job is registered under `name` in the repeat registry instead,
    /// replacing any earlier schedule of the same name, and the repeat driver enqueues it.
    pub async fn enqueue(
        &self,
        queue: QueueType,
        name: &str,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<(), QueueError> {
        let Some(repeat) = options.repeat.clone() else {
            return self.send(queue, JobMessage::new(name, payload, options), None).await;
        };

        let now = relayer_utils::time::now_millis();
        let mut job =
            RepeatableJob { name: name.to_string(), payload, options, every: repeat.every, next_run_at_ms: now };
        if !repeat.immediately {
            job.next_run_at_ms = now.saturating_add(job.every_ms());
        }

        let _guard = self.registry_lock.lock().await;
        let mut registry = self.read_registry(queue).await?;
        let replaced = registry.insert(name.to_string(), job).is_some();
        self.write_registry(queue, &registry).await?;

        tracing::info!(q = %queue, name = %name, every_ms = repeat.every, replaced, "Registered repeatable job");
        Ok(())
    }

    /// Every schedule registered on `queue`, ordered by name.
    pub async fn repeatable_jobs(&self, queue: QueueType) -> Result<Vec<RepeatableJob>, QueueError> {
        Ok(self.read_registry(queue).await?.into_values().collect())
    }

    /// Enqueues every schedule due at `now_ms` and moves it to its next run. Returns how many
    /// jobs were enqueued. On a send failure the schedules already enqueued are still advanced.
    pub async fn fire_due_repeats(&self, queue: QueueType, now_ms: i64) -> Result<usize, QueueError> {
        let _guard = self.registry_lock.lock().await;
        let mut registry = self.read_registry(queue).await?;

        let mut fired = 0;
        let mut send_error = None;
        for job in registry.values_mut().filter(|job| job.is_due(now_ms)) {
            let options = JobOptions { repeat: None, ..job.options.clone() };
            if let Err(e) = self.send(queue, JobMessage::new(job.name.clone(), job.payload.clone(), options), None).await {
                send_error = Some(e);
                break;
            }
            job.advance(now_ms);
            fired += 1;
        }

        // Jobs sent before a failure must not fire again on the next tick.
        if fired > 0 {
            self.write_registry(queue, &registry).await?;
        }
        match send_error {
            Some(e) => Err(e),
            None => Ok(fired),
        }
    }

    /// Applies the retry policy of `message` after its handler failed with `error`.
    pub async fn retry_or_fail(
        &self,
        queue: QueueType,
        message: JobMessage,
        error: &JobError,
    ) -> Result<FailureOutcome, QueueError> {
        if error.is_retryable() && message.has_attempts_left() {
            let delay = message.options.backoff.delay();
            let next = message.next_attempt();
            let attempts_made = next.attempts_made;
            tracing::warn!(
                q = %queue,
                job_id = %next.id,
                name = %next.name,
                attempts_made,
                attempts = next.options.attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Job failed, retrying"
            );
            self.send(queue, next, Some(delay)).await?;
            return Ok(FailureOutcome::Retried { attempts_made, delay });
        }

        let category =
            if error.is_retryable() { ErrorCategory::PermanentJobFailure } else { error.category() };
        let failed = FailedJob {
            id: Some(message.id),
            name: message.name.clone(),
            attempts_made: message.attempts_made + 1,
            failed_reason: error.to_string(),
            failed_at: chrono::Utc::now(),
        };
        tracing::error!(
            q = %queue,
            job_id = %message.id,
            name = %message.name,
            attempts_made = failed.attempts_made,
            category = %category,
            error = %error,
            "Job failed permanently"
        );
        self.record_failure(queue, &failed).await?;
        Ok(FailureOutcome::Failed)
    }

    /// Records a delivery whose payload could not be parsed. The job name is taken from the
    /// payload when it carries one.
    pub async fn record_malformed(&self, queue: QueueType, payload: &[u8], reason: &str) -> Result<(), QueueError> {
        let value: Option<serde_json::Value> = serde_json::from_slice(payload).ok();
        let field = |name: &str| value.as_ref().and_then(|v| v.get(name)).and_then(|v| v.as_str()).map(str::to_string);
        let id = field("id").and_then(|id| Uuid::parse_str(&id).ok());
        let name = field("name").unwrap_or_else(|| format!("malformed-{}", Uuid::new_v4()));

        let failed = FailedJob { id, name, attempts_made: 0, failed_reason: reason.to_string(), failed_at: chrono::Utc::now() };
        self.record_failure(queue, &failed).await
    }

    async fn record_failure(&self, queue: QueueType, failed: &FailedJob) -> Result<(), QueueError> {
        let blob = Bytes::from(serde_json::to_vec(failed)?);
        self.storage.put_data(blob, &failed_job_key(queue, &failed.name)).await?;
        Ok(())
    }

    /// Last permanent failure recorded for `name` on `queue`.
    pub async fn failed_job(&self, queue: QueueType, name: &str) -> Result<Option<FailedJob>, QueueError> {
        match self.storage.get_data(&failed_job_key(queue, name)).await? {
            Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
            None => Ok(None),
        }
    }

    /// Waits up to `wait` for the next delivery of `queue`.
    pub async fn receive(&self, queue: QueueType, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        match self.queue.consume_message_from_queue(queue, wait).await {
            Ok(delivery) => Ok(Some(delivery)),
            Err(QueueError::ErrorFromQueueError(omniqueue::QueueError::NoData)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Runs `handler` over `queue` with at most `concurrency` jobs in flight until `token` is
    /// cancelled.
    pub async fn consume(
        self: Arc<Self>,
        queue: QueueType,
        concurrency: usize,
        handler: Arc<dyn JobHandler>,
        token: CancellationToken,
    ) -> EventSystemResult<()> {
        EventWorker::new(queue, self, handler, concurrency, token).run().await
    }

    async fn read_registry(&self, queue: QueueType) -> Result<BTreeMap<String, RepeatableJob>, QueueError> {
        match self.storage.get_data(&repeat_registry_key(queue)).await? {
            Some(blob) => Ok(serde_json::from_slice(&blob)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn write_registry(
        &self,
        queue: QueueType,
        registry: &BTreeMap<String, RepeatableJob>,
    ) -> Result<(), QueueError> {
        let blob = Bytes::from(serde_json::to_vec(registry)?);
        self.storage.put_data(blob, &repeat_registry_key(queue)).await?;
        Ok(())
    }
}
