use std::sync::Arc;
use std::time::Duration;

use omniqueue::Delivery;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

use crate::core::job_queue::{FailureOutcome, JobQueue};
use crate::error::{ConsumptionError, EventSystemError, EventSystemResult, JobError};
use crate::types::jobs::{JobMessage, VersionedJobMessage};
use crate::types::queue::QueueType;
use crate::worker::handlers::JobHandler;

const QUEUE_RECEIVE_WAIT: Duration = Duration::from_millis(500);
const QUEUE_NO_MESSAGE_SLEEP_DURATION: Duration = Duration::from_millis(100);
const QUEUE_ERROR_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Consumes one queue, running at most `concurrency` handlers at once.
#[derive(Clone)]
pub struct EventWorker {
    queue_type: QueueType,
    job_queue: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    cancellation_token: CancellationToken,
}

impl EventWorker {
    pub fn new(
        queue_type: QueueType,
        job_queue: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { queue_type, job_queue, handler, concurrency: concurrency.max(1), cancellation_token }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    fn create_job_span(&self, message: &JobMessage) -> Span {
        tracing::info_span!(
            "job_processing",
            job_id = %message.id,
            name = %message.name,
            q = %self.queue_type,
            kind = message.payload.kind(),
            attempt = message.attempts_made + 1,
            attempts = message.options.attempts
        )
    }

    /// Next delivery of the queue, `None` when the queue stayed empty
    async fn get_message(&self) -> EventSystemResult<Option<Delivery>> {
        match self.job_queue.receive(self.queue_type, QUEUE_RECEIVE_WAIT).await {
            Ok(delivery) => Ok(delivery),
            Err(e) => {
                error!(q = %self.queue_type, error = %e, "Failed to consume message from queue");
                Err(EventSystemError::FailedToConsumeFromQueue { error_msg: e.to_string() })
            }
        }
    }

    fn parse_message(&self, delivery: &Delivery) -> Result<JobMessage, ConsumptionError> {
        let malformed = |error_msg: String| ConsumptionError::MalformedPayload { queue: self.queue_type, error_msg };
        let payload = delivery.borrow_payload().ok_or_else(|| malformed("empty payload".to_string()))?;
        let versioned: VersionedJobMessage =
            serde_json::from_slice(payload).map_err(|e| malformed(e.to_string()))?;
        Ok(versioned.into_latest())
    }

    /// Malformed deliveries are recorded as failed and acknowledged so they are never redelivered.
    async fn reject_message(&self, delivery: Delivery, error: ConsumptionError) -> EventSystemResult<()> {
        error!(q = %self.queue_type, error = %error, "Rejecting malformed job payload");
        let payload = delivery.borrow_payload().map(<[u8]>::to_vec).unwrap_or_default();
        if let Err(e) = self.job_queue.record_malformed(self.queue_type, &payload, &error.to_string()).await {
            delivery.nack().await.map_err(|e| ConsumptionError::FailedToAcknowledgeMessage(e.0.to_string()))?;
            return Err(ConsumptionError::Queue(e).into());
        }
        delivery.ack().await.map_err(|e| ConsumptionError::FailedToAcknowledgeMessage(e.0.to_string()))?;
        Err(error.into())
    }

    /// Acknowledges the delivery once the outcome of the job is recorded: success, retry
    /// enqueued or permanent failure written. A delivery whose outcome could not be recorded is
    /// nacked and comes back.
    async fn post_processing(
        &self,
        result: Result<(), JobError>,
        delivery: Delivery,
        message: JobMessage,
    ) -> EventSystemResult<()> {
        let Err(error) = result else {
            delivery.ack().await.map_err(|e| ConsumptionError::FailedToAcknowledgeMessage(e.0.to_string()))?;
            info!(log_type = "completed", "Job {} completed", message.name);
            return Ok(());
        };

        let name = message.name.clone();
        match self.job_queue.retry_or_fail(self.queue_type, message, &error).await {
            Ok(outcome) => {
                delivery.ack().await.map_err(|e| ConsumptionError::FailedToAcknowledgeMessage(e.0.to_string()))?;
                if outcome == FailureOutcome::Failed {
                    return Err(ConsumptionError::FailedToHandleJob { name, error_msg: error.to_string() }.into());
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to record job outcome, message will be redelivered");
                delivery.nack().await.map_err(|e| ConsumptionError::FailedToAcknowledgeMessage(e.0.to_string()))?;
                Err(ConsumptionError::Queue(e).into())
            }
        }
    }

    async fn process_message(&self, delivery: Delivery) -> EventSystemResult<()> {
        let message = match self.parse_message(&delivery) {
            Ok(message) => message,
            Err(e) => return self.reject_message(delivery, e).await,
        };
        debug!(q = %self.queue_type, job_id = %message.id, "Received message from queue");

        let span = self.create_job_span(&message);
        async move {
            info!(log_type = "starting", "Job {} started", message.name);
            let result = self.handler.handle(&message).await;
            self.post_processing(result, delivery, message).await
        }
        .instrument(span)
        .await
    }

    /// Runs until the cancellation token fires, then waits for in-flight jobs.
    pub async fn run(&self) -> EventSystemResult<()> {
        let mut tasks = JoinSet::new();
        info!("Starting {} worker (pool_size={})", self.queue_type, self.concurrency);

        loop {
            if self.is_shutdown_requested() {
                info!("Shutdown requested, stopping message processing");
                break;
            }

            tokio::select! {
                biased;

                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::handle_task_result(result);
                }

                _ = self.cancellation_token.cancelled() => {
                    info!("Shutdown signal received, breaking from main loop");
                    break;
                }

                message_result = self.get_message(), if tasks.len() < self.concurrency => {
                    match message_result {
                        Ok(Some(delivery)) => {
                            let worker = self.clone();
                            tasks.spawn(async move { worker.process_message(delivery).await });
                        }
                        Ok(None) => sleep(QUEUE_NO_MESSAGE_SLEEP_DURATION).await,
                        Err(e) => {
                            error!("Error receiving message: {:?}", e);
                            sleep(QUEUE_ERROR_SLEEP_DURATION).await;
                        }
                    }
                }
            }
        }

        info!("Waiting for {} remaining tasks to complete", tasks.len());
        while let Some(result) = tasks.join_next().await {
            Self::handle_task_result(result);
        }
        info!("All tasks completed, worker shutdown complete");

        Ok(())
    }

    fn handle_task_result(result: Result<EventSystemResult<()>, tokio::task::JoinError>) {
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!("Task failed with application error: {}", e);
            }
            Err(e) => {
                error!("Task panicked or was cancelled: {:?}", e);
            }
        }
    }
}
