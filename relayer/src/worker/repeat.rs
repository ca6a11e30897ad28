use std::sync::Arc;
use std::time::Duration;

use relayer_utils::time::now_millis;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::job_queue::JobQueue;
use crate::types::queue::QueueType;

/// Enqueues the repeatable jobs of its queues as they fall due. Run one per deployment.
pub struct RepeatDriver {
    job_queue: Arc<JobQueue>,
    queues: Vec<QueueType>,
    tick: Duration,
    cancellation_token: CancellationToken,
}

impl RepeatDriver {
    pub fn new(
        job_queue: Arc<JobQueue>,
        queues: Vec<QueueType>,
        tick: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self { job_queue, queues, tick, cancellation_token }
    }

    /// Fires every due schedule once. Returns the number of jobs enqueued.
    pub async fn fire_once(&self) -> usize {
        let now = now_millis();
        let mut fired = 0;
        for queue in &self.queues {
            match self.job_queue.fire_due_repeats(*queue, now).await {
                Ok(count) => fired += count,
                Err(e) => error!(q = %queue, error = %e, "Failed to fire repeatable jobs"),
            }
        }
        if fired > 0 {
            debug!(fired, "Fired repeatable jobs");
        }
        fired
    }

    pub async fn run(&self) {
        info!(queues = ?self.queues, tick_ms = self.tick.as_millis() as u64, "Starting repeat driver");
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                _ = ticker.tick() => {
                    self.fire_once().await;
                }
            }
        }
        info!("Repeat driver stopped");
    }
}
