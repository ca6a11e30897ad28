use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use omniqueue::backends::{InMemoryBackend, InMemoryConsumer, InMemoryProducer};
use omniqueue::Delivery;
use serde_json::value::RawValue;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

use super::{QueueClient, QueueError};
use crate::types::queue::QueueType;

struct QueuePair {
    producer: Arc<InMemoryProducer>,
    consumer: Mutex<InMemoryConsumer>,
}

/// Process-local queues used by tests and single-process runs. Delayed messages are held by a
/// timer task and lost if the process stops first.
pub struct InMemoryQueue {
    queues: HashMap<QueueType, QueuePair>,
}

impl InMemoryQueue {
    pub async fn new() -> Result<Self, QueueError> {
        let mut queues = HashMap::new();
        for queue in QueueType::iter() {
            let (producer, consumer) = InMemoryBackend::builder().build_pair().await?;
            queues.insert(queue, QueuePair { producer: Arc::new(producer), consumer: Mutex::new(consumer) });
        }
        Ok(Self { queues })
    }

    fn pair(&self, queue: QueueType) -> Result<&QueuePair, QueueError> {
        self.queues.get(&queue).ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn send_message(&self, queue: QueueType, payload: String, delay: Option<Duration>) -> Result<(), QueueError> {
        let pair = self.pair(queue)?;
        let payload = RawValue::from_string(payload)?;
        match delay {
            Some(delay) if !delay.is_zero() => {
                let producer = Arc::clone(&pair.producer);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = producer.send_serde_json(&payload).await {
                        tracing::error!(queue = %queue, error = %e, "Failed to send delayed message");
                    }
                });
            }
            _ => pair.producer.send_serde_json(&payload).await?,
        }
        Ok(())
    }

    async fn consume_message_from_queue(&self, queue: QueueType, wait: Duration) -> Result<Delivery, QueueError> {
        let mut consumer = self.pair(queue)?.consumer.lock().await;
        let mut deliveries = consumer.receive_all(1, wait).await?;
        deliveries.pop().ok_or(QueueError::ErrorFromQueueError(omniqueue::QueueError::NoData))
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
