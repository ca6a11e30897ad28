use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use omniqueue::backends::redis::RedisMultiplexedConnectionManager;
use omniqueue::backends::{RedisBackend, RedisConfig, RedisConsumer, RedisProducer};
use omniqueue::Delivery;
use serde_json::value::RawValue;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

use super::{QueueClient, QueueError};
use crate::types::params::StoreParams;
use crate::types::queue::QueueType;

const MAX_CONNECTIONS: u16 = 8;
/// Deliveries not acknowledged within this window are handed to another consumer.
const ACK_DEADLINE_MS: i64 = 15 * 60 * 1000;

struct QueuePair {
    producer: RedisProducer<RedisMultiplexedConnectionManager>,
    consumer: Mutex<RedisConsumer<RedisMultiplexedConnectionManager>>,
}

fn queue_config(params: &StoreParams, queue: QueueType, consumer_name: &str) -> RedisConfig {
    let key = format!("{}:{}", params.queue_prefix, queue);
    RedisConfig {
        dsn: params.redis_url.clone(),
        max_connections: MAX_CONNECTIONS,
        reinsert_on_nack: false,
        queue_key: key.clone(),
        delayed_queue_key: format!("{key}:delayed"),
        delayed_lock_key: format!("{key}:delayed_lock"),
        consumer_group: format!("{key}:consumers"),
        consumer_name: consumer_name.to_string(),
        payload_key: "payload".to_string(),
        ack_deadline_ms: ACK_DEADLINE_MS,
    }
}

/// Redis streams backed queues, one stream per [`QueueType`].
pub struct RedisQueue {
    queues: HashMap<QueueType, QueuePair>,
}

impl RedisQueue {
    pub async fn new(params: &StoreParams) -> Result<Self, QueueError> {
        let consumer_name = format!("consumer-{}", uuid::Uuid::new_v4());
        let mut queues = HashMap::new();
        for queue in QueueType::iter() {
            let config = queue_config(params, queue, &consumer_name);
            let (producer, consumer) =
                RedisBackend::<RedisMultiplexedConnectionManager>::builder(config).build_pair().await?;
            queues.insert(queue, QueuePair { producer, consumer: Mutex::new(consumer) });
        }
        Ok(Self { queues })
    }

    fn pair(&self, queue: QueueType) -> Result<&QueuePair, QueueError> {
        self.queues.get(&queue).ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))
    }
}

#[async_trait]
impl QueueClient for RedisQueue {
    async fn send_message(&self, queue: QueueType, payload: String, delay: Option<Duration>) -> Result<(), QueueError> {
        let pair = self.pair(queue)?;
        let payload = RawValue::from_string(payload)?;
        match delay {
            Some(delay) if !delay.is_zero() => pair.producer.send_serde_json_scheduled(&payload, delay).await?,
            _ => pair.producer.send_serde_json(&payload).await?,
        }
        tracing::debug!(queue = %queue, delay = ?delay, "Sent message to queue");
        Ok(())
    }

    async fn consume_message_from_queue(&self, queue: QueueType, wait: Duration) -> Result<Delivery, QueueError> {
        let mut consumer = self.pair(queue)?.consumer.lock().await;
        let mut deliveries = consumer.receive_all(1, wait).await?;
        deliveries.pop().ok_or(QueueError::ErrorFromQueueError(omniqueue::QueueError::NoData))
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        for queue in QueueType::iter() {
            self.pair(queue)?;
        }
        Ok(())
    }
}
