pub mod error;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
pub use error::QueueError;
use omniqueue::Delivery;

use crate::types::queue::QueueType;

/// Trait defining queue operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Sends `payload` (a JSON document) to `queue`, visible after `delay` when given.
    async fn send_message(&self, queue: QueueType, payload: String, delay: Option<Duration>) -> Result<(), QueueError>;

    /// Waits up to `wait` for one delivery. An empty queue yields `omniqueue::QueueError::NoData`.
    async fn consume_message_from_queue(&self, queue: QueueType, wait: Duration) -> Result<Delivery, QueueError>;

    /// Perform a health check on the queue backend
    async fn health_check(&self) -> Result<(), QueueError>;
}
