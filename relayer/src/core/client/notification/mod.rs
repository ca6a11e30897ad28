pub mod memory;
pub mod redis;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::artifacts::ProofReady;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Failed to encode notification: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-protocol publish/subscribe channel signalling that a new final proof is stored.
///
/// Delivery is fire-and-forget: a notification published while nobody listens is dropped.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// Publishes on the channel named after `protocol`. Returns the number of subscribers reached.
    async fn publish(&self, protocol: &str, notification: &ProofReady) -> Result<usize, NotificationError>;

    /// Stream of the notifications published on `protocol` from now on.
    async fn subscribe(&self, protocol: &str) -> Result<BoxStream<'static, ProofReady>, NotificationError>;
}
