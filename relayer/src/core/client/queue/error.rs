use thiserror::Error;

use crate::core::client::storage::StorageError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    ErrorFromQueueError(#[from] omniqueue::QueueError),

    #[error("Queue {0} is not configured")]
    QueueNotFound(String),

    #[error("Failed to serialize job message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repeat registry storage error: {0}")]
    Storage(#[from] StorageError),
}
