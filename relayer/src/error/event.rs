use thiserror::Error;

use crate::core::client::queue::QueueError;
use crate::types::queue::QueueType;

/// Result type for the queue consumers
pub type EventSystemResult<T> = Result<T, EventSystemError>;

/// EventSystemError - Error type for the queue consumers
#[derive(Error, Debug)]
pub enum EventSystemError {
    #[error("Failed to consume message from queue, error {error_msg:?}")]
    FailedToConsumeFromQueue { error_msg: String },

    #[error("Worker for queue {0} stopped unexpectedly")]
    WorkerStopped(QueueType),

    #[error("Worker task panicked: {0}")]
    WorkerPanicked(String),

    #[error("ConsumptionError: {0}")]
    FromConsumptionError(#[from] ConsumptionError),
}

/// Errors raised while handling one delivery
#[derive(Error, Debug)]
pub enum ConsumptionError {
    #[error("Failed to acknowledge message: {0}")]
    FailedToAcknowledgeMessage(String),

    #[error("Failed to handle job {name}. Error: {error_msg:?}")]
    FailedToHandleJob { name: String, error_msg: String },

    #[error("Malformed job payload on queue {queue}: {error_msg}")]
    MalformedPayload { queue: QueueType, error_msg: String },

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}
