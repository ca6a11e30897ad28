pub mod config;
pub mod event;
pub mod job;

use thiserror::Error;

use crate::core::client::notification::NotificationError;
use crate::core::client::queue::QueueError;
use crate::core::client::storage::StorageError;
use crate::publisher::PublishError;
pub use config::ConfigError;
pub use event::{ConsumptionError, EventSystemError, EventSystemResult};
pub use job::JobError;

/// Result type for relayer operations
pub type RelayerResult<T> = Result<T, RelayerError>;

/// Broad failure classes shared by every error type of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid or missing configuration, fatal at startup
    Configuration,
    /// Store, queue, HTTP or RPC failure worth retrying
    TransientIo,
    /// Malformed or inconsistent data, the current cycle is aborted
    DataIntegrity,
    /// A job ran out of attempts
    PermanentJobFailure,
}

/// Error types for the relayer
#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Notification error: {0}")]
    NotificationError(#[from] NotificationError),

    #[error("Job error: {0}")]
    JobError(#[from] JobError),

    #[error("Publish error: {0}")]
    PublishError(#[from] PublishError),

    #[error("Event System Error: {0}")]
    EventSystemError(#[from] EventSystemError),

    /// Client construction error
    #[error("Client error: {0}")]
    ClientError(String),

    #[error("Relayer Error: {0}")]
    RelayerAnyHowError(#[from] anyhow::Error),
}

impl RelayerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayerError::ConfigError(_) | RelayerError::ClientError(_) => ErrorCategory::Configuration,
            RelayerError::JobError(e) => e.category(),
            RelayerError::PublishError(e) => e.category(),
            RelayerError::StorageError(_)
            | RelayerError::QueueError(_)
            | RelayerError::NotificationError(_)
            | RelayerError::EventSystemError(_)
            | RelayerError::RelayerAnyHowError(_) => ErrorCategory::TransientIo,
        }
    }
}
