use relayer_prover_client_interface::ProverClientError;
use thiserror::Error;

use super::ErrorCategory;
use crate::core::client::beacon::BeaconError;
use crate::core::client::notification::NotificationError;
use crate::core::client::queue::QueueError;
use crate::core::client::storage::StorageError;
use crate::types::artifacts::ArtifactError;
use crate::types::queue::QueueType;

/// Errors returned by job handlers. They are caught by the queue consumer which applies the
/// retry policy of the job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Prover error: {0}")]
    Prover(#[source] ProverClientError),

    #[error("Prover returned malformed output, missing `{0}`")]
    MalformedProverOutput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Beacon API error: {0}")]
    Beacon(#[from] BeaconError),

    #[error("Progress cursor {0} is missing")]
    MissingCursor(String),

    #[error("Progress cursor {key} holds an invalid value: {value}")]
    InvalidCursor { key: String, value: String },

    #[error("Failed to serialize artifact: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Queue {queue} cannot handle {kind} payloads")]
    UnexpectedPayload { queue: QueueType, kind: &'static str },
}

impl From<ProverClientError> for JobError {
    fn from(value: ProverClientError) -> Self {
        match value {
            ProverClientError::MalformedOutput(field) => JobError::MalformedProverOutput(field),
            other => JobError::Prover(other),
        }
    }
}

impl JobError {
    /// Payloads routed to the wrong queue never succeed, everything else goes through the
    /// retry policy.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, JobError::UnexpectedPayload { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            JobError::MalformedProverOutput(_)
            | JobError::InvalidCursor { .. }
            | JobError::Serialization(_)
            | JobError::Artifact(_)
            | JobError::UnexpectedPayload { .. } => ErrorCategory::DataIntegrity,
            _ => ErrorCategory::TransientIo,
        }
    }
}
