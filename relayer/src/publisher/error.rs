use std::time::Duration;

use relayer_prover_client_interface::ProverClientError;
use relayer_utils::limbs::LimbError;
use thiserror::Error;

use crate::core::client::notification::NotificationError;
use crate::error::ErrorCategory;
use crate::types::artifacts::ArtifactError;

/// Errors that end one publisher cycle. None of them stops the publisher loop.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Invalid balance sum: {0}")]
    BalanceSum(#[from] LimbError),

    #[error("Compression service error: {0}")]
    Compression(#[source] ProverClientError),

    #[error("Compression service did not answer within {0:?}")]
    CompressionTimeout(Duration),

    #[error("Settlement error: {0}")]
    Settlement(color_eyre::Report),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

impl PublishError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PublishError::Artifact(ArtifactError::Storage(_)) => ErrorCategory::TransientIo,
            PublishError::Artifact(_) | PublishError::BalanceSum(_) => ErrorCategory::DataIntegrity,
            PublishError::Compression(_)
            | PublishError::CompressionTimeout(_)
            | PublishError::Settlement(_)
            | PublishError::Notification(_) => ErrorCategory::TransientIo,
        }
    }
}
