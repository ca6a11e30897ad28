pub mod proof_generation;
pub mod update_polling;

use async_trait::async_trait;

use crate::error::JobError;
use crate::types::jobs::JobMessage;

pub use proof_generation::ProofGenerationHandler;
pub use update_polling::UpdatePollingHandler;

/// Handles one job message. Errors go through the retry policy carried by the message.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, message: &JobMessage) -> Result<(), JobError>;
}
