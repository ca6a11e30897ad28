use std::sync::Arc;

use async_trait::async_trait;
use relayer_prover_client_interface::ProverClient;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::config::Config;
use crate::error::JobError;
use crate::types::artifacts::{ArtifactSet, ProofReady};
use crate::types::jobs::{JobMessage, JobPayload};
use crate::types::queue::QueueType;
use crate::worker::handlers::JobHandler;

/// Drives the prover for one [`ProofInput`](relayer_prover_client_interface::ProofInput),
/// stores the four artifacts and then signals the protocol channel.
pub struct ProofGenerationHandler {
    config: Arc<Config>,
    prover: Arc<dyn ProverClient>,
}

impl ProofGenerationHandler {
    pub fn new(config: Arc<Config>, prover: Arc<dyn ProverClient>) -> Self {
        Self { config, prover }
    }
}

#[async_trait]
impl JobHandler for ProofGenerationHandler {
    async fn handle(&self, message: &JobMessage) -> Result<(), JobError> {
        let JobPayload::ProofInput(input) = &message.payload else {
            return Err(JobError::UnexpectedPayload { queue: QueueType::ProofGeneration, kind: message.payload.kind() });
        };
        let protocol = &input.protocol_id;
        info!(log_type = "starting", protocol = %protocol, slot = input.slot, "Proof generation started");

        let output = self.prover.generate_proof(input).await.inspect_err(|e| {
            error!(protocol = %protocol, error = %e, "Prover request failed");
        })?;
        let proven = output.validate()?;

        let artifacts = ArtifactSet::from_proof(input, proven, Uuid::new_v4());
        for (key, blob) in artifacts.encode(protocol)? {
            debug!(key = %key, size = blob.len(), "Writing artifact");
            self.config.storage().put_data(blob, &key).await?;
        }

        let notification = ProofReady { protocol_id: protocol.clone(), cycle_id: artifacts.cycle_id, slot: input.slot };
        let receivers = self.config.notifications().publish(protocol, &notification).await?;

        info!(
            log_type = "completed",
            protocol = %protocol,
            slot = input.slot,
            cycle_id = %artifacts.cycle_id,
            receivers,
            "Proof generation completed"
        );
        Ok(())
    }
}
