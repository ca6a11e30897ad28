//! Turns stored proof artifacts into verification transactions.
//!
//! One [`UpdatePublisher`] serves one protocol: it waits for a [`ProofReady`] notification,
//! reads the artifacts of the protocol, asks the compression service for the final proof and
//! submits `verify` on the destination chain. Notifications are handled one at a time and a
//! failed cycle leaves no state behind.

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use relayer_ethereum_settlement_client::conversion::decode_proof_bytes;
use relayer_prover_client_interface::CompressionClient;
use relayer_settlement_client_interface::{SettlementClient, SpeedTier, VerifyCall};
use relayer_utils::limbs::limbs_to_u128;
use strum_macros::Display;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

pub use error::PublishError;

use crate::core::client::notification::NotificationClient;
use crate::core::client::storage::StorageClient;
use crate::error::ErrorCategory;
use crate::types::artifacts::{ArtifactSet, ProofReady};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Idle,
    FetchingArtifacts,
    RequestingFinalProof,
    SubmittingTransaction,
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub protocol: String,
    pub speed: SpeedTier,
    pub compression_timeout: Duration,
    /// Wait for the verification transaction to be final before taking the next notification
    pub await_finality: bool,
}

pub struct UpdatePublisher {
    config: PublisherConfig,
    storage: Arc<dyn StorageClient>,
    notifications: Arc<dyn NotificationClient>,
    compression: Arc<dyn CompressionClient>,
    settlement: Arc<dyn SettlementClient>,
}

impl UpdatePublisher {
    pub fn new(
        config: PublisherConfig,
        storage: Arc<dyn StorageClient>,
        notifications: Arc<dyn NotificationClient>,
        compression: Arc<dyn CompressionClient>,
        settlement: Arc<dyn SettlementClient>,
    ) -> Self {
        Self { config, storage, notifications, compression, settlement }
    }

    fn enter(&self, state: PublisherState) {
        debug!(protocol = %self.config.protocol, state = %state, "Publisher state changed");
    }

    /// Listens on the protocol channel until `token` is cancelled. Subscription failures are
    /// retried every [`RESUBSCRIBE_DELAY`].
    pub async fn run(&self, token: CancellationToken) {
        let protocol = self.config.protocol.clone();
        let span = tracing::info_span!("publisher", protocol = %protocol, speed = %self.config.speed);
        async move {
            info!("Publisher started");
            while !token.is_cancelled() {
                let mut notifications = match self.notifications.subscribe(&protocol).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(
                            category = %ErrorCategory::TransientIo,
                            error = %e,
                            "Failed to subscribe to notifications, retrying"
                        );
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = sleep(RESUBSCRIBE_DELAY) => continue,
                        }
                    }
                };
                loop {
                    self.enter(PublisherState::Idle);
                    tokio::select! {
                        _ = token.cancelled() => break,
                        next = notifications.next() => {
                            let Some(notification) = next else {
                                warn!("Notification stream closed, subscribing again");
                                tokio::select! {
                                    _ = token.cancelled() => {}
                                    _ = sleep(RESUBSCRIBE_DELAY) => {}
                                }
                                break;
                            };
                            match self.run_cycle(&notification).await {
                                Ok(tx_hash) => info!(log_type = "completed", slot = notification.slot, tx_hash = %tx_hash, "Update published"),
                                Err(e) => error!(
                                    slot = notification.slot,
                                    cycle_id = %notification.cycle_id,
                                    category = %e.category(),
                                    error = %e,
                                    "Publisher cycle abandoned"
                                ),
                            }
                        }
                    }
                }
            }
            info!("Publisher stopped");
        }
        .instrument(span)
        .await
    }

    /// Publishes the artifacts announced by `notification`. Returns the transaction hash.
    pub async fn run_cycle(&self, notification: &ProofReady) -> Result<String, PublishError> {
        info!(log_type = "starting", slot = notification.slot, cycle_id = %notification.cycle_id, "Publisher cycle started");

        self.enter(PublisherState::FetchingArtifacts);
        let artifacts = ArtifactSet::load(self.storage.as_ref(), &self.config.protocol).await?;
        if artifacts.cycle_id != notification.cycle_id {
            debug!(stored = %artifacts.cycle_id, notified = %notification.cycle_id, "Artifacts were rewritten by a newer cycle");
        }
        let balance_sum = limbs_to_u128(&artifacts.final_layer_proof.balance_sum)?;

        self.enter(PublisherState::RequestingFinalProof);
        let body = timeout(
            self.config.compression_timeout,
            self.compression.compress_proof(
                &artifacts.balance_wrapper_verifier_only,
                &artifacts.balance_wrapper_proof_with_public_inputs,
            ),
        )
        .await
        .map_err(|_| PublishError::CompressionTimeout(self.config.compression_timeout))?
        .map_err(PublishError::Compression)?;
        let proof = decode_proof_bytes(&body);

        self.enter(PublisherState::SubmittingTransaction);
        let input = &artifacts.final_proof_input;
        let call = VerifyCall {
            proof,
            slot: input.slot,
            balance_sum,
            non_activated_validators: artifacts.final_layer_proof.number_of_non_activated_validators,
            active_validators: artifacts.final_layer_proof.number_of_active_validators,
            exited_validators: artifacts.final_layer_proof.number_of_exited_validators,
            slashed_validators: input.number_of_slashed_validators,
        };
        let tx_hash =
            self.settlement.submit_verification(call, self.config.speed).await.map_err(PublishError::Settlement)?;

        if self.config.await_finality {
            match self.settlement.wait_for_tx_finality(&tx_hash).await.map_err(PublishError::Settlement)? {
                Some(block) => info!(tx_hash = %tx_hash, block, "Verification transaction finalized"),
                None => warn!(tx_hash = %tx_hash, "Verification transaction not finalized"),
            }
        }
        Ok(tx_hash)
    }
}
