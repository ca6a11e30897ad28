use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::client::beacon::BeaconClient;
use crate::core::config::Config;
use crate::error::JobError;
use crate::types::cursor::{advance_cursor, read_cursor};
use crate::types::jobs::{JobMessage, JobOptions, JobPayload, SlotUpdate};
use crate::types::queue::QueueType;
use crate::worker::handlers::JobHandler;

/// Checks the finalized head of the beacon chain and hands the next slot, `slots_jump` past the
/// cursor, to proof input generation once it is finalized.
pub struct UpdatePollingHandler {
    config: Arc<Config>,
    beacon: Arc<dyn BeaconClient>,
}

impl UpdatePollingHandler {
    pub fn new(config: Arc<Config>, beacon: Arc<dyn BeaconClient>) -> Self {
        Self { config, beacon }
    }
}

#[async_trait]
impl JobHandler for UpdatePollingHandler {
    async fn handle(&self, message: &JobMessage) -> Result<(), JobError> {
        let JobPayload::UpdateJob(job) = &message.payload else {
            return Err(JobError::UnexpectedPayload { queue: QueueType::UpdatePolling, kind: message.payload.kind() });
        };
        let key = &job.last_downloaded_update_key;
        let storage = self.config.storage().as_ref();

        let last_slot = read_cursor(storage, key).await?.ok_or_else(|| JobError::MissingCursor(key.clone()))?;
        let finalized = self.beacon.finalized_slot(&job.beacon_rest_apis).await?;
        let next_slot = last_slot.saturating_add(job.slots_jump);

        if finalized < next_slot {
            info!(cursor = last_slot, finalized, next_slot, "Next update is not finalized yet");
            return Ok(());
        }

        let update = SlotUpdate {
            cursor_key: key.clone(),
            network: job.network_config.network.clone(),
            previous_slot: last_slot,
            slot: next_slot,
        };
        self.config
            .job_queue()
            .enqueue(
                QueueType::SlotUpdate,
                &format!("{}:{next_slot}", message.name),
                JobPayload::SlotUpdate(update),
                JobOptions::default(),
            )
            .await?;

        let stored = advance_cursor(storage, key, next_slot).await?;
        info!(log_type = "completed", previous_slot = last_slot, slot = stored, finalized, "Progress cursor advanced");
        Ok(())
    }
}
