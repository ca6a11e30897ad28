//! Registers the recurring "fetch next update" job of a (network, light client) pair.

use std::sync::Arc;

use bytes::Bytes;
use relayer_utils::time::MAX_SLOTS_JUMP;
use tracing::info;

use crate::config::networks::{NetworkConfig, NetworkRegistry};
use crate::core::config::Config;
use crate::error::ConfigError;
use crate::types::cursor::{encode_slot, CursorKey};
use crate::types::jobs::{JobOptions, JobPayload, UpdateJob};
use crate::types::params::ScheduleParams;
use crate::types::queue::QueueType;
use crate::RelayerResult;

/// What a scheduling call registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUpdate {
    pub job_name: String,
    pub cursor_key: String,
    /// False when the cursor already existed and was left untouched
    pub cursor_initialized: bool,
    pub every_ms: u64,
}

pub struct UpdateScheduler {
    config: Arc<Config>,
    networks: NetworkRegistry,
}

impl UpdateScheduler {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_networks(config, NetworkRegistry::global().clone())
    }

    pub fn with_networks(config: Arc<Config>, networks: NetworkRegistry) -> Self {
        Self { config, networks }
    }

    /// Resolves the network and settles the endpoints: the ones named by `params`, else the
    /// network defaults.
    fn validate(&self, params: &ScheduleParams) -> Result<NetworkConfig, ConfigError> {
        let mut network = self.networks.resolve(&params.network)?.clone();
        if params.slots_jump == 0 || params.slots_jump > MAX_SLOTS_JUMP {
            return Err(ConfigError::InvalidSlotsJump);
        }
        if !params.beacon_rest_apis.is_empty() {
            network.beacon_rest_apis = params.beacon_rest_apis.clone();
        }
        if network.beacon_rest_apis.is_empty() {
            return Err(ConfigError::MissingBeaconEndpoints);
        }
        if params.light_client.as_deref().is_some_and(|lc| lc.trim().is_empty()) {
            return Err(ConfigError::EmptyLightClient);
        }
        Ok(network)
    }

    /// Initializes the progress cursor when absent and registers the recurring update job,
    /// replacing any earlier schedule with the same name. Nothing is written when validation fails.
    pub async fn schedule(&self, params: &ScheduleParams) -> RelayerResult<ScheduledUpdate> {
        let network_config = self.validate(params)?;
        let key = CursorKey::new(network_config.network.clone(), params.light_client.clone());
        let cursor_key = key.storage_key();
        let job_name = key.job_name();

        let cursor_initialized =
            self.config.storage().put_data_if_absent(encode_slot(params.initial_slot), &cursor_key).await?;
        if !cursor_initialized {
            let current = self.config.storage().get_data(&cursor_key).await?.unwrap_or_else(Bytes::new);
            info!(
                cursor_key = %cursor_key,
                current = %String::from_utf8_lossy(&current),
                "Progress cursor already exists, keeping it"
            );
        }

        let options = JobOptions::update_job(params.slots_jump);
        let every_ms = options.repeat.as_ref().map(|repeat| repeat.every).unwrap_or_default();
        let payload = JobPayload::UpdateJob(UpdateJob {
            last_downloaded_update_key: cursor_key.clone(),
            beacon_rest_apis: network_config.beacon_rest_apis.clone(),
            slots_jump: params.slots_jump,
            network_config,
        });
        self.config.job_queue().enqueue(QueueType::UpdatePolling, &job_name, payload, options).await?;

        info!(
            job_name = %job_name,
            cursor_key = %cursor_key,
            initial_slot = params.initial_slot,
            every_ms,
            "Scheduled update job"
        );
        Ok(ScheduledUpdate { job_name, cursor_key, cursor_initialized, every_ms })
    }
}
