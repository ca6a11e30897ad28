use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use relayer_ethereum_settlement_client::EthereumSettlementValidatedArgs;
use relayer_http_prover_service::HttpServiceValidatedArgs;
use relayer_settlement_client_interface::SpeedTier;
use relayer_utils::collections::has_dup;
use url::Url;

use crate::cli::store::StoreCliArgs;
use crate::cli::{PollerCmd, ProverCmd, PublisherCmd, ScheduleCmd};
use crate::error::ConfigError;

/// StoreParams - Connection settings shared by the store, the queue and the notification channel
#[derive(Debug, Clone)]
pub struct StoreParams {
    pub redis_url: String,
    /// Prefix of every queue key
    pub queue_prefix: String,
}

/// ScheduleParams - One scheduling request, validated by the scheduler before any write
#[derive(Debug, Clone)]
pub struct ScheduleParams {
    pub network: String,
    pub light_client: Option<String>,
    pub initial_slot: u64,
    pub slots_jump: u64,
    pub beacon_rest_apis: Vec<Url>,
}

/// ProverWorkerParams - Arguments of the proof generation worker
#[derive(Debug, Clone)]
pub struct ProverWorkerParams {
    pub prover: HttpServiceValidatedArgs,
}

/// PollerParams - Arguments of the update poller and its repeat driver
#[derive(Debug, Clone)]
pub struct PollerParams {
    pub repeat_tick: Duration,
}

/// PublisherParams - Arguments of the update publisher
#[derive(Debug, Clone)]
pub struct PublisherParams {
    pub protocols: Vec<String>,
    pub speed: SpeedTier,
    pub compression: HttpServiceValidatedArgs,
    pub compression_timeout: Duration,
    pub await_finality: bool,
    pub settlement: EthereumSettlementValidatedArgs,
}

/// NOTE: The following implementations convert the command line arguments to the validated
/// parameter structs. Every check runs here, before any client is built.
impl TryFrom<StoreCliArgs> for StoreParams {
    type Error = ConfigError;
    fn try_from(args: StoreCliArgs) -> Result<Self, Self::Error> {
        let host = args
            .redis_host
            .filter(|host| !host.trim().is_empty())
            .ok_or(ConfigError::MissingSetting("RELAYER_REDIS_HOST"))?;
        let port = args.redis_port.ok_or(ConfigError::MissingSetting("RELAYER_REDIS_PORT"))?;
        Ok(Self { redis_url: format!("redis://{host}:{port}"), queue_prefix: args.queue_prefix })
    }
}

impl From<ScheduleCmd> for ScheduleParams {
    fn from(cmd: ScheduleCmd) -> Self {
        Self {
            network: cmd.network,
            light_client: cmd.light_client,
            initial_slot: cmd.initial_slot,
            slots_jump: cmd.slots_jump,
            beacon_rest_apis: cmd.beacon_rest_apis,
        }
    }
}

impl From<ProverCmd> for ProverWorkerParams {
    fn from(cmd: ProverCmd) -> Self {
        Self {
            prover: HttpServiceValidatedArgs {
                service_url: cmd.prover_url,
                request_timeout: Duration::from_secs(cmd.prover_timeout_secs),
            },
        }
    }
}

impl From<PollerCmd> for PollerParams {
    fn from(cmd: PollerCmd) -> Self {
        Self { repeat_tick: Duration::from_millis(cmd.repeat_tick_ms.max(1)) }
    }
}

impl TryFrom<PublisherCmd> for PublisherParams {
    type Error = ConfigError;
    fn try_from(cmd: PublisherCmd) -> Result<Self, Self::Error> {
        let speed = SpeedTier::from_str(&cmd.transaction_speed)
            .map_err(|_| ConfigError::InvalidSpeedTier(cmd.transaction_speed.clone()))?;
        let balance_verifier_address = Address::from_str(&cmd.balance_verifier)
            .map_err(|_| ConfigError::InvalidAddress(cmd.balance_verifier.clone()))?;

        let protocols: Vec<String> =
            cmd.protocols.iter().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect();
        if protocols.is_empty() {
            return Err(ConfigError::MissingSetting("RELAYER_PROTOCOLS"));
        }
        if has_dup(&protocols) {
            return Err(ConfigError::DuplicateProtocol(protocols.join(",")));
        }
        if cmd.compression_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                setting: "compression_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        let compression_timeout = Duration::from_secs(cmd.compression_timeout_secs);

        Ok(Self {
            protocols,
            speed,
            compression: HttpServiceValidatedArgs {
                service_url: cmd.gnark_server_url,
                request_timeout: compression_timeout,
            },
            compression_timeout,
            await_finality: cmd.await_finality,
            settlement: EthereumSettlementValidatedArgs {
                ethereum_rpc_url: cmd.ethereum_rpc_url,
                ethereum_private_key: cmd.private_key,
                balance_verifier_address,
                tx_finality_retry_wait_in_secs: cmd.finality_retry_wait_in_secs,
            },
        })
    }
}
