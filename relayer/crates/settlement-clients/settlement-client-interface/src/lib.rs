use async_trait::async_trait;
use color_eyre::eyre::Result;
use mockall::automock;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Gas aggressiveness used when submitting a verification.
///
/// Each tier maps to a percentile of the priority fees paid in recent blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Slow,
    #[default]
    Avg,
    Fast,
}

impl SpeedTier {
    /// Priority fee percentile requested from `eth_feeHistory` for this tier.
    pub fn reward_percentile(&self) -> f64 {
        match self {
            SpeedTier::Slow => 1.0,
            SpeedTier::Avg => 50.0,
            SpeedTier::Fast => 99.0,
        }
    }
}

/// Arguments of `verify(bytes,uint256,uint256,uint64,uint64,uint64,uint64)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCall {
    pub proof: Vec<u8>,
    pub slot: u64,
    pub balance_sum: u128,
    pub non_activated_validators: u64,
    pub active_validators: u64,
    pub exited_validators: u64,
    pub slashed_validators: u64,
}

/// Trait for every destination chain the relayer publishes to
#[automock]
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Should submit the verification transaction to the verifier contract and return its hash.
    async fn submit_verification(&self, call: VerifyCall, speed: SpeedTier) -> Result<String>;

    /// Should wait that the pending tx_hash is finalized
    async fn wait_for_tx_finality(&self, tx_hash: &str) -> Result<Option<u64>>;
}
