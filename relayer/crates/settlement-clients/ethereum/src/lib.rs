use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use relayer_settlement_client_interface::{SettlementClient, SpeedTier, VerifyCall};
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::clients::BalanceVerifier;
use crate::conversion::{apply_gas_margin, fees_from_history};

pub mod clients;
pub mod conversion;
pub mod error;

// Ethereum Transaction Finality
const MAX_TX_FINALISATION_ATTEMPTS: usize = 30;
const REQUIRED_BLOCK_CONFIRMATIONS: u64 = 3;

// Gas estimation
const FEE_HISTORY_BLOCKS: u64 = 20;
const GAS_LIMIT_MARGIN: f64 = 1.2;

#[derive(Clone, Debug)]
pub struct EthereumSettlementValidatedArgs {
    pub ethereum_rpc_url: Url,

    /// When absent the first account exposed by the RPC node signs the transaction.
    pub ethereum_private_key: Option<String>,

    pub balance_verifier_address: Address,

    pub tx_finality_retry_wait_in_secs: u64,
}

pub struct EthereumSettlementClient {
    provider: DynProvider,
    verifier: BalanceVerifier::BalanceVerifierInstance<DynProvider>,
    wallet_address: Option<Address>,
    tx_finality_retry_wait_in_seconds: u64,
}

impl EthereumSettlementClient {
    pub fn new_with_args(settlement_cfg: &EthereumSettlementValidatedArgs) -> Result<Self> {
        let (provider, wallet_address) = match &settlement_cfg.ethereum_private_key {
            Some(private_key) => {
                let signer: PrivateKeySigner =
                    private_key.parse().wrap_err("Failed to parse the Ethereum private key")?;
                let wallet_address = signer.address();
                let wallet = EthereumWallet::from(signer);
                let provider =
                    ProviderBuilder::new().wallet(wallet).connect_http(settlement_cfg.ethereum_rpc_url.clone()).erased();
                (provider, Some(wallet_address))
            }
            None => (ProviderBuilder::new().connect_http(settlement_cfg.ethereum_rpc_url.clone()).erased(), None),
        };

        let verifier = BalanceVerifier::new(settlement_cfg.balance_verifier_address, provider.clone());

        Ok(EthereumSettlementClient {
            provider,
            verifier,
            wallet_address,
            tx_finality_retry_wait_in_seconds: settlement_cfg.tx_finality_retry_wait_in_secs,
        })
    }

    /// Address the verification is sent from.
    async fn sender(&self) -> Result<Address> {
        if let Some(address) = self.wallet_address {
            return Ok(address);
        }
        let accounts = self.provider.get_accounts().await?;
        accounts.first().copied().ok_or_else(|| eyre!("No private key configured and the RPC node exposes no account"))
    }
}

#[async_trait]
impl SettlementClient for EthereumSettlementClient {
    async fn submit_verification(&self, call: VerifyCall, speed: SpeedTier) -> Result<String> {
        info!(
            log_type = "starting",
            category = "verify",
            speed = %speed,
            slot = call.slot,
            "Submitting balance verification."
        );
        let from = self.sender().await?;

        let history = self
            .provider
            .get_fee_history(FEE_HISTORY_BLOCKS, BlockNumberOrTag::Latest, &[speed.reward_percentile()])
            .await?;
        let fees = fees_from_history(&history.base_fee_per_gas, history.reward.as_deref())?;

        let args = BalanceVerifier::verifyCall::from(call);
        let builder = self.verifier.verify(
            args.proof,
            args.slot,
            args.balanceSum,
            args.numberOfNonActivatedValidators,
            args.numberOfActiveValidators,
            args.numberOfExitedValidators,
            args.numberOfSlashedValidators,
        );
        let gas = builder.clone().from(from).estimate_gas().await?;

        let pending = builder
            .from(from)
            .gas(apply_gas_margin(gas, GAS_LIMIT_MARGIN))
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas)
            .send()
            .await?;
        let tx_hash = format!("0x{:x}", pending.tx_hash());

        info!(
            log_type = "completed",
            category = "verify",
            speed = %speed,
            tx_hash = %tx_hash,
            max_fee_per_gas = %fees.max_fee_per_gas,
            max_priority_fee_per_gas = %fees.max_priority_fee_per_gas,
            "Balance verification submitted."
        );
        Ok(tx_hash)
    }

    /// Wait for a pending tx to achieve finality
    async fn wait_for_tx_finality(&self, tx_hash: &str) -> Result<Option<u64>> {
        let hash: B256 = tx_hash.parse().wrap_err_with(|| format!("Invalid transaction hash {tx_hash}"))?;
        for _ in 0..MAX_TX_FINALISATION_ATTEMPTS {
            if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                if !receipt.status() {
                    warn!(tx_hash = %tx_hash, "Verification transaction reverted");
                    return Ok(None);
                }
                if let Some(block_number) = receipt.block_number {
                    let latest_block = self.provider.get_block_number().await?;
                    let confirmations = latest_block.saturating_sub(block_number);
                    if confirmations >= REQUIRED_BLOCK_CONFIRMATIONS {
                        return Ok(Some(block_number));
                    }
                }
            }
            sleep(Duration::from_secs(self.tx_finality_retry_wait_in_seconds)).await;
        }
        Ok(None)
    }
}
