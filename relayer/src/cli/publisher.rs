use clap::Args;
use url::Url;

use super::store::StoreCliArgs;

#[derive(Debug, Clone, Args)]
pub struct PublisherCmd {
    #[clap(flatten)]
    pub store_args: StoreCliArgs,

    /// Address of the balance verifier contract.
    #[arg(env = "RELAYER_BALANCE_VERIFIER", long)]
    pub balance_verifier: String,

    /// Private key signing the verification. The RPC node's first account signs when absent.
    #[arg(env = "RELAYER_PRIVATE_KEY", long)]
    pub private_key: Option<String>,

    /// Base URL of the proof compression service.
    #[arg(env = "RELAYER_GNARK_SERVER_URL", long, default_value = "http://localhost:3333")]
    pub gnark_server_url: Url,

    /// Protocols to publish updates for.
    #[arg(env = "RELAYER_PROTOCOLS", long = "protocol", value_delimiter = ',', required = true)]
    pub protocols: Vec<String>,

    /// Gas policy: slow, avg or fast.
    #[arg(env = "RELAYER_TRANSACTION_SPEED", long, default_value = "avg")]
    pub transaction_speed: String,

    /// The URL of the Ethereum RPC node.
    #[arg(env = "RELAYER_ETHEREUM_RPC_URL", long)]
    pub ethereum_rpc_url: Url,

    /// Maximum time the compression service may take, in seconds.
    #[arg(env = "RELAYER_COMPRESSION_TIMEOUT_SECS", long, default_value_t = 600)]
    pub compression_timeout_secs: u64,

    /// Wait for each verification transaction to be final before handling the next proof.
    #[arg(env = "RELAYER_AWAIT_FINALITY", long)]
    pub await_finality: bool,

    /// The amount of time in seconds between two finality checks.
    #[arg(env = "RELAYER_FINALITY_RETRY_WAIT_IN_SECS", long, default_value_t = 10)]
    pub finality_retry_wait_in_secs: u64,
}
