use clap::Args;
use url::Url;

use super::store::StoreCliArgs;

#[derive(Debug, Clone, Args)]
pub struct ProverCmd {
    #[clap(flatten)]
    pub store_args: StoreCliArgs,

    /// Base URL of the proving service.
    #[arg(env = "RELAYER_PROVER_URL", long, default_value = "http://localhost:5000")]
    pub prover_url: Url,

    /// Maximum time one proving request may take, in seconds.
    #[arg(env = "RELAYER_PROVER_TIMEOUT_SECS", long, default_value_t = 1800)]
    pub prover_timeout_secs: u64,
}
