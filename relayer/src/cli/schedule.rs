use clap::Args;
use url::Url;

use super::store::StoreCliArgs;

#[derive(Debug, Clone, Args)]
pub struct ScheduleCmd {
    #[clap(flatten)]
    pub store_args: StoreCliArgs,

    /// Beacon network: mainnet, pratter (or prater), sepolia or holesky.
    #[arg(env = "RELAYER_NETWORK", long)]
    pub network: String,

    /// Light client instance the schedule is dedicated to.
    #[arg(env = "RELAYER_LIGHT_CLIENT_ID", long)]
    pub light_client: Option<String>,

    /// Slot the progress cursor starts from when it does not exist yet.
    #[arg(env = "RELAYER_INITIAL_SLOT", long)]
    pub initial_slot: u64,

    /// Number of slots between two updates.
    #[arg(env = "RELAYER_SLOTS_JUMP", long)]
    pub slots_jump: u64,

    /// Beacon REST endpoints, tried in order. Defaults to the network's endpoints.
    #[arg(env = "RELAYER_BEACON_REST_APIS", long = "beacon-rest-api", value_delimiter = ',')]
    pub beacon_rest_apis: Vec<Url>,
}
