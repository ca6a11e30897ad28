use clap::Args;

use super::store::StoreCliArgs;

#[derive(Debug, Clone, Args)]
pub struct PollerCmd {
    #[clap(flatten)]
    pub store_args: StoreCliArgs,

    /// How often the repeat driver looks for due update jobs, in milliseconds.
    #[arg(env = "RELAYER_REPEAT_TICK_MS", long, default_value_t = 1000)]
    pub repeat_tick_ms: u64,
}
