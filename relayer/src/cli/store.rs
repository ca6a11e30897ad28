use clap::Args;

/// Parameters used to reach the Redis instance backing the store, the queues and the
/// notification channels.
#[derive(Debug, Clone, Args)]
pub struct StoreCliArgs {
    /// Redis host.
    #[arg(env = "RELAYER_REDIS_HOST", long)]
    pub redis_host: Option<String>,

    /// Redis port.
    #[arg(env = "RELAYER_REDIS_PORT", long)]
    pub redis_port: Option<u16>,

    /// Prefix of the queue keys.
    #[arg(env = "RELAYER_QUEUE_PREFIX", long, default_value = "relayer")]
    pub queue_prefix: String,
}
