use thiserror::Error;

/// Configuration problems detected at startup, before any network call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    MissingSetting(&'static str),

    #[error("Unsupported network `{0}`")]
    UnsupportedNetwork(String),

    #[error("Invalid transaction speed `{0}`, expected one of slow, avg, fast")]
    InvalidSpeedTier(String),

    #[error("slots jump must be between 1 and {}", relayer_utils::time::MAX_SLOTS_JUMP)]
    InvalidSlotsJump,

    #[error("At least one beacon REST endpoint is required")]
    MissingBeaconEndpoints,

    #[error("Light client instance id must not be empty")]
    EmptyLightClient,

    #[error("Invalid contract address `{0}`")]
    InvalidAddress(String),

    #[error("Protocol `{0}` is subscribed more than once")]
    DuplicateProtocol(String),

    #[error("Invalid value for {setting}: {message}")]
    InvalidValue { setting: &'static str, message: String },
}
