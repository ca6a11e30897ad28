use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const SLOTS_PER_EPOCH: u64 = 32;
pub const SECONDS_PER_SLOT: u64 = 12;
/// REST endpoint of a beacon node running next to the relayer.
pub const DEFAULT_BEACON_REST_API: &str = "http://localhost:5052";

/// Chain parameters carried by every update job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub network: String,
    /// Endpoints used when a schedule names none
    #[serde(default)]
    pub beacon_rest_apis: Vec<Url>,
    pub slots_per_epoch: u64,
    pub seconds_per_slot: u64,
}

impl NetworkConfig {
    pub fn beacon(network: &str, beacon_rest_apis: Vec<Url>) -> Self {
        Self {
            network: network.to_string(),
            beacon_rest_apis,
            slots_per_epoch: SLOTS_PER_EPOCH,
            seconds_per_slot: SECONDS_PER_SLOT,
        }
    }
}

/// Registry of supported beacon networks
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: HashMap<String, NetworkConfig>,
    aliases: HashMap<String, String>,
}

lazy_static! {
    static ref BUILTIN: NetworkRegistry = NetworkRegistry::builtin();
}

impl NetworkRegistry {
    pub fn new(networks: impl IntoIterator<Item = NetworkConfig>) -> Self {
        let networks = networks.into_iter().map(|config| (config.network.clone(), config)).collect();
        let aliases = HashMap::from([("prater".to_string(), "pratter".to_string())]);
        Self { networks, aliases }
    }

    /// Create a new registry with built-in networks, all pointing at the local beacon node
    pub fn builtin() -> Self {
        let defaults: Vec<Url> = Url::parse(DEFAULT_BEACON_REST_API).into_iter().collect();
        Self::new(
            ["mainnet", "pratter", "sepolia", "holesky"]
                .into_iter()
                .map(|name| NetworkConfig::beacon(name, defaults.clone())),
        )
    }

    /// Shared instance of the built-in registry
    pub fn global() -> &'static NetworkRegistry {
        &BUILTIN
    }

    /// Looks a network up by name or alias, case-insensitively.
    pub fn resolve(&self, name: &str) -> Result<&NetworkConfig, ConfigError> {
        let lowered = name.trim().to_lowercase();
        let canonical = self.aliases.get(&lowered).unwrap_or(&lowered);
        self.networks.get(canonical).ok_or_else(|| ConfigError::UnsupportedNetwork(name.to_string()))
    }
}
