pub mod networks;

pub use networks::{NetworkConfig, NetworkRegistry};
