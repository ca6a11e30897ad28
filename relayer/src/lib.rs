/// Contains the CLI arguments for the relayer
pub mod cli;
/// Contains the static network allow-list
pub mod config;
/// Contains the core clients, the job queue and the shared configuration
pub mod core;
/// Contains the error types
pub mod error;
/// Contains the update publisher
pub mod publisher;
/// Contains the update scheduler
pub mod scheduler;
/// Contains the types shared across the pipeline
pub mod types;
/// Contains the logging and signal helpers
pub mod utils;
/// Contains the queue workers
pub mod worker;

#[cfg(test)]
mod tests;

pub use error::{RelayerError, RelayerResult};
