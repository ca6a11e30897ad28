use clap::{Parser, Subcommand};

pub mod poller;
pub mod prover;
pub mod publisher;
pub mod schedule;
pub mod store;

pub use poller::PollerCmd;
pub use prover::ProverCmd;
pub use publisher::PublisherCmd;
pub use schedule::ScheduleCmd;

#[derive(Parser, Debug)]
#[command(
    name = "relayer",
    about = "Beacon light-client update relayer",
    long_about = "Relays beacon chain light-client updates to destination verifier contracts.\n\n\
    The pipeline runs as separate processes sharing one Redis instance:\n  \
    relayer schedule-update  - register the recurring update job of a network\n  \
    relayer run-poller       - discover finalized slots and advance the progress cursor\n  \
    relayer run-prover       - drive the proving service for queued proof inputs\n  \
    relayer run-publisher    - submit finished proofs to the verifier contract"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the recurring "fetch next update" job of a network
    ScheduleUpdate {
        #[command(flatten)]
        schedule_command: Box<ScheduleCmd>,
    },
    /// Run the update poller and the repeat driver
    RunPoller {
        #[command(flatten)]
        poller_command: Box<PollerCmd>,
    },
    /// Run the proof generation worker
    RunProver {
        #[command(flatten)]
        prover_command: Box<ProverCmd>,
    },
    /// Run the update publisher of one or more protocols
    RunPublisher {
        #[command(flatten)]
        publisher_command: Box<PublisherCmd>,
    },
}
