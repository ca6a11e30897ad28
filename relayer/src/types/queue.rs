use strum_macros::{Display, EnumIter, EnumString};

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString, Hash)]
pub enum QueueType {
    /// Recurring "fetch next update" jobs registered by the scheduler
    #[strum(serialize = "update_polling")]
    UpdatePolling,
    /// Slots discovered by the poller, consumed by the upstream input generator
    #[strum(serialize = "slot_update")]
    SlotUpdate,
    /// Proof inputs consumed by the proof generation worker
    #[strum(serialize = "proof_generation")]
    ProofGeneration,
}
