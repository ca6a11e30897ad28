
pub mod publisher;
pub mod queue;
pub mod scheduler;
