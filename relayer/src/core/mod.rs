pub mod client;
pub mod config;
pub mod job_queue;
