// Client abstractions module - contains all client interface traits

pub mod beacon;
pub mod notification;
pub mod queue;
pub mod storage;

// Re-export commonly used types
pub use beacon::{BeaconClient, BeaconRestClient};
pub use notification::{memory::InMemoryNotifications, redis::RedisNotifications, NotificationClient};
pub use queue::{memory::InMemoryQueue, redis::RedisQueue, QueueClient};
pub use storage::{memory::InMemoryStorage, redis::RedisStorage, StorageClient};
