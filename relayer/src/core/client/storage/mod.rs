pub mod error;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use bytes::Bytes;
pub use error::StorageError;

/// Trait defining key/value store operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Value stored under `key`, `None` when the key was never written
    async fn get_data(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    /// Last writer wins
    async fn put_data(&self, data: Bytes, key: &str) -> Result<(), StorageError>;

    /// Writes only when `key` is absent. Returns true when the value was written.
    async fn put_data_if_absent(&self, data: Bytes, key: &str) -> Result<bool, StorageError>;

    /// Perform a health check on the store
    async fn health_check(&self) -> Result<(), StorageError>;
}
