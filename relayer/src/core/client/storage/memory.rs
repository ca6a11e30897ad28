use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{StorageClient, StorageError};

/// Process-local store used by tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<String, Bytes>>,
}

impl InMemoryStorage {
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn get_data(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put_data(&self, data: Bytes, key: &str) -> Result<(), StorageError> {
        self.entries.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn put_data_if_absent(&self, data: Bytes, key: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), data);
        Ok(true)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
