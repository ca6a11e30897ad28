use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{StorageClient, StorageError};

/// Redis backed store. The connection manager reconnects on its own and is cheap to clone.
#[derive(Clone)]
pub struct RedisStorage {
    connection: ConnectionManager,
}

impl RedisStorage {
    pub async fn new(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl StorageClient for RedisStorage {
    async fn get_data(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn put_data(&self, data: Bytes, key: &str) -> Result<(), StorageError> {
        let mut connection = self.connection.clone();
        connection.set::<_, _, ()>(key, data.to_vec()).await?;
        tracing::debug!(key = %key, size = data.len(), "Stored value");
        Ok(())
    }

    async fn put_data_if_absent(&self, data: Bytes, key: &str) -> Result<bool, StorageError> {
        let mut connection = self.connection.clone();
        let written: bool = connection.set_nx(key, data.to_vec()).await?;
        Ok(written)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let mut connection = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        if pong != "PONG" {
            return Err(StorageError::UnhealthyStore(pong));
        }
        Ok(())
    }
}
