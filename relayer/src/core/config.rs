use std::sync::Arc;

use crate::core::client::notification::NotificationClient;
use crate::core::client::queue::QueueClient;
use crate::core::client::storage::StorageClient;
use crate::core::client::{RedisNotifications, RedisQueue, RedisStorage};
use crate::core::job_queue::JobQueue;
use crate::types::params::StoreParams;
use crate::RelayerResult;

/// The app config. It contains the clients every component shares: the store, the queue
/// and the notification channel.
pub struct Config {
    storage: Arc<dyn StorageClient>,
    queue: Arc<dyn QueueClient>,
    notifications: Arc<dyn NotificationClient>,
    job_queue: Arc<JobQueue>,
}

impl Config {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        queue: Arc<dyn QueueClient>,
        notifications: Arc<dyn NotificationClient>,
    ) -> Self {
        let job_queue = Arc::new(JobQueue::new(queue.clone(), storage.clone()));
        Self { storage, queue, notifications, job_queue }
    }

    /// Connects every client to the Redis instance described by `params`.
    pub async fn from_store_params(params: &StoreParams) -> RelayerResult<Self> {
        let storage = RedisStorage::new(&params.redis_url).await?;
        let queue = RedisQueue::new(params).await?;
        let notifications = RedisNotifications::new(&params.redis_url).await?;
        tracing::info!(redis = %params.redis_url, queue_prefix = %params.queue_prefix, "Connected to Redis");
        Ok(Self::new(Arc::new(storage), Arc::new(queue), Arc::new(notifications)))
    }

    /// Fails when the store or the queue backend cannot be reached.
    pub async fn health_check(&self) -> RelayerResult<()> {
        self.storage.health_check().await?;
        self.queue.health_check().await?;
        Ok(())
    }

    pub fn storage(&self) -> &Arc<dyn StorageClient> {
        &self.storage
    }

    pub fn queue(&self) -> &Arc<dyn QueueClient> {
        &self.queue
    }

    pub fn notifications(&self) -> &Arc<dyn NotificationClient> {
        &self.notifications
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.job_queue
    }
}
