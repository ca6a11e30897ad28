use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{NotificationClient, NotificationError};
use crate::types::artifacts::ProofReady;

/// Redis pub/sub channels, one per protocol.
#[derive(Clone)]
pub struct RedisNotifications {
    client: redis::Client,
    connection: ConnectionManager,
}

impl RedisNotifications {
    pub async fn new(redis_url: &str) -> Result<Self, NotificationError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self { client, connection })
    }
}

#[async_trait]
impl NotificationClient for RedisNotifications {
    async fn publish(&self, protocol: &str, notification: &ProofReady) -> Result<usize, NotificationError> {
        let payload = serde_json::to_string(notification)?;
        let mut connection = self.connection.clone();
        let receivers: i64 = connection.publish(protocol, payload).await?;
        Ok(receivers.max(0) as usize)
    }

    async fn subscribe(&self, protocol: &str) -> Result<BoxStream<'static, ProofReady>, NotificationError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(protocol).await?;
        let channel = protocol.to_string();
        let stream = pubsub.into_on_message().filter_map(move |message| {
            let channel = channel.clone();
            async move {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Dropping unreadable notification");
                        return None;
                    }
                };
                match serde_json::from_str::<ProofReady>(&payload) {
                    Ok(notification) => Some(notification),
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Dropping malformed notification");
                        None
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}
