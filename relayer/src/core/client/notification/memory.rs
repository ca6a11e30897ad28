use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;

use super::{NotificationClient, NotificationError};
use crate::types::artifacts::ProofReady;

const CHANNEL_CAPACITY: usize = 64;

/// Broadcast channels kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryNotifications {
    channels: Mutex<HashMap<String, broadcast::Sender<ProofReady>>>,
}

#[async_trait]
impl NotificationClient for InMemoryNotifications {
    async fn publish(&self, protocol: &str, notification: &ProofReady) -> Result<usize, NotificationError> {
        let channels = self.channels.lock().await;
        let Some(sender) = channels.get(protocol) else {
            return Ok(0);
        };
        Ok(sender.send(notification.clone()).unwrap_or(0))
    }

    async fn subscribe(&self, protocol: &str) -> Result<BoxStream<'static, ProofReady>, NotificationError> {
        let mut channels = self.channels.lock().await;
        let receiver = channels
            .entry(protocol.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|item| async move {
            match item {
                Ok(notification) => Some(notification),
                Err(e) => {
                    tracing::warn!(error = %e, "Subscriber lagged behind, notifications dropped");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}
