//! In-memory store implementation

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::store::traits::{PriceStore, StoreMessage, StoreResult, Subscription};

/// Messages buffered per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 1024;

/// In-memory store
///
/// Keys live in a map and every channel is a broadcast fan-out. Nothing
/// survives the process. Several groups may share one instance.
pub struct InMemoryStore {
    data: RwLock<HashMap<String, String>>,
    channels: RwLock<HashMap<String, broadcast::Sender<StoreMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<StoreMessage> {
        if let Some(sender) = self.channels.read().get(channel) {
            return sender.clone();
        }

        self.channels
            .write()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> StoreResult<()> {
        let delivered = self
            .sender(channel)
            .send(StoreMessage {
                channel: channel.to_string(),
                payload: message.to_string(),
            })
            .unwrap_or(0);
        debug!(%channel, delivered, "Published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<Subscription> {
        let receiver = self.sender(channel).subscribe();

        let stream = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => return Some((message, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
