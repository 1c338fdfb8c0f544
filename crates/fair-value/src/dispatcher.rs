//! Shared notification dispatcher
//!
//! One task per process drains the configuration change subscription of
//! every group and hands each announced symbol to that group's loop over a
//! bounded channel. Delivery never waits: when a group falls behind, the
//! event is dropped and logged.

use futures::stream::{SelectAll, StreamExt};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{StoreMessage, Subscription};

/// A symbol's live configuration was changed on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChanged {
    pub symbol: String,
}

struct Route {
    group: String,
    sink: mpsc::Sender<ConfigChanged>,
}

impl Route {
    fn deliver(&self, message: StoreMessage) {
        let symbol = message.payload.trim();
        if symbol.is_empty() {
            debug!(group = %self.group, channel = %message.channel, "Ignoring empty notification");
            return;
        }

        let event = ConfigChanged {
            symbol: symbol.to_string(),
        };
        match self.sink.try_send(event) {
            Ok(()) => debug!(group = %self.group, %symbol, "Configuration change forwarded"),
            Err(TrySendError::Full(event)) => {
                warn!(group = %self.group, symbol = %event.symbol, "Group is busy, configuration change dropped")
            }
            Err(TrySendError::Closed(_)) => {
                debug!(group = %self.group, %symbol, "Group stopped, configuration change discarded")
            }
        }
    }
}

type RoutedStream = Pin<Box<dyn Stream<Item = (Arc<Route>, StoreMessage)> + Send>>;

/// Fan-in of every group's configuration subscription.
#[derive(Default)]
pub struct NotificationDispatcher {
    streams: SelectAll<RoutedStream>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route messages of `subscription` to `sink`, labelled with `group`.
    pub fn attach(
        &mut self,
        group: impl Into<String>,
        subscription: Subscription,
        sink: mpsc::Sender<ConfigChanged>,
    ) {
        let route = Arc::new(Route {
            group: group.into(),
            sink,
        });
        let routed = subscription.map(move |message| (route.clone(), message));
        self.streams.push(Box::pin(routed));
    }

    /// Number of attached subscriptions
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Run on a spawned task until `token` is cancelled or every
    /// subscription has ended.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    pub async fn run(mut self, token: CancellationToken) {
        info!(subscriptions = self.streams.len(), "Notification dispatcher started");

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Notification dispatcher stopping");
                    break;
                }
                next = self.streams.next() => next,
            };

            match next {
                Some((route, message)) => route.deliver(message),
                None => {
                    warn!("All configuration subscriptions closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CONFIG_CHANNEL;
    use crate::store::{InMemoryStore, PriceStore};
    use std::time::Duration;

    async fn dispatcher_with_groups(
        store: &InMemoryStore,
        capacity: usize,
    ) -> (NotificationDispatcher, mpsc::Receiver<ConfigChanged>, mpsc::Receiver<ConfigChanged>) {
        let mut dispatcher = NotificationDispatcher::new();
        let (first_tx, first_rx) = mpsc::channel(capacity);
        let (second_tx, second_rx) = mpsc::channel(capacity);
        dispatcher.attach("group_0", store.subscribe(CONFIG_CHANNEL).await.unwrap(), first_tx);
        dispatcher.attach("group_1", store.subscribe(CONFIG_CHANNEL).await.unwrap(), second_tx);
        (dispatcher, first_rx, second_rx)
    }

    #[tokio::test]
    async fn test_forwards_to_every_group() {
        let store = InMemoryStore::new();
        let (dispatcher, mut first, mut second) = dispatcher_with_groups(&store, 8).await;
        assert_eq!(dispatcher.len(), 2);

        let token = CancellationToken::new();
        let handle = dispatcher.spawn(token.clone());

        store.publish(CONFIG_CHANNEL, "btcjpy").await.unwrap();

        let expected = ConfigChanged {
            symbol: "btcjpy".to_string(),
        };
        assert_eq!(first.recv().await, Some(expected.clone()));
        assert_eq!(second.recv().await, Some(expected));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_ignores_empty_payload() {
        let store = InMemoryStore::new();
        let (dispatcher, mut first, _second) = dispatcher_with_groups(&store, 8).await;
        let token = CancellationToken::new();
        let handle = dispatcher.spawn(token.clone());

        store.publish(CONFIG_CHANNEL, "").await.unwrap();
        store.publish(CONFIG_CHANNEL, "  ").await.unwrap();
        store.publish(CONFIG_CHANNEL, "ethjpy").await.unwrap();

        assert_eq!(first.recv().await.unwrap().symbol, "ethjpy");

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_group_drops_events() {
        let store = InMemoryStore::new();
        let (dispatcher, mut first, mut second) = dispatcher_with_groups(&store, 1).await;
        let token = CancellationToken::new();
        let handle = dispatcher.spawn(token.clone());

        for symbol in ["btcjpy", "ethjpy", "xrpjpy"] {
            store.publish(CONFIG_CHANNEL, symbol).await.unwrap();
        }

        // The second group keeps receiving even though both are full.
        assert_eq!(second.recv().await.unwrap().symbol, "btcjpy");
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(first.recv().await.unwrap().symbol, "btcjpy");
        assert!(first.try_recv().is_err());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_subscriptions_end() {
        let dispatcher = NotificationDispatcher::new();
        assert!(dispatcher.is_empty());

        let handle = dispatcher.spawn(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
