//! Redis store implementation
//!
//! Requests go through one multiplexed connection per store. Every
//! subscription opens its own pub/sub connection, authenticated with the
//! same credentials.

use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, IntoConnectionInfo};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::traits::{PriceStore, StoreError, StoreMessage, StoreResult, Subscription};
use config::RedisConfig;

/// Redis-backed store
pub struct RedisStore {
    /// Client used to open pub/sub connections
    client: redis::Client,
    /// Request/response connection (wrapped in Mutex for mutable access)
    redis: Mutex<redis::aio::ConnectionManager>,
    /// `host:port` for logs
    address: String,
}

impl RedisStore {
    /// Connect and authenticate.
    ///
    /// Fails with [`StoreError::Authentication`] when the password is
    /// rejected and [`StoreError::Connection`] for anything else.
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        let address = format!("{}:{}", config.host, config.port);
        info!(host = %config.host, port = config.port, db = config.db_index, "Connecting to Redis");

        let mut info = format!("redis://{}/{}", address, config.db_index)
            .into_connection_info()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        if !config.password.is_empty() {
            info.redis.password = Some(config.password.clone());
        }

        let client = redis::Client::open(info).map_err(|e| StoreError::Connection(e.to_string()))?;

        let mut connection = client
            .get_connection_manager()
            .await
            .map_err(classify_error)?;

        // AUTH runs as part of the handshake; PING confirms the session is usable.
        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(classify_error)?;
        debug!(%pong, "Redis handshake complete");

        info!(%address, "Authenticated to Redis");

        Ok(Self {
            client,
            redis: Mutex::new(connection),
            address,
        })
    }
}

fn classify_error(e: redis::RedisError) -> StoreError {
    match e.kind() {
        redis::ErrorKind::AuthenticationFailed => StoreError::Authentication(e.to_string()),
        _ => StoreError::Connection(e.to_string()),
    }
}

#[async_trait]
impl PriceStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut redis = self.redis.lock().await;
        redis
            .get::<_, Option<String>>(key)
            .await
            .map_err(|e| StoreError::command("GET", e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut redis = self.redis.lock().await;
        redis
            .set::<_, _, ()>(key, value)
            .await
            .map_err(|e| StoreError::command("SET", e.to_string()))
    }

    async fn publish(&self, channel: &str, message: &str) -> StoreResult<()> {
        let mut redis = self.redis.lock().await;
        redis
            .publish::<_, _, ()>(channel, message)
            .await
            .map_err(|e| StoreError::command("PUBLISH", e.to_string()))
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<Subscription> {
        let subscription_error = |e: redis::RedisError| StoreError::Subscription {
            channel: channel.to_string(),
            message: e.to_string(),
        };

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(subscription_error)?;
        info!(address = %self.address, "Async connection authenticated");

        pubsub.subscribe(channel).await.map_err(subscription_error)?;
        info!(%channel, "Subscribed");

        let stream = pubsub.into_on_message().map(|msg| {
            let payload = match msg.get_payload::<String>() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(channel = msg.get_channel_name(), error = %e, "Unreadable message payload");
                    String::new()
                }
            };
            StoreMessage {
                channel: msg.get_channel_name().to_string(),
                payload,
            }
        });

        Ok(stream.boxed())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
