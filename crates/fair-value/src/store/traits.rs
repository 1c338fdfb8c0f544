//! Store traits for the price engine
//!
//! This module defines the capability every store backend must provide:
//! plain GET/SET plus publish/subscribe. Authentication happens when a
//! backend is constructed.

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Errors that can occur in the store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Command {command} failed: {message}")]
    Command { command: &'static str, message: String },

    #[error("Subscription to {channel} failed: {message}")]
    Subscription { channel: String, message: String },
}

impl StoreError {
    pub fn command(command: &'static str, message: impl Into<String>) -> Self {
        Self::Command {
            command,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One message delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMessage {
    pub channel: String,
    /// Message body. May be empty.
    pub payload: String,
}

/// Endless stream of messages for one subscription. It ends only when the
/// underlying connection is gone.
pub type Subscription = BoxStream<'static, StoreMessage>;

/// Key-value store with publish/subscribe.
///
/// Implementations must be cheap to share behind an `Arc`: the loop of a
/// group and every symbol in it issue requests through the same handle.
#[async_trait]
pub trait PriceStore: Send + Sync {
    // ------------------------------------------------------------------------
    // Request / response
    // ------------------------------------------------------------------------

    /// Read a key. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    // ------------------------------------------------------------------------
    // Publish / subscribe
    // ------------------------------------------------------------------------

    /// Announce a message on a channel.
    async fn publish(&self, channel: &str, message: &str) -> StoreResult<()>;

    /// Subscribe to a channel. Messages published after this call returns
    /// are delivered on the stream.
    async fn subscribe(&self, channel: &str) -> StoreResult<Subscription>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}
