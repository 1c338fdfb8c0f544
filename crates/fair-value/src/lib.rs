//! Fair value engine
//!
//! Computes a reference price for every configured symbol on a fixed
//! cadence and publishes it to a key-value store with publish/subscribe.
//!
//! # Overview
//!
//! - [`Symbol`] owns a symbol's live configuration and its bounded history
//!   of fair values, and computes one fair value per call.
//! - [`Group`] runs one loop over its symbols: compute, publish the
//!   [`FairValueRecord`], sleep out the interval.
//! - [`NotificationDispatcher`] forwards configuration change notices from
//!   every group's subscription to that group's loop.
//! - [`Supervisor`] wires groups, store connections and the dispatcher
//!   together from an [`config::EngineConfig`].
//!
//! Stores implement [`PriceStore`]: [`RedisStore`] in production,
//! [`InMemoryStore`] for tests and dry runs.

pub mod dispatcher;
pub mod error;
pub mod group;
pub mod keys;
pub mod live_config;
pub mod record;
pub mod store;
pub mod supervisor;
pub mod symbol;

pub use dispatcher::{ConfigChanged, NotificationDispatcher};
pub use error::FairValueError;
pub use group::{fetch_live_config, Group, GroupSettings};
pub use live_config::{CalculateMethod, FairValueConfig, SkewConfig, SkewType};
pub use record::FairValueRecord;
pub use store::{InMemoryStore, PriceStore, RedisStore, StoreError};
pub use supervisor::{shutdown_signal, Supervisor};
pub use symbol::{MovingStatistics, Symbol, SymbolSettings};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, FairValueError>;
