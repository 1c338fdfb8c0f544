//! Store gateway for the price engine
//!
//! This module provides the store trait and implementations.

mod memory;
mod redis;
mod traits;

pub use self::redis::RedisStore;
pub use memory::InMemoryStore;
pub use traits::*;

use config::{RedisConfig, StoreKind};
use std::sync::Arc;
use tracing::info;

/// Create a store based on configuration
pub async fn create_store(
    kind: StoreKind,
    redis_config: &RedisConfig,
) -> StoreResult<Arc<dyn PriceStore>> {
    match kind {
        StoreKind::Memory => {
            info!("Creating in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreKind::Redis => {
            info!("Creating Redis store");
            let store = RedisStore::connect(redis_config).await?;
            Ok(Arc::new(store))
        }
    }
}
