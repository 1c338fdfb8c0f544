//! Configuration for the price engine
//!
//! The engine reads a line-oriented `key = value` file (see [`parser`]).
//! Everything the running process needs is collected into one
//! [`EngineConfig`] value that is built once at startup and handed down
//! explicitly to the supervisor, groups and symbols.

use std::time::Duration;
use thiserror::Error;

pub mod defaults;
pub mod keys;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Errors raised while turning file entries into typed settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Key '{key}' must be an integer, got: '{value}'")]
    InvalidInteger { key: String, value: String },

    #[error("Unknown store type '{0}'. Must be one of: redis, memory")]
    UnknownStoreType(String),
}

/// Connection settings for the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db_index: u8,
    /// How many times the supervisor tries to connect before giving up.
    pub connect_attempts: u32,
    /// Pause between two connection attempts.
    pub retry_backoff_ms: u64,
}

impl RedisConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: default_redis_port(),
            password: String::new(),
            db_index: 0,
            connect_attempts: default_connect_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// One group of symbols sharing a store connection and a loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupConfig {
    /// Position of the group in the file (`group_<index>.*`).
    pub index: usize,
    pub base_symbol: String,
    /// Exchanges feeding order books. Only meaningful for the
    /// from-other-sources calculation method.
    pub price_sources: Vec<String>,
    pub symbols: Vec<String>,
}

impl GroupConfig {
    /// Name used in logs and metric labels.
    pub fn name(&self) -> String {
        format!("group_{}", self.index)
    }
}

/// Settings shared by every group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonConfig {
    /// Maximum age in seconds of a published fair value before it is
    /// considered stale by base-currency lookups.
    pub diff_time_max_secs: u64,
    /// Interval of the compute/publish loop in milliseconds.
    pub loop_interval_ms: u64,
}

impl CommonConfig {
    pub fn max_staleness(&self) -> Duration {
        Duration::from_secs(self.diff_time_max_secs)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            diff_time_max_secs: default_diff_time_max_secs(),
            loop_interval_ms: default_loop_interval_ms(),
        }
    }
}

/// Which store implementation backs the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Redis,
    /// Process-local store, useful for dry runs.
    Memory,
}

impl StoreKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "memory" | "inmemory" | "in_memory" => Some(Self::Memory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

/// Complete configuration of one price engine process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub redis: RedisConfig,
    pub groups: Vec<GroupConfig>,
    pub common: CommonConfig,
    pub store: StoreKind,
    /// Port of the Prometheus exporter, disabled when `None`.
    pub metrics_port: Option<u16>,
}

impl EngineConfig {
    /// All symbol names across every group, in file order.
    pub fn all_symbols(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.symbols.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_config() {
        let content = include_str!("../../../price_engine_config/pe.conf");
        let config = parse_config(content).unwrap();

        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.groups[0].symbols, vec!["btcjpy", "ethjpy"]);
        assert_eq!(config.groups[1].base_symbol, "jpy");
        assert_eq!(config.common.loop_interval_ms, 1000);
        assert_eq!(config.store, StoreKind::Redis);
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!(StoreKind::parse("redis"), Some(StoreKind::Redis));
        assert_eq!(StoreKind::parse(" Memory "), Some(StoreKind::Memory));
        assert_eq!(StoreKind::parse("postgres"), None);
    }

    #[test]
    fn test_all_symbols_in_file_order() {
        let config = EngineConfig {
            groups: vec![
                GroupConfig {
                    index: 0,
                    symbols: vec!["btcjpy".to_string()],
                    ..Default::default()
                },
                GroupConfig {
                    index: 1,
                    symbols: vec!["ethbtc".to_string(), "xrpjpy".to_string()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let symbols: Vec<&str> = config.all_symbols().collect();
        assert_eq!(symbols, vec!["btcjpy", "ethbtc", "xrpjpy"]);
        assert_eq!(config.groups[1].name(), "group_1");
    }
}
