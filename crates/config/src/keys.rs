//! Key names understood in the configuration file.

// Store connection.
pub const REDIS_HOST: &str = "redis_server.host";
pub const REDIS_PORT: &str = "redis_server.port";
pub const REDIS_PASSWORD: &str = "redis_server.password";
pub const REDIS_DB_INDEX: &str = "redis_server.db_index";
pub const REDIS_CONNECT_ATTEMPTS: &str = "redis_server.connect_attempts";
pub const REDIS_RETRY_BACKOFF_MS: &str = "redis_server.retry_backoff_ms";

// Groups. Per-group keys are `group_<i>` + suffix.
pub const GROUP_NUMBER: &str = "group.group_number";
pub const GROUP_PREFIX: &str = "group_";
pub const BASE_SYMBOL_SUFFIX: &str = ".base_symbol";
pub const PRICE_SOURCES_SUFFIX: &str = ".price_sources";
pub const SYMBOLS_SUFFIX: &str = ".symbols";

// Common settings.
pub const DIFF_TIME_MAX: &str = "common.diff_time_max";
/// Milliseconds.
pub const LOOP_INTERVAL: &str = "common.loop_interval";

// Process settings.
pub const STORE_TYPE: &str = "store.type";
pub const METRICS_PORT: &str = "metrics.port";

/// Builds the key of a per-group setting, e.g. `group_0.symbols`.
pub fn group_key(index: usize, suffix: &str) -> String {
    format!("{}{}{}", GROUP_PREFIX, index, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key() {
        assert_eq!(group_key(0, SYMBOLS_SUFFIX), "group_0.symbols");
        assert_eq!(group_key(12, BASE_SYMBOL_SUFFIX), "group_12.base_symbol");
    }
}
