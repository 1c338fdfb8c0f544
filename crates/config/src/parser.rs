use crate::keys::*;
use crate::*;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Raw `key = value` entries of a configuration file.
///
/// `#` starts a comment anywhere on a line, blank lines are ignored and
/// the first `=` separates key from value. Lines without `=` are skipped.
/// A repeated key keeps the last value.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    entries: HashMap<String, String>,
}

impl ConfigFile {
    pub fn parse(content: &str) -> Self {
        let mut entries = HashMap::new();

        for line in content.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { entries }
    }

    /// Raw value of a key. Empty values count as missing.
    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get_value(key).unwrap_or_default().to_string()
    }

    /// Parse a numeric key. `Ok(None)` when the key is absent.
    pub fn get_number<T: FromStr>(&self, key: &str) -> std::result::Result<Option<T>, ConfigError> {
        match self.get_value(key) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidInteger {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    /// Numeric key with a fallback when absent.
    pub fn get_number_or<T: FromStr + std::fmt::Display>(
        &self,
        key: &str,
        default: T,
    ) -> std::result::Result<T, ConfigError> {
        match self.get_number(key)? {
            Some(value) => Ok(value),
            None => {
                debug!(key, default = %default, "Using default value");
                Ok(default)
            }
        }
    }

    /// Comma-separated list, items trimmed and empty items dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get_value(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build an [`EngineConfig`] from file content (no env substitution).
pub fn parse_config(content: &str) -> std::result::Result<EngineConfig, ConfigError> {
    let file = ConfigFile::parse(content);

    let redis = RedisConfig {
        host: file.get_string(REDIS_HOST),
        port: file.get_number_or(REDIS_PORT, default_redis_port())?,
        password: file.get_string(REDIS_PASSWORD),
        db_index: file.get_number_or(REDIS_DB_INDEX, 0)?,
        connect_attempts: file.get_number_or(REDIS_CONNECT_ATTEMPTS, default_connect_attempts())?,
        retry_backoff_ms: file.get_number_or(REDIS_RETRY_BACKOFF_MS, default_retry_backoff_ms())?,
    };

    let group_number: usize = file.get_number_or(GROUP_NUMBER, 0)?;
    let groups = (0..group_number)
        .map(|index| GroupConfig {
            index,
            base_symbol: file.get_string(&group_key(index, BASE_SYMBOL_SUFFIX)),
            price_sources: file.get_list(&group_key(index, PRICE_SOURCES_SUFFIX)),
            symbols: file.get_list(&group_key(index, SYMBOLS_SUFFIX)),
        })
        .collect();

    let common = CommonConfig {
        diff_time_max_secs: file.get_number_or(DIFF_TIME_MAX, default_diff_time_max_secs())?,
        loop_interval_ms: file.get_number_or(LOOP_INTERVAL, default_loop_interval_ms())?,
    };

    let store = match file.get_value(STORE_TYPE) {
        None => StoreKind::default(),
        Some(value) => StoreKind::parse(value)
            .ok_or_else(|| ConfigError::UnknownStoreType(value.to_string()))?,
    };

    Ok(EngineConfig {
        redis,
        groups,
        common,
        store,
        metrics_port: file.get_number(METRICS_PORT)?,
    })
}

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    // Perform environment variable substitution
    let substituted = substitution::substitute_env_vars(&content)?;
    debug!("Environment variable substitution completed");

    let config = parse_config(&substituted)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    info!(
        groups = config.groups.len(),
        store = config.store.as_str(),
        "Configuration loaded successfully"
    );
    Ok(config)
}
