use crate::*;
use std::collections::HashMap;
use thiserror::Error;

/// Length of a symbol made of two 3-character codes.
const PAIR_SYMBOL_LEN: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("redis_server.host is required")]
    MissingHost,

    #[error("redis_server.port must be a positive integer")]
    InvalidPort,

    #[error("redis_server.connect_attempts must be at least 1")]
    InvalidConnectAttempts,

    #[error("common.loop_interval must be a positive number of milliseconds")]
    InvalidLoopInterval,

    #[error("No groups defined (group.group_number is 0 or missing)")]
    NoGroups,

    #[error("Group '{group}' has no symbols")]
    EmptyGroup { group: String },

    #[error("Environment variable placeholder left unresolved in '{field}'")]
    UnresolvedEnvVar { field: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &EngineConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.store == StoreKind::Redis {
        validate_redis(&config.redis, &mut report);
    }
    validate_common(&config.common, &mut report);
    validate_groups(&config.groups, &mut report);

    report
}

fn validate_redis(redis: &RedisConfig, report: &mut ValidationReport) {
    if redis.host.is_empty() {
        report.add_error(ValidationError::MissingHost);
    } else if has_unresolved_env_vars(&redis.host) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: keys::REDIS_HOST.to_string(),
        });
    }

    if redis.port == 0 {
        report.add_error(ValidationError::InvalidPort);
    }

    if has_unresolved_env_vars(&redis.password) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: keys::REDIS_PASSWORD.to_string(),
        });
    }

    if redis.connect_attempts == 0 {
        report.add_error(ValidationError::InvalidConnectAttempts);
    }
}

fn validate_common(common: &CommonConfig, report: &mut ValidationReport) {
    if common.loop_interval_ms == 0 {
        report.add_error(ValidationError::InvalidLoopInterval);
    }

    if common.diff_time_max_secs == 0 {
        report.add_warning(
            keys::DIFF_TIME_MAX,
            "0 seconds makes every base currency fair value stale",
        );
    }
}

fn validate_groups(groups: &[GroupConfig], report: &mut ValidationReport) {
    if groups.is_empty() {
        report.add_error(ValidationError::NoGroups);
        return;
    }

    let mut seen: HashMap<&str, String> = HashMap::new();

    for group in groups {
        let field = keys::group_key(group.index, keys::SYMBOLS_SUFFIX);

        if group.symbols.is_empty() {
            report.add_error(ValidationError::EmptyGroup { group: group.name() });
            continue;
        }

        for symbol in &group.symbols {
            if symbol.chars().count() != PAIR_SYMBOL_LEN {
                report.add_warning(
                    &field,
                    &format!(
                        "Symbol '{}' is not a {}-character pair and cannot be priced from a base currency",
                        symbol, PAIR_SYMBOL_LEN
                    ),
                );
            }

            if let Some(owner) = seen.insert(symbol.as_str(), group.name()) {
                report.add_warning(
                    &field,
                    &format!("Symbol '{}' is also configured in {}", symbol, owner),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> EngineConfig {
        EngineConfig {
            redis: RedisConfig {
                host: "localhost".to_string(),
                ..Default::default()
            },
            groups: vec![GroupConfig {
                index: 0,
                base_symbol: "jpy".to_string(),
                price_sources: vec![],
                symbols: vec!["btcjpy".to_string(), "ethjpy".to_string()],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let report = validate_config(&valid_config());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_host_and_zero_interval() {
        let mut config = valid_config();
        config.redis.host.clear();
        config.common.loop_interval_ms = 0;

        let report = validate_config(&config);
        assert!(!report.is_valid());
        assert!(report.errors.contains(&ValidationError::MissingHost));
        assert!(report.errors.contains(&ValidationError::InvalidLoopInterval));
    }

    #[test]
    fn test_memory_store_skips_redis_checks() {
        let mut config = valid_config();
        config.redis.host.clear();
        config.store = StoreKind::Memory;

        assert!(validate_config(&config).is_valid());
    }

    #[test]
    fn test_unresolved_password() {
        let mut config = valid_config();
        config.redis.password = "${PE_REDIS_PASSWORD}".to_string();

        let report = validate_config(&config);
        assert_eq!(
            report.errors,
            vec![ValidationError::UnresolvedEnvVar {
                field: "redis_server.password".to_string()
            }]
        );
    }

    #[test]
    fn test_password_with_dollar_is_accepted() {
        let content = crate::substitute_env_vars(
            "redis_server.host = localhost\n\
             redis_server.password = pa$word\n\
             group.group_number = 1\n\
             group_0.symbols = btcjpy\n",
        )
        .unwrap();
        let config = crate::parse_config(&content).unwrap();
        assert_eq!(config.redis.password, "pa$word");

        let report = validate_config(&config);
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn test_groups_errors_and_warnings() {
        let mut config = valid_config();
        config.groups.push(GroupConfig {
            index: 1,
            symbols: vec!["btcjpy".to_string(), "btc".to_string()],
            ..Default::default()
        });
        config.groups.push(GroupConfig {
            index: 2,
            ..Default::default()
        });

        let report = validate_config(&config);
        assert_eq!(
            report.errors,
            vec![ValidationError::EmptyGroup {
                group: "group_2".to_string()
            }]
        );
        // One duplicate, one short symbol.
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().all(|w| w.field == "group_1.symbols"));
    }

    #[test]
    fn test_no_groups() {
        let mut config = valid_config();
        config.groups.clear();

        let report = validate_config(&config);
        assert_eq!(report.errors, vec![ValidationError::NoGroups]);
    }
}
