//! Result record written under `price_engine_data_<symbol>`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::symbol::MovingStatistics;

/// One published fair value with its statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct FairValueRecord {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub fair_value: f64,
    pub moving_average: f64,
    pub std_dev_ratio: f64,
}

impl FairValueRecord {
    /// Build a record stamped with `now`. Missing statistics are published
    /// as zeros.
    pub fn new(fair_value: f64, statistics: Option<MovingStatistics>, now: DateTime<Utc>) -> Self {
        let (moving_average, std_dev_ratio) = statistics
            .map(|s| (s.moving_average, s.ratio))
            .unwrap_or((0.0, 0.0));

        Self {
            timestamp: now.timestamp(),
            fair_value,
            moving_average,
            std_dev_ratio,
        }
    }

    /// Serialize for the store. Every field is a decimal string with six
    /// fractional digits, the timestamp an integer string.
    pub fn to_json(&self) -> String {
        let message = RecordMessage {
            timestamp: self.timestamp.to_string(),
            fair_value: format!("{:.6}", self.fair_value),
            mov_avr: format!("{:.6}", self.moving_average),
            std_avr_ratio: format!("{:.6}", self.std_dev_ratio),
        };
        // Four string fields cannot fail to serialize.
        serde_json::to_string(&message).unwrap_or_default()
    }

    /// Parse a stored record. Only `timestamp` and `mov_avr` are required;
    /// the other fields read as zero when absent.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let message: RecordMessage = serde_json::from_str(json)?;

        Ok(Self {
            timestamp: parse_field("timestamp", &message.timestamp)?,
            fair_value: parse_optional("fair_value", &message.fair_value)?,
            moving_average: parse_field("mov_avr", &message.mov_avr)?,
            std_dev_ratio: parse_optional("std_avr_ratio", &message.std_avr_ratio)?,
        })
    }

    /// Whether the record is older than `max_age_secs` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
        now.timestamp() > self.timestamp.saturating_add(max_age)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field {field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct RecordMessage {
    timestamp: String,
    #[serde(default)]
    fair_value: String,
    mov_avr: String,
    #[serde(default)]
    std_avr_ratio: String,
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, RecordError> {
    value.trim().parse().map_err(|_| RecordError::NotANumber {
        field,
        value: value.to_string(),
    })
}

fn parse_optional(field: &'static str, value: &str) -> Result<f64, RecordError> {
    if value.trim().is_empty() {
        return Ok(0.0);
    }
    parse_field(field, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_serialized_fields_are_strings() {
        let stats = MovingStatistics {
            moving_average: 99.5,
            standard_deviation: 0.5,
            ratio: 0.502513,
        };
        let record = FairValueRecord::new(100.0, Some(stats), at(1_700_000_000));
        let value: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();

        assert_eq!(value["timestamp"], "1700000000");
        assert_eq!(value["fair_value"], "100.000000");
        assert_eq!(value["mov_avr"], "99.500000");
        assert_eq!(value["std_avr_ratio"], "0.502513");
    }

    #[test]
    fn test_missing_statistics_are_zero() {
        let record = FairValueRecord::new(0.05, None, at(10));
        let value: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();

        assert_eq!(value["fair_value"], "0.050000");
        assert_eq!(value["mov_avr"], "0.000000");
        assert_eq!(value["std_avr_ratio"], "0.000000");
    }

    #[test]
    fn test_parse_written_record() {
        let written = FairValueRecord::new(5_000_000.0, None, at(42));
        let parsed = FairValueRecord::from_json(&written.to_json()).unwrap();
        assert_eq!(parsed, written);
    }

    #[test]
    fn test_parse_requires_timestamp_and_average() {
        assert!(FairValueRecord::from_json(r#"{"mov_avr":"1.0"}"#).is_err());
        assert!(FairValueRecord::from_json(r#"{"timestamp":"1"}"#).is_err());

        let parsed = FairValueRecord::from_json(r#"{"timestamp":"7","mov_avr":"2.5"}"#).unwrap();
        assert_eq!(parsed.timestamp, 7);
        assert_eq!(parsed.moving_average, 2.5);
        assert_eq!(parsed.fair_value, 0.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = FairValueRecord::from_json(r#"{"timestamp":"soon","mov_avr":"1"}"#).unwrap_err();
        assert!(matches!(err, RecordError::NotANumber { field: "timestamp", .. }));
        assert!(FairValueRecord::from_json("not json").is_err());
    }

    #[test]
    fn test_staleness() {
        let record = FairValueRecord::new(1.0, None, at(1_000));

        assert!(!record.is_stale(at(1_060), 60));
        assert!(record.is_stale(at(1_061), 60));
        assert!(record.is_stale(at(1_001), 0));
        assert!(!record.is_stale(at(1_000), 0));
    }
}
