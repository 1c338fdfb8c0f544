//! Live fair value configuration of a symbol
//!
//! Dealers edit these settings on the console, which writes them as JSON
//! under `config_pe_<symbol>` and then announces the symbol on the
//! configuration channel. A configuration is always replaced as a whole.

use serde::Deserialize;

/// Base currency used when the live configuration does not name one.
pub const DEFAULT_BASE_CURRENCY: &str = "jpy";

/// How a symbol's fair value is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculateMethod {
    /// From order books of other trading platforms. Not implemented:
    /// always yields zero.
    FromOtherSources,
    /// The configured fixed price.
    FixedPrice,
    /// Ratio of both legs priced against the base currency, e.g.
    /// `ethbtc = ethjpy / btcjpy`.
    BasedOnCurrency,
    /// Any other code sent by the console.
    Unsupported(i64),
}

impl CalculateMethod {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::FromOtherSources,
            1 => Self::FixedPrice,
            2 => Self::BasedOnCurrency,
            other => Self::Unsupported(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::FromOtherSources => 0,
            Self::FixedPrice => 1,
            Self::BasedOnCurrency => 2,
            Self::Unsupported(code) => *code,
        }
    }
}

/// Post-processing applied to a computed fair value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewType {
    /// Add `value`.
    ByValue,
    /// Move by `percent` percent.
    ByPercent,
    Unsupported(i64),
}

impl SkewType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::ByValue,
            2 => Self::ByPercent,
            other => Self::Unsupported(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkewConfig {
    pub active: bool,
    pub skew_type: SkewType,
    pub value: f64,
    pub percent: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            active: false,
            skew_type: SkewType::ByValue,
            value: 0.0,
            percent: 0.0,
        }
    }
}

/// Settings used to compute one symbol's fair value.
#[derive(Debug, Clone, PartialEq)]
pub struct FairValueConfig {
    pub calculate_method: CalculateMethod,
    /// Weight of each external source. Reserved for
    /// [`CalculateMethod::FromOtherSources`].
    pub source_percentage: Vec<f64>,
    /// Order book levels with less volume are ignored. Reserved.
    pub lot_limit: i64,
    /// Outlier filter for source prices. Reserved.
    pub filter_ratio: f64,
    pub fixed_price: f64,
    pub base_currency: String,
    pub skew: SkewConfig,
    /// Number of most recent fair values used for statistics.
    pub moving_average_window: usize,
}

impl Default for FairValueConfig {
    fn default() -> Self {
        Self {
            calculate_method: CalculateMethod::FromOtherSources,
            source_percentage: Vec::new(),
            lot_limit: 0,
            filter_ratio: 0.0,
            fixed_price: 0.0,
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            skew: SkewConfig::default(),
            moving_average_window: 0,
        }
    }
}

impl FairValueConfig {
    /// Fixed price configuration without skew.
    pub fn fixed(price: f64, moving_average_window: usize) -> Self {
        Self {
            calculate_method: CalculateMethod::FixedPrice,
            fixed_price: price,
            moving_average_window,
            ..Default::default()
        }
    }

    /// Parse the JSON message written by the console.
    ///
    /// Every field except `base_currency` and `PEpercentage` is required.
    /// `FVType` and `FVFixedPrice` are accepted as numbers or numeric
    /// strings. Integer fields also accept floats such as `20.0`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let message: LiveConfigMessage = serde_json::from_str(json)?;

        let base_currency = message
            .base_currency
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string());

        Ok(Self {
            calculate_method: CalculateMethod::from_code(message.calculate_method.as_integer()),
            source_percentage: message.source_percentage,
            lot_limit: message.lot_limit.as_integer(),
            filter_ratio: message.filter_ratio,
            fixed_price: message.fixed_price.as_float(),
            base_currency,
            skew: SkewConfig {
                active: message.skew.active.is_set(),
                skew_type: SkewType::from_code(message.skew.skew_type.as_integer()),
                value: message.skew.value,
                percent: message.skew.percent,
            },
            moving_average_window: usize::try_from(message.moving_average.as_integer()).unwrap_or(0),
        })
    }
}

// ----------------------------------------------------------------------------
// Wire format
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LiveConfigMessage {
    #[serde(rename = "FVType")]
    calculate_method: NumberOrString,
    #[serde(rename = "PElotlimit")]
    lot_limit: NumberOrString,
    filter_ratio: f64,
    #[serde(rename = "FVFixedPrice")]
    fixed_price: NumberOrString,
    #[serde(rename = "PEinput")]
    skew: SkewMessage,
    #[serde(rename = "PEmvlen")]
    moving_average: NumberOrString,
    #[serde(default)]
    base_currency: Option<String>,
    #[serde(rename = "PEpercentage", default)]
    source_percentage: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct SkewMessage {
    active: Flag,
    #[serde(rename = "type_active")]
    skew_type: NumberOrString,
    value: f64,
    percent: f64,
}

/// The console sends some numbers as strings, and integers as floats. A
/// string that does not hold a number fails the whole message. Integer
/// fields truncate fractional values.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Integer(i64),
    Float(f64),
    Text(#[serde(deserialize_with = "numeric_string")] f64),
}

impl NumberOrString {
    fn as_integer(&self) -> i64 {
        match self {
            Self::Integer(i) => *i,
            Self::Float(f) | Self::Text(f) => f.trunc() as i64,
        }
    }

    fn as_float(&self) -> f64 {
        match self {
            Self::Integer(i) => *i as f64,
            Self::Float(f) | Self::Text(f) => *f,
        }
    }
}

fn numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    text.trim()
        .parse::<f64>()
        .map_err(|_| serde::de::Error::custom(format!("not a number: {:?}", text)))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Integer(i) => *i != 0,
            Self::Float(f) => f.trunc() != 0.0,
            Self::Bool(b) => *b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONSOLE_MESSAGE: &str = r#"{
        "FVType": "1",
        "PElotlimit": 10,
        "filter_ratio": 0.5,
        "FVFixedPrice": "123.45",
        "PEinput": { "active": 1, "type_active": 2, "value": 1.5, "percent": 10 },
        "PEmvlen": 20
    }"#;

    #[test]
    fn test_parse_console_message() {
        let config = FairValueConfig::from_json(CONSOLE_MESSAGE).unwrap();

        assert_eq!(config.calculate_method, CalculateMethod::FixedPrice);
        assert_eq!(config.lot_limit, 10);
        assert_eq!(config.filter_ratio, 0.5);
        assert_eq!(config.fixed_price, 123.45);
        assert_eq!(config.base_currency, "jpy");
        assert!(config.skew.active);
        assert_eq!(config.skew.skew_type, SkewType::ByPercent);
        assert_eq!(config.skew.value, 1.5);
        assert_eq!(config.skew.percent, 10.0);
        assert_eq!(config.moving_average_window, 20);
        assert!(config.source_percentage.is_empty());
    }

    #[test]
    fn test_numeric_fields_accept_numbers() {
        let json = r#"{
            "FVType": 2, "PElotlimit": 0, "filter_ratio": 0,
            "FVFixedPrice": 100,
            "PEinput": { "active": 0, "type_active": 1, "value": 0, "percent": 0 },
            "PEmvlen": 5, "base_currency": "usd", "PEpercentage": [60, 40]
        }"#;
        let config = FairValueConfig::from_json(json).unwrap();

        assert_eq!(config.calculate_method, CalculateMethod::BasedOnCurrency);
        assert_eq!(config.fixed_price, 100.0);
        assert!(!config.skew.active);
        assert_eq!(config.base_currency, "usd");
        assert_eq!(config.source_percentage, vec![60.0, 40.0]);
    }

    #[test]
    fn test_integer_fields_accept_floats() {
        let json = r#"{
            "FVType": 1.0, "PElotlimit": 10.0, "filter_ratio": 0.5,
            "FVFixedPrice": 100,
            "PEinput": { "active": 1.0, "type_active": 2.0, "value": 0, "percent": 5 },
            "PEmvlen": 20.0
        }"#;
        let config = FairValueConfig::from_json(json).unwrap();

        assert_eq!(config.calculate_method, CalculateMethod::FixedPrice);
        assert_eq!(config.lot_limit, 10);
        assert!(config.skew.active);
        assert_eq!(config.skew.skew_type, SkewType::ByPercent);
        assert_eq!(config.moving_average_window, 20);

        let inactive = json.replace(r#""active": 1.0"#, r#""active": 0.0"#);
        assert!(!FairValueConfig::from_json(&inactive).unwrap().skew.active);
    }

    #[test]
    fn test_unknown_codes_are_kept() {
        let json = CONSOLE_MESSAGE
            .replace(r#""FVType": "1""#, r#""FVType": 7"#)
            .replace(r#""type_active": 2"#, r#""type_active": 9"#);
        let config = FairValueConfig::from_json(&json).unwrap();

        assert_eq!(config.calculate_method, CalculateMethod::Unsupported(7));
        assert_eq!(config.calculate_method.code(), 7);
        assert_eq!(config.skew.skew_type, SkewType::Unsupported(9));
    }

    #[test]
    fn test_missing_field_fails() {
        let json = CONSOLE_MESSAGE.replace(r#""PEmvlen": 20"#, r#""unrelated": 20"#);
        assert!(FairValueConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_non_numeric_string_fails() {
        let json = CONSOLE_MESSAGE.replace(r#""FVFixedPrice": "123.45""#, r#""FVFixedPrice": "abc""#);
        assert!(FairValueConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_malformed_json_fails() {
        assert!(FairValueConfig::from_json("{not json").is_err());
        assert!(FairValueConfig::from_json("").is_err());
    }

    #[test]
    fn test_negative_window_means_no_statistics() {
        let json = CONSOLE_MESSAGE.replace(r#""PEmvlen": 20"#, r#""PEmvlen": -3"#);
        let config = FairValueConfig::from_json(&json).unwrap();
        assert_eq!(config.moving_average_window, 0);
    }
}
