//! Symbol: live configuration, fair value history and computation
//!
//! A symbol's configuration is written by configuration updates and read by
//! its group's loop. Both paths take the same per-symbol lock, held for the
//! whole computation including store lookups, so a computation never sees a
//! configuration that is half replaced.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::keys;
use crate::live_config::{CalculateMethod, FairValueConfig, SkewConfig, SkewType};
use crate::record::FairValueRecord;
use crate::store::PriceStore;

/// Maximum number of fair values kept per symbol.
pub const MAX_HISTORY: usize = 600;

/// Process-wide settings a symbol needs, taken from the engine
/// configuration.
#[derive(Debug, Clone)]
pub struct SymbolSettings {
    /// Base currency records older than this are unavailable.
    pub max_staleness: Duration,
}

impl Default for SymbolSettings {
    fn default() -> Self {
        Self {
            max_staleness: Duration::from_secs(60),
        }
    }
}

/// Rolling statistics over the most recent fair values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingStatistics {
    pub moving_average: f64,
    /// Population standard deviation over the same window
    pub standard_deviation: f64,
    /// `standard_deviation * 100 / moving_average`, or 0 when the average
    /// is not above 1
    pub ratio: f64,
}

impl MovingStatistics {
    /// Statistics over the first `window` values of `history`, newest
    /// first. `None` when there is nothing to compute over.
    pub fn compute(history: &VecDeque<f64>, window: usize) -> Option<Self> {
        let window = window.min(history.len());
        if window == 0 {
            return None;
        }

        let count = window as f64;
        let moving_average = history.iter().take(window).sum::<f64>() / count;
        let variance = history
            .iter()
            .take(window)
            .map(|v| (v - moving_average).powi(2))
            .sum::<f64>()
            / count;
        let standard_deviation = variance.sqrt();

        let ratio = if moving_average > 1.0 {
            standard_deviation * 100.0 / moving_average
        } else {
            0.0
        };

        Some(Self {
            moving_average,
            standard_deviation,
            ratio,
        })
    }
}

/// Split a 6 character pair name into its two 3 character codes.
pub fn split_pair(name: &str) -> Option<(&str, &str)> {
    if name.len() != 6 || !name.is_ascii() {
        return None;
    }
    Some(name.split_at(3))
}

/// Apply the configured skew to a computed value.
///
/// `ByPercent` moves the value by `percent` percent: 10 turns 100 into 110.
pub fn apply_skew(symbol: &str, value: f64, skew: &SkewConfig) -> f64 {
    if !skew.active {
        return value;
    }

    match skew.skew_type {
        SkewType::ByValue => value + skew.value,
        SkewType::ByPercent => value * (1.0 + skew.percent / 100.0),
        SkewType::Unsupported(code) => {
            warn!(%symbol, skew_type = code, "Unsupported skew type, value left unskewed");
            value
        }
    }
}

struct SymbolState {
    config: FairValueConfig,
    /// Newest first
    history: VecDeque<f64>,
}

/// One instrument owned by a group.
pub struct Symbol {
    name: String,
    state: Mutex<SymbolState>,
    store: Arc<dyn PriceStore>,
    settings: SymbolSettings,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        config: FairValueConfig,
        store: Arc<dyn PriceStore>,
        settings: SymbolSettings,
    ) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SymbolState {
                config,
                history: VecDeque::with_capacity(MAX_HISTORY + 1),
            }),
            store,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the live configuration. Waits for an in-flight computation
    /// to finish first.
    pub async fn update_config(&self, config: FairValueConfig) {
        let mut state = self.state.lock().await;
        state.config = config;
    }

    /// Snapshot of the current configuration
    pub async fn config(&self) -> FairValueConfig {
        self.state.lock().await.config.clone()
    }

    /// Compute this cycle's fair value.
    ///
    /// Returns 0 when no value is available: unimplemented or unsupported
    /// method, or a base currency leg that is missing or stale. Only
    /// positive values enter the history.
    pub async fn calculate_fair_value(&self) -> f64 {
        let mut state = self.state.lock().await;

        let value = match state.config.calculate_method {
            CalculateMethod::FromOtherSources => return 0.0,
            CalculateMethod::FixedPrice => state.config.fixed_price,
            CalculateMethod::BasedOnCurrency => {
                match self.based_on_currency(&state.config.base_currency).await {
                    Some(value) => value,
                    None => return 0.0,
                }
            }
            CalculateMethod::Unsupported(code) => {
                warn!(symbol = %self.name, method = code, "Unsupported calculate method");
                return 0.0;
            }
        };

        let value = apply_skew(&self.name, value, &state.config.skew);

        if value > 0.0 {
            state.history.push_front(value);
            state.history.truncate(MAX_HISTORY);
        }

        value
    }

    /// Statistics over the configured window of the history. `None` when the
    /// history is empty or the window is 0.
    pub async fn calculate_moving_average(&self) -> Option<MovingStatistics> {
        let state = self.state.lock().await;
        MovingStatistics::compute(&state.history, state.config.moving_average_window)
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    /// Copy of the history, newest first
    pub async fn history(&self) -> Vec<f64> {
        self.state.lock().await.history.iter().copied().collect()
    }

    async fn based_on_currency(&self, base_currency: &str) -> Option<f64> {
        let Some((first, second)) = split_pair(&self.name) else {
            error!(symbol = %self.name, "Symbol name is not a 6 character pair");
            return None;
        };

        let numerator = self.base_currency_fair_value(&format!("{}{}", first, base_currency)).await;
        if numerator <= 0.0 {
            error!(symbol = %self.name, leg = first, "Base currency leg unavailable, no fair value");
            return None;
        }

        let denominator = self.base_currency_fair_value(&format!("{}{}", second, base_currency)).await;
        if denominator <= 0.0 {
            error!(symbol = %self.name, leg = second, "Base currency leg unavailable, no fair value");
            return None;
        }

        Some(numerator / denominator)
    }

    /// Moving average last published for `pair`, or 0 when the record is
    /// missing, unreadable or stale.
    pub async fn base_currency_fair_value(&self, pair: &str) -> f64 {
        let key = keys::result_key(pair);

        let json = match self.store.get(&key).await {
            Ok(Some(json)) => json,
            Ok(None) => {
                debug!(%pair, "No published record");
                return 0.0;
            }
            Err(e) => {
                error!(%pair, error = %e, "Failed to read published record");
                return 0.0;
            }
        };

        let record = match FairValueRecord::from_json(&json) {
            Ok(record) => record,
            Err(e) => {
                error!(%pair, error = %e, "Failed to parse published record");
                return 0.0;
            }
        };

        if record.is_stale(Utc::now(), self.settings.max_staleness.as_secs()) {
            info!(
                %pair,
                timestamp = record.timestamp,
                max_staleness_secs = self.settings.max_staleness.as_secs(),
                "Published record is stale"
            );
            return 0.0;
        }

        record.moving_average
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Symbol")
            .field("name", &self.name)
            .field("store", &self.store.backend())
            .finish()
    }
}
