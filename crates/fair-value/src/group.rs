//! Group: a set of symbols sharing one store handle and one loop
//!
//! The loop computes every symbol in order, publishes the results and
//! sleeps out the rest of the interval. While sleeping it applies live
//! configuration changes forwarded by the dispatcher.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use config::{CommonConfig, GroupConfig};
use observability::EngineMetrics;

use crate::dispatcher::{ConfigChanged, NotificationDispatcher};
use crate::error::FairValueError;
use crate::keys;
use crate::live_config::FairValueConfig;
use crate::record::FairValueRecord;
use crate::store::PriceStore;
use crate::symbol::{Symbol, SymbolSettings};
use crate::Result;

/// Configuration changes buffered per group before the dispatcher starts
/// dropping them.
pub const DEFAULT_UPDATE_BUFFER: usize = 64;

/// Loop settings shared by every group.
#[derive(Debug, Clone)]
pub struct GroupSettings {
    /// Target period of the loop
    pub loop_interval: Duration,
    /// Base currency records older than this are unavailable
    pub max_staleness: Duration,
    /// Capacity of the configuration change channel
    pub update_buffer: usize,
}

impl From<&CommonConfig> for GroupSettings {
    fn from(common: &CommonConfig) -> Self {
        Self {
            loop_interval: common.loop_interval(),
            max_staleness: common.max_staleness(),
            update_buffer: DEFAULT_UPDATE_BUFFER,
        }
    }
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self::from(&CommonConfig::default())
    }
}

/// Read and parse the live configuration of `symbol`.
pub async fn fetch_live_config(store: &dyn PriceStore, symbol: &str) -> Result<FairValueConfig> {
    let json = store
        .get(&keys::config_key(symbol))
        .await?
        .ok_or_else(|| FairValueError::ConfigNotFound(symbol.to_string()))?;

    FairValueConfig::from_json(&json).map_err(|e| FairValueError::InvalidConfig {
        symbol: symbol.to_string(),
        message: e.to_string(),
    })
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Symbols computed and published by one loop.
pub struct Group {
    name: String,
    store: Arc<dyn PriceStore>,
    symbols: Vec<Arc<Symbol>>,
    settings: GroupSettings,
    metrics: EngineMetrics,
    updates: Option<mpsc::Receiver<ConfigChanged>>,
    running: Option<RunningLoop>,
    started: bool,
}

impl Group {
    /// Subscribe to configuration changes through `dispatcher` and load the
    /// live configuration of every symbol in `descriptor`.
    ///
    /// A symbol whose configuration cannot be loaded is left out of the
    /// group for good. Failing to subscribe is an error.
    #[instrument(skip_all, fields(group = %descriptor.name()))]
    pub async fn initialize(
        store: Arc<dyn PriceStore>,
        descriptor: &GroupConfig,
        settings: GroupSettings,
        dispatcher: &mut NotificationDispatcher,
    ) -> Result<Self> {
        let name = descriptor.name();
        info!(
            backend = store.backend(),
            base_symbol = %descriptor.base_symbol,
            price_sources = ?descriptor.price_sources,
            "Initializing group"
        );

        let subscription = store.subscribe(keys::CONFIG_CHANNEL).await?;
        let (sender, receiver) = mpsc::channel(settings.update_buffer.max(1));
        dispatcher.attach(name.clone(), subscription, sender);

        let symbol_settings = SymbolSettings {
            max_staleness: settings.max_staleness,
        };

        let mut symbols = Vec::with_capacity(descriptor.symbols.len());
        for symbol_name in &descriptor.symbols {
            match fetch_live_config(store.as_ref(), symbol_name).await {
                Ok(config) => {
                    info!(
                        symbol = %symbol_name,
                        method = config.calculate_method.code(),
                        "Loaded live configuration"
                    );
                    symbols.push(Arc::new(Symbol::new(
                        symbol_name.clone(),
                        config,
                        store.clone(),
                        symbol_settings.clone(),
                    )));
                }
                Err(e) => {
                    error!(symbol = %symbol_name, error = %e, "Symbol excluded from group");
                }
            }
        }

        let metrics = EngineMetrics::new(&name);
        metrics.set_symbols(symbols.len());
        info!(symbols = symbols.len(), "Group initialized");

        Ok(Self {
            name,
            store,
            symbols,
            settings,
            metrics,
            updates: Some(receiver),
            running: None,
            started: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbols that loaded successfully, in configured order
    pub fn symbols(&self) -> &[Arc<Symbol>] {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<&Arc<Symbol>> {
        self.symbols.iter().find(|s| s.name() == name)
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the loop. A group runs at most once.
    pub fn start_loop(&mut self) -> Result<()> {
        if self.started {
            return Err(FairValueError::AlreadyStarted(self.name.clone()));
        }
        let updates = self
            .updates
            .take()
            .ok_or_else(|| FairValueError::AlreadyStarted(self.name.clone()))?;
        self.started = true;

        let token = CancellationToken::new();
        let group_loop = GroupLoop {
            name: self.name.clone(),
            store: self.store.clone(),
            symbols: self.symbols.clone(),
            loop_interval: self.settings.loop_interval,
            metrics: self.metrics.clone(),
            updates: Some(updates),
            token: token.clone(),
        };

        let handle = tokio::spawn(group_loop.run());
        self.running = Some(RunningLoop { token, handle });
        Ok(())
    }

    /// Ask the loop to stop and wait until it has. An in-flight tick
    /// completes first.
    pub async fn stop_loop(&mut self) -> Result<()> {
        let running = self
            .running
            .take()
            .ok_or_else(|| FairValueError::NotStarted(self.name.clone()))?;

        running.token.cancel();
        running
            .handle
            .await
            .map_err(|e| FairValueError::Join(e.to_string()))?;

        info!(group = %self.name, "Group loop stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("symbols", &self.symbols.len())
            .field("started", &self.started)
            .finish()
    }
}

enum Wake {
    Cancelled,
    Elapsed,
    Update(Option<ConfigChanged>),
}

/// State owned by a running loop task
struct GroupLoop {
    name: String,
    store: Arc<dyn PriceStore>,
    symbols: Vec<Arc<Symbol>>,
    loop_interval: Duration,
    metrics: EngineMetrics,
    /// `None` once the dispatcher side is gone
    updates: Option<mpsc::Receiver<ConfigChanged>>,
    token: CancellationToken,
}

impl GroupLoop {
    async fn run(mut self) {
        info!(
            group = %self.name,
            symbols = self.symbols.len(),
            interval_ms = self.loop_interval.as_millis() as u64,
            "Group loop started"
        );

        while !self.token.is_cancelled() {
            let started = Instant::now();
            self.tick().await;

            let elapsed = started.elapsed();
            let overrun = elapsed >= self.loop_interval;
            self.metrics.record_tick(elapsed, overrun);
            if overrun {
                debug!(
                    group = %self.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Tick overran the interval"
                );
            }

            if !self.wait_until(started + self.loop_interval).await {
                break;
            }
        }

        info!(group = %self.name, "Group loop exiting");
    }

    /// Compute and publish every symbol once.
    async fn tick(&self) {
        for symbol in &self.symbols {
            let fair_value = symbol.calculate_fair_value().await;
            if fair_value <= 0.0 {
                self.metrics.record_unavailable();
                continue;
            }

            let statistics = symbol.calculate_moving_average().await;
            let record = FairValueRecord::new(fair_value, statistics, Utc::now());
            info!(
                group = %self.name,
                symbol = %symbol.name(),
                fair_value,
                moving_average = record.moving_average,
                std_dev_ratio = record.std_dev_ratio,
                "Fair value computed"
            );

            self.publish(symbol.name(), &record).await;
        }
    }

    async fn publish(&self, symbol: &str, record: &FairValueRecord) {
        if let Err(e) = self.store.set(&keys::result_key(symbol), &record.to_json()).await {
            error!(group = %self.name, %symbol, error = %e, "Failed to write result record");
            self.metrics.record_publish_failure();
            return;
        }

        if let Err(e) = self.store.publish(keys::RESULT_CHANNEL, symbol).await {
            error!(group = %self.name, %symbol, error = %e, "Failed to announce result");
            self.metrics.record_publish_failure();
            return;
        }

        self.metrics.record_published();
    }

    /// Apply configuration changes until `deadline`. Returns `false` when
    /// the loop was cancelled.
    async fn wait_until(&mut self, deadline: Instant) -> bool {
        // An overrun tick still picks up changes that queued meanwhile.
        while let Some(update) = self.updates.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.apply_update(update).await;
        }

        loop {
            let wake = tokio::select! {
                biased;
                _ = self.token.cancelled() => Wake::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Wake::Elapsed,
                update = next_update(&mut self.updates) => Wake::Update(update),
            };

            match wake {
                Wake::Cancelled => return false,
                Wake::Elapsed => return true,
                Wake::Update(Some(update)) => self.apply_update(update).await,
                Wake::Update(None) => {
                    warn!(group = %self.name, "Configuration change channel closed");
                    self.updates = None;
                }
            }
        }
    }

    async fn apply_update(&self, update: ConfigChanged) {
        let Some(symbol) = self.symbols.iter().find(|s| s.name() == update.symbol) else {
            return;
        };

        match fetch_live_config(self.store.as_ref(), symbol.name()).await {
            Ok(config) => {
                symbol.update_config(config).await;
                self.metrics.record_config_update();
                info!(group = %self.name, symbol = %symbol.name(), "Live configuration updated");
            }
            Err(e) => {
                self.metrics.record_config_update_dropped();
                error!(
                    group = %self.name,
                    symbol = %symbol.name(),
                    error = %e,
                    "Configuration update dropped, keeping previous configuration"
                );
            }
        }
    }
}

async fn next_update(updates: &mut Option<mpsc::Receiver<ConfigChanged>>) -> Option<ConfigChanged> {
    match updates {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
