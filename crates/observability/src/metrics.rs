//! Prometheus metrics for the compute/publish loops
//!
//! Without an installed recorder every handle is a no-op, so groups can
//! always record and the exporter stays optional.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Initialize the Prometheus metrics exporter
///
/// Starts an HTTP listener on `port` exposing `/metrics`.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metrics of one group loop, labelled with the group name.
///
/// * `price_engine_ticks_total` - loop iterations completed
/// * `price_engine_tick_duration_seconds` - time spent computing and publishing
/// * `price_engine_tick_overruns_total` - iterations longer than the interval
/// * `price_engine_published_total` - result records written
/// * `price_engine_publish_failures_total` - failed SET or PUBLISH
/// * `price_engine_unavailable_total` - computations that yielded no value
/// * `price_engine_config_updates_total` - live configs swapped in
/// * `price_engine_config_updates_dropped_total` - updates that could not be applied
/// * `price_engine_symbols` - symbols owned by the group
#[derive(Clone)]
pub struct EngineMetrics {
    ticks: Counter,
    tick_duration: Histogram,
    tick_overruns: Counter,
    published: Counter,
    publish_failures: Counter,
    unavailable: Counter,
    config_updates: Counter,
    config_updates_dropped: Counter,
    symbols: Gauge,
}

impl EngineMetrics {
    pub fn new(group: &str) -> Self {
        let name = group.to_string();

        Self {
            ticks: counter!("price_engine_ticks_total", "group" => name.clone()),
            tick_duration: histogram!("price_engine_tick_duration_seconds", "group" => name.clone()),
            tick_overruns: counter!("price_engine_tick_overruns_total", "group" => name.clone()),
            published: counter!("price_engine_published_total", "group" => name.clone()),
            publish_failures: counter!("price_engine_publish_failures_total", "group" => name.clone()),
            unavailable: counter!("price_engine_unavailable_total", "group" => name.clone()),
            config_updates: counter!("price_engine_config_updates_total", "group" => name.clone()),
            config_updates_dropped: counter!(
                "price_engine_config_updates_dropped_total",
                "group" => name.clone()
            ),
            symbols: gauge!("price_engine_symbols", "group" => name),
        }
    }

    /// Record a finished tick. `overrun` is set when it took longer than
    /// the loop interval.
    pub fn record_tick(&self, elapsed: Duration, overrun: bool) {
        self.ticks.increment(1);
        self.tick_duration.record(elapsed.as_secs_f64());
        if overrun {
            self.tick_overruns.increment(1);
        }
    }

    pub fn record_published(&self) {
        self.published.increment(1);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.increment(1);
    }

    pub fn record_unavailable(&self) {
        self.unavailable.increment(1);
    }

    pub fn record_config_update(&self) {
        self.config_updates.increment(1);
    }

    pub fn record_config_update_dropped(&self) {
        self.config_updates_dropped.increment(1);
    }

    pub fn set_symbols(&self, count: usize) {
        self.symbols.set(count as f64);
    }
}
