//! Process supervisor: connects every group, runs the shared dispatcher
//! and stops everything on shutdown.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use config::{EngineConfig, RedisConfig, StoreKind};

use crate::dispatcher::NotificationDispatcher;
use crate::group::{Group, GroupSettings};
use crate::store::{create_store, InMemoryStore, PriceStore, StoreError, StoreResult};
use crate::Result;

/// Open a store connection, retrying transient failures.
///
/// Makes up to `connect_attempts` attempts `retry_backoff_ms` apart. A
/// rejected password is not retried.
pub async fn connect_with_retry(kind: StoreKind, redis: &RedisConfig) -> StoreResult<Arc<dyn PriceStore>> {
    let attempts = redis.connect_attempts.max(1);

    let mut attempt = 1;
    loop {
        match create_store(kind, redis).await {
            Ok(store) => return Ok(store),
            Err(e @ StoreError::Authentication(_)) => {
                error!(error = %e, "Store rejected credentials");
                return Err(e);
            }
            Err(e) if attempt >= attempts => {
                error!(attempts, error = %e, "Giving up connecting to store");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    backoff_ms = redis.retry_backoff_ms,
                    error = %e,
                    "Store connection failed, retrying"
                );
                tokio::time::sleep(redis.retry_backoff()).await;
                attempt += 1;
            }
        }
    }
}

/// Running engine: every configured group plus the dispatcher feeding them.
pub struct Supervisor {
    groups: Vec<Group>,
    dispatcher_token: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Initialize every group and start their loops.
    ///
    /// Each group gets its own store connection, except with the memory
    /// store where all groups share one instance. Any connection failure
    /// aborts startup.
    #[instrument(skip_all, fields(store = config.store.as_str(), groups = config.groups.len()))]
    pub async fn start(config: &EngineConfig) -> Result<Self> {
        let settings = GroupSettings::from(&config.common);
        let shared: Option<Arc<dyn PriceStore>> = match config.store {
            StoreKind::Memory => Some(Arc::new(InMemoryStore::new())),
            StoreKind::Redis => None,
        };

        let mut dispatcher = NotificationDispatcher::new();
        let mut groups = Vec::with_capacity(config.groups.len());
        for descriptor in &config.groups {
            let store = match &shared {
                Some(store) => store.clone(),
                None => connect_with_retry(config.store, &config.redis).await?,
            };
            let group = Group::initialize(store, descriptor, settings.clone(), &mut dispatcher).await?;
            groups.push(group);
        }

        Self::run(groups, dispatcher)
    }

    /// Start already initialized groups.
    pub fn run(mut groups: Vec<Group>, dispatcher: NotificationDispatcher) -> Result<Self> {
        let dispatcher_token = CancellationToken::new();
        let dispatcher = dispatcher.spawn(dispatcher_token.clone());

        for group in &mut groups {
            group.start_loop()?;
        }

        info!(groups = groups.len(), "Price engine running");
        Ok(Self {
            groups,
            dispatcher_token,
            dispatcher: Some(dispatcher),
        })
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Stop every group loop, waiting for in-flight ticks, then the
    /// dispatcher.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Stopping price engine");

        let mut first_error = None;
        for group in &mut self.groups {
            if let Err(e) = group.stop_loop().await {
                error!(group = %group.name(), error = %e, "Failed to stop group");
                first_error.get_or_insert(e);
            }
        }

        self.dispatcher_token.cancel();
        if let Some(handle) = self.dispatcher.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Notification dispatcher failed");
            }
        }

        info!("Price engine stopped");
        first_error.map_or(Ok(()), Err)
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
