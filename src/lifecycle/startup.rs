//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the counter store selected in configuration
//! - Build the token verifier from the auth settings
//! - Start background tasks (in-memory store sweeper)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{GatewayConfig, StoreBackend, StoreConfig};
use crate::lifecycle::Shutdown;
use crate::security::{verifier_from_config, TokenVerifier};
use crate::store::{CounterStore, InMemoryStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("counter store: {0}")]
    Store(#[from] StoreError),

    #[error("store.backend = \"redis\" requires the `redis-store` feature")]
    RedisNotCompiled,

    #[error("store.redis_url is required for the redis backend")]
    MissingRedisUrl,
}

/// Everything the HTTP server needs that depends on the outside world.
#[derive(Debug)]
pub struct Components {
    pub store: Arc<dyn CounterStore>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub sweeper: Option<JoinHandle<()>>,
}

/// Build the store and verifier described by `config`.
pub async fn build_components(
    config: &GatewayConfig,
    shutdown: &Shutdown,
) -> Result<Components, StartupError> {
    let (store, sweeper) = build_store(&config.store, shutdown).await?;
    let verifier = verifier_from_config(&config.auth);

    if config.auth.enabled && verifier.is_none() {
        tracing::warn!("Auth gate enabled without verifier material; protected routes will reject everything");
    }

    Ok(Components {
        store,
        verifier,
        sweeper,
    })
}

async fn build_store(
    config: &StoreConfig,
    shutdown: &Shutdown,
) -> Result<(Arc<dyn CounterStore>, Option<JoinHandle<()>>), StartupError> {
    match config.backend {
        StoreBackend::Memory => {
            let store = Arc::new(InMemoryStore::new());
            let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
            let sweeper = spawn_sweeper(store.clone(), interval, shutdown);
            tracing::info!(sweep_interval = ?interval, "Using in-memory counter store");
            Ok((store, Some(sweeper)))
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or(StartupError::MissingRedisUrl)?;
            connect_redis(url).await.map(|store| (store, None))
        }
    }
}

#[cfg(feature = "redis-store")]
async fn connect_redis(url: &str) -> Result<Arc<dyn CounterStore>, StartupError> {
    let store = crate::store::RedisStore::connect(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis-store"))]
async fn connect_redis(_url: &str) -> Result<Arc<dyn CounterStore>, StartupError> {
    Err(StartupError::RedisNotCompiled)
}

/// Periodically drop expired in-memory entries until shutdown.
pub fn spawn_sweeper(
    store: Arc<InMemoryStore>,
    interval: Duration,
    shutdown: &Shutdown,
) -> JoinHandle<()> {
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = store.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = store.len(), "Swept expired counters");
                    }
                }
                _ = rx.recv() => {
                    tracing::debug!("Store sweeper stopping");
                    break;
                }
            }
        }
    })
}
