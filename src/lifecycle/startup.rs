//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind listeners and begin accepting traffic
//! - Drain in-flight workers once shutdown is signalled

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{serve_admin, AdminState};
use crate::cache::ObjectCache;
use crate::config::ProxyConfig;
use crate::http::ProxyServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// How long workers get to finish after the listener stops.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind proxy listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("invalid {field} address {value:?}")]
    Address { field: &'static str, value: String },

    #[error("failed to bind admin API on {addr}: {source}")]
    Admin {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("proxy server failed: {0}")]
    Server(#[source] std::io::Error),
}

/// Run the proxy until Ctrl+C or SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    run_until(config, signals::wait_for_signal()).await
}

/// Run the proxy until `signal` resolves.
pub async fn run_until<F>(config: ProxyConfig, signal: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address {
                field: "observability.metrics_address",
                value: config.observability.metrics_address.clone(),
            })?;
        metrics::init_metrics(addr);
    }

    let cache = Arc::new(ObjectCache::new(&config.cache));
    tracing::info!(
        slots = cache.capacity(),
        max_object_size = cache.max_object_size(),
        refresh_on_hit = config.cache.refresh_on_hit,
        "Cache initialized"
    );

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server = ProxyServer::with_cache(config.clone(), Arc::clone(&cache));
    let connections = server.connections();

    if config.admin.enabled {
        let addr = config.admin.bind_address.clone();
        let admin_listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| StartupError::Admin { addr, source })?;
        let state = AdminState {
            cache: Arc::clone(&cache),
            connections: connections.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(admin_listener, state, rx).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let rx = shutdown.subscribe();
    let _signal_task = shutdown.trigger_on(signal);
    server
        .run(listener, rx)
        .await
        .map_err(StartupError::Server)?;

    if connections.wait_for_idle(DRAIN_TIMEOUT).await {
        tracing::info!("All connections drained");
    } else {
        tracing::warn!(
            active_connections = connections.active_count(),
            "Drain deadline passed, abandoning workers"
        );
    }

    let stats = cache.stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        occupied = stats.occupied,
        "Shutdown complete"
    );
    Ok(())
}
