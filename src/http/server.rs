//! Connection dispatcher and per-connection worker.
//!
//! # Responsibilities
//! - Accept connections until shutdown
//! - Spawn one task per connection; a failing or panicking task never
//!   reaches the accept loop
//! - Parse exactly one request, answer it from the cache or the origin,
//!   then close

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::cache::ObjectCache;
use crate::config::ProxyConfig;
use crate::http::error::ProxyError;
use crate::http::request::read_request;
use crate::http::response::error_response;
use crate::net::{ConnectionGuard, ConnectionState, ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::resilience::deadline;
use crate::upstream::Forwarder;

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// State shared by every worker.
#[derive(Debug)]
pub struct ProxyState {
    pub config: ProxyConfig,
    pub cache: Arc<ObjectCache>,
    pub forwarder: Forwarder,
    pub connections: ConnectionTracker,
}

/// How a worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Client closed without sending a request.
    Empty,
    CacheHit { bytes: u64 },
    Forwarded { bytes: u64, cached: bool },
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Empty => "empty",
            Outcome::CacheHit { .. } => "hit",
            Outcome::Forwarded { .. } => "miss",
        }
    }
}

/// The caching proxy server.
pub struct ProxyServer {
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a server with a fresh cache sized from `config`.
    pub fn new(config: ProxyConfig) -> Self {
        let cache = Arc::new(ObjectCache::new(&config.cache));
        Self::with_cache(config, cache)
    }

    /// Create a server around an existing cache. Responses are buffered
    /// for caching only up to that cache's object size.
    pub fn with_cache(config: ProxyConfig, cache: Arc<ObjectCache>) -> Self {
        let state = ProxyState {
            forwarder: Forwarder::new(&config).with_max_object_size(cache.max_object_size()),
            config,
            cache,
            connections: ConnectionTracker::new(),
        };
        Self {
            state: Arc::new(state),
        }
    }

    pub fn cache(&self) -> Arc<ObjectCache> {
        Arc::clone(&self.state.cache)
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.state.connections.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }

    /// Accept connections until `shutdown` fires. In-flight workers keep running.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            slots = self.state.cache.capacity(),
            max_object_size = self.state.cache.max_object_size(),
            "Caching proxy accepting connections"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let state = Arc::clone(&self.state);
                        let guard = state.connections.track();
                        metrics::set_active_connections(state.connections.active_count());
                        tokio::spawn(async move {
                            let _permit = permit;
                            handle_connection(state, stream, peer, guard).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }
        }

        tracing::info!(
            active_connections = self.state.connections.active_count(),
            "Proxy stopped accepting"
        );
        Ok(())
    }
}

async fn handle_connection(
    state: Arc<ProxyState>,
    mut stream: TcpStream,
    peer: SocketAddr,
    mut conn: ConnectionGuard,
) {
    let span = tracing::debug_span!("connection", connection_id = %conn.id(), peer = %peer);

    async {
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);

        match serve(&state, &mut conn, &mut reader, &mut write_half).await {
            Ok(outcome) => {
                tracing::debug!(outcome = outcome.label(), "Request complete");
                metrics::record_request(outcome.label());
            }
            Err(e) => {
                conn.advance(ConnectionState::Failed);
                tracing::warn!(error = %e, kind = e.kind(), "Request failed");
                metrics::record_request(e.kind());
                if let Some(status) = e.status() {
                    let reply = error_response(status);
                    let write = write_half.write_all(&reply);
                    if let Ok(Ok(())) = deadline("client write", state.config.timeouts.write(), write).await {
                        metrics::record_response_bytes(reply.len() as u64);
                    }
                }
            }
        }

        let _ = write_half.shutdown().await;
        conn.advance(ConnectionState::Closed);
    }
    .instrument(span)
    .await;

    drop(conn);
    metrics::set_active_connections(state.connections.active_count());
}

/// Resolve one request: cache hit, or miss-and-forward.
async fn serve<R, W>(
    state: &ProxyState,
    conn: &mut ConnectionGuard,
    reader: &mut R,
    client: &mut W,
) -> Result<Outcome, ProxyError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let config = &state.config;
    let request = match read_request(reader, &config.limits, config.timeouts.read()).await? {
        Some(request) => request,
        None => return Ok(Outcome::Empty),
    };
    conn.advance(ConnectionState::HeaderRead);

    if let Some(body) = state.cache.lookup(&request.target) {
        conn.advance(ConnectionState::CacheHit);
        tracing::debug!(uri = %request.target, bytes = body.len(), "Cache hit");

        deadline("client write", config.timeouts.write(), client.write_all(&body))
            .await?
            .map_err(ProxyError::ClientWrite)?;
        deadline("client write", config.timeouts.write(), client.flush())
            .await?
            .map_err(ProxyError::ClientWrite)?;

        metrics::record_response_bytes(body.len() as u64);
        conn.advance(ConnectionState::Responded);
        return Ok(Outcome::CacheHit {
            bytes: body.len() as u64,
        });
    }

    conn.advance(ConnectionState::CacheMiss);
    tracing::debug!(uri = %request.target, "Cache miss");

    conn.advance(ConnectionState::Forwarding);
    let forwarded = state.forwarder.forward(&request, client).await?;
    metrics::record_response_bytes(forwarded.bytes);

    let cached = match forwarded.cacheable {
        Some(body) => {
            let outcome = state.cache.insert(request.target.clone(), body);
            tracing::debug!(uri = %request.target, slot = outcome.slot(), "Cached response");
            true
        }
        None => false,
    };

    conn.advance(ConnectionState::Responded);
    Ok(Outcome::Forwarded {
        bytes: forwarded.bytes,
        cached,
    })
}
