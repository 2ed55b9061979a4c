//! Origin forwarding.
//!
//! # Responsibilities
//! - Open a connection to the origin named by the request URI
//! - Send the rewritten request
//! - Relay the response to the client while it streams in
//! - Keep a copy of small responses for the cache

use axum::http::StatusCode;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::http::outbound::build_forward_request;
use crate::http::request::{Header, InFlightRequest};
use crate::observability::metrics;
use crate::resilience::{deadline, TimedOut};

/// Read buffer size for origin responses.
const CHUNK_SIZE: usize = 8 * 1024;

/// Failures during the upstream round-trip.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("origin {addr} unreachable: {source}")]
    UpstreamUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send request to origin: {0}")]
    RequestWrite(#[source] io::Error),

    #[error("origin read failed after {streamed} bytes: {source}")]
    UpstreamRead {
        streamed: u64,
        #[source]
        source: io::Error,
    },

    #[error("client write failed after {streamed} bytes: {source}")]
    ClientWrite {
        streamed: u64,
        #[source]
        source: io::Error,
    },

    #[error("{source} ({streamed} bytes relayed)")]
    Timeout {
        streamed: u64,
        #[source]
        source: TimedOut,
    },
}

impl ForwardError {
    /// Bytes already relayed to the client when the failure happened.
    pub fn streamed(&self) -> u64 {
        match self {
            ForwardError::UpstreamUnreachable { .. } | ForwardError::RequestWrite(_) => 0,
            ForwardError::UpstreamRead { streamed, .. }
            | ForwardError::ClientWrite { streamed, .. }
            | ForwardError::Timeout { streamed, .. } => *streamed,
        }
    }

    /// Status for the client, if it has seen nothing yet and can still be told.
    pub fn status(&self) -> Option<StatusCode> {
        if self.streamed() > 0 {
            return None;
        }
        match self {
            ForwardError::ClientWrite { .. } => None,
            ForwardError::Timeout { source, .. } if source.operation == "client write" => None,
            ForwardError::Timeout { .. } => Some(StatusCode::GATEWAY_TIMEOUT),
            _ => Some(StatusCode::BAD_GATEWAY),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::UpstreamUnreachable { .. } => "upstream_unreachable",
            ForwardError::RequestWrite(_) | ForwardError::UpstreamRead { .. } => "upstream_io",
            ForwardError::ClientWrite { .. } => "client_io",
            ForwardError::Timeout { .. } => "timeout",
        }
    }
}

/// Result of a completed round-trip.
#[derive(Debug)]
pub struct Forwarded {
    /// Total response bytes relayed to the client.
    pub bytes: u64,
    /// The full response, if it was non-empty and small enough to cache.
    pub cacheable: Option<Vec<u8>>,
}

/// Performs the upstream half of a cache miss.
#[derive(Debug, Clone)]
pub struct Forwarder {
    user_agent: String,
    forward_client_headers: bool,
    max_object_size: usize,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Forwarder {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            user_agent: config.upstream.user_agent.clone(),
            forward_client_headers: config.upstream.forward_client_headers,
            max_object_size: config.cache.max_object_size,
            connect_timeout: config.timeouts.connect(),
            read_timeout: config.timeouts.read(),
            write_timeout: config.timeouts.write(),
        }
    }

    /// Cap the buffered copy at `max_object_size` instead of the configured value.
    pub fn with_max_object_size(mut self, max_object_size: usize) -> Self {
        self.max_object_size = max_object_size;
        self
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Fetch `request` from its origin, streaming the response into `client`.
    pub async fn forward<W>(
        &self,
        request: &InFlightRequest,
        client: &mut W,
    ) -> Result<Forwarded, ForwardError>
    where
        W: AsyncWrite + Unpin,
    {
        let uri = &request.uri;
        let addr = format!("{}:{}", uri.host, uri.port);

        let connect = TcpStream::connect((uri.host.as_str(), uri.port));
        let mut origin = match deadline("origin connect", self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                metrics::record_upstream_error();
                return Err(ForwardError::UpstreamUnreachable { addr, source });
            }
            Err(source) => {
                metrics::record_upstream_error();
                return Err(ForwardError::Timeout { streamed: 0, source });
            }
        };

        let extra: &[Header] = if self.forward_client_headers {
            &request.headers
        } else {
            &[]
        };
        // Only GET reaches here; the client's spelling of it is not forwarded.
        let outbound = build_forward_request("GET", &uri.path, &uri.authority(), &self.user_agent, extra);
        tracing::debug!(
            origin = %addr,
            request = %String::from_utf8_lossy(&outbound),
            "Forwarding request"
        );

        match deadline("origin write", self.write_timeout, origin.write_all(&outbound)).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                metrics::record_upstream_error();
                return Err(ForwardError::RequestWrite(source));
            }
            Err(source) => {
                metrics::record_upstream_error();
                return Err(ForwardError::Timeout { streamed: 0, source });
            }
        }

        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut streamed: u64 = 0;
        let mut cache_buf = Some(Vec::with_capacity(self.max_object_size.min(CHUNK_SIZE)));

        loop {
            let n = match deadline("origin read", self.read_timeout, origin.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(source)) => {
                    metrics::record_upstream_error();
                    return Err(ForwardError::UpstreamRead { streamed, source });
                }
                Err(source) => {
                    metrics::record_upstream_error();
                    return Err(ForwardError::Timeout { streamed, source });
                }
            };

            let data = &chunk[..n];
            match deadline("client write", self.write_timeout, client.write_all(data)).await {
                Ok(Ok(())) => {}
                Ok(Err(source)) => return Err(ForwardError::ClientWrite { streamed, source }),
                Err(source) => return Err(ForwardError::Timeout { streamed, source }),
            }
            streamed += n as u64;

            if cache_buf.is_some() && streamed > self.max_object_size as u64 {
                tracing::debug!(
                    origin = %addr,
                    limit = self.max_object_size,
                    "Response exceeds object size, not caching"
                );
                cache_buf = None;
            }
            if let Some(buf) = cache_buf.as_mut() {
                buf.extend_from_slice(data);
            }
        }

        match deadline("client write", self.write_timeout, client.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(ForwardError::ClientWrite { streamed, source }),
            Err(source) => return Err(ForwardError::Timeout { streamed, source }),
        }

        Ok(Forwarded {
            bytes: streamed,
            cacheable: cache_buf.filter(|buf| !buf.is_empty()),
        })
    }
}
