//! Error types for a single proxied connection.
//!
//! None of these ever reach the accept loop: a worker logs its error,
//! optionally answers with a status line, and closes.

use axum::http::StatusCode;
use thiserror::Error;

use crate::resilience::TimedOut;
use crate::upstream::ForwardError;

/// Failures reading or parsing the client's request.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("connection closed before end of headers")]
    TruncatedHeaders,

    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),

    #[error("invalid URI ({0})")]
    InvalidUri(String),

    #[error("method {0} not implemented")]
    UnsupportedMethod(String),

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("more than {limit} header lines")]
    TooManyHeaders { limit: usize },

    #[error(transparent)]
    Timeout(#[from] TimedOut),

    #[error("client read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    /// Status to answer with; `None` when the client is unreachable anyway.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::MalformedRequestLine(_)
            | HttpError::TruncatedHeaders
            | HttpError::InvalidHeader(_)
            | HttpError::InvalidUri(_)
            | HttpError::LineTooLong { .. }
            | HttpError::TooManyHeaders { .. } => Some(StatusCode::BAD_REQUEST),
            HttpError::UnsupportedMethod(_) => Some(StatusCode::NOT_IMPLEMENTED),
            HttpError::Timeout(_) => Some(StatusCode::REQUEST_TIMEOUT),
            HttpError::Io(_) => None,
        }
    }
}

/// Anything that ends a worker early.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Request(#[from] HttpError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    /// Writing a cached response back to the client failed.
    #[error("client write failed: {0}")]
    ClientWrite(#[source] std::io::Error),

    #[error(transparent)]
    Timeout(#[from] TimedOut),
}

impl ProxyError {
    /// Status line to send, only when the client has not received any bytes yet.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProxyError::Request(e) => e.status(),
            ProxyError::Forward(e) => e.status(),
            ProxyError::ClientWrite(_) | ProxyError::Timeout(_) => None,
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Request(HttpError::UnsupportedMethod(_)) => "unsupported_method",
            ProxyError::Request(HttpError::Timeout(_)) => "client_timeout",
            ProxyError::Request(HttpError::Io(_)) => "client_io",
            ProxyError::Request(_) => "bad_request",
            ProxyError::Forward(e) => e.kind(),
            ProxyError::ClientWrite(_) => "client_io",
            ProxyError::Timeout(_) => "client_timeout",
        }
    }
}
