//! Proxy-generated responses.
//!
//! Successful responses are relayed byte-for-byte and never built here.
//! This module only renders the short error replies a worker sends when a
//! request fails before any origin bytes reached the client.

use axum::http::StatusCode;

/// Render a minimal `HTTP/1.0` response for `status`.
pub fn error_response(status: StatusCode) -> Vec<u8> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = format!("{} {}\n", status.as_u16(), reason);
    format!(
        "HTTP/1.0 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status.as_u16(),
        reason,
        body.len(),
        body
    )
    .into_bytes()
}
