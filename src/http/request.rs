//! Inbound request parsing.
//!
//! # Responsibilities
//! - Read the request line and header block, bounded by configured limits
//! - Accept only `GET` with an absolute-URI target
//! - Produce the per-connection `InFlightRequest`
//!
//! # Design Decisions
//! - Lines end at `\n`; a trailing `\r` is stripped
//! - Header lines without a colon are skipped, not fatal
//! - Other header lines must pass `httparse`; anything it rejects is a 400
//! - The request body (if any) is never read

use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::config::LimitsConfig;
use crate::http::error::HttpError;
use crate::http::uri::{parse_absolute_uri, AbsoluteUri};
use crate::resilience::deadline;

/// A header name/value pair in arrival order.
pub type Header = (String, String);

/// The three tokens of a request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// A parsed client request, owned by its worker for the connection's lifetime.
#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub method: String,
    /// Exact request-target string; also the cache key.
    pub target: String,
    pub version: String,
    pub headers: Vec<Header>,
    pub uri: AbsoluteUri,
}

/// Split a request line on whitespace. Tokens past the third are ignored.
pub fn parse_request_line(line: &[u8]) -> Result<RequestLine, HttpError> {
    let malformed = || HttpError::MalformedRequestLine(String::from_utf8_lossy(line).trim_end().to_string());

    let text = std::str::from_utf8(line).map_err(|_| malformed())?;
    let mut tokens = text.split_ascii_whitespace();
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(method), Some(target), Some(version)) => Ok(RequestLine {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
        }),
        _ => Err(malformed()),
    }
}

/// Read one line including its terminator into `buf`.
/// Returns the number of bytes read; 0 means the peer closed.
async fn read_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limits: &LimitsConfig,
    timeout: Option<Duration>,
) -> Result<usize, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = limits.max_line_length;
    let mut bounded = (&mut *reader).take(limit as u64);
    let n = deadline("client read", timeout, bounded.read_until(b'\n', buf)).await??;

    if n == limit && buf.last() != Some(&b'\n') {
        return Err(HttpError::LineTooLong { limit });
    }
    Ok(n)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Read header lines up to and including the blank line that ends them.
pub async fn read_headers<R>(
    reader: &mut R,
    limits: &LimitsConfig,
    timeout: Option<Duration>,
) -> Result<Vec<Header>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();
    let mut buf = Vec::with_capacity(256);

    loop {
        let n = read_line(reader, &mut buf, limits, timeout).await?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Err(HttpError::TruncatedHeaders);
        }

        let line = trim_line_ending(&buf);
        if line.is_empty() {
            return Ok(headers);
        }

        tracing::debug!(header = %String::from_utf8_lossy(line), "Request header");
        if !line.contains(&b':') {
            tracing::debug!("Skipping header line without colon");
            continue;
        }
        if headers.len() == limits.max_headers {
            return Err(HttpError::TooManyHeaders {
                limit: limits.max_headers,
            });
        }
        headers.push(parse_header_line(line)?);
    }
}

/// Validate one header line with `httparse`: token name, no control bytes
/// (bare CR included) in the value, UTF-8 throughout.
fn parse_header_line(line: &[u8]) -> Result<Header, HttpError> {
    let invalid = || HttpError::InvalidHeader(String::from_utf8_lossy(line).into_owned());

    let mut block = Vec::with_capacity(line.len() + 4);
    block.extend_from_slice(line);
    block.extend_from_slice(b"\r\n\r\n");

    let mut parsed = [httparse::EMPTY_HEADER; 1];
    match httparse::parse_headers(&block, &mut parsed) {
        Ok(httparse::Status::Complete((_, [header]))) => {
            let value = std::str::from_utf8(header.value).map_err(|_| invalid())?;
            Ok((header.name.to_string(), value.trim().to_string()))
        }
        _ => Err(invalid()),
    }
}

/// Read and validate one proxy request.
///
/// Returns `Ok(None)` if the client closed without sending anything.
pub async fn read_request<R>(
    reader: &mut R,
    limits: &LimitsConfig,
    timeout: Option<Duration>,
) -> Result<Option<InFlightRequest>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(256);
    if read_line(reader, &mut buf, limits, timeout).await? == 0 {
        return Ok(None);
    }

    let RequestLine {
        method,
        target,
        version,
    } = parse_request_line(trim_line_ending(&buf))?;
    tracing::debug!(method = %method, target = %target, version = %version, "Request line");

    if !method.eq_ignore_ascii_case("GET") {
        return Err(HttpError::UnsupportedMethod(method));
    }

    let headers = read_headers(reader, limits, timeout).await?;
    let uri = parse_absolute_uri(&target)?;

    Ok(Some(InFlightRequest {
        method,
        target,
        version,
        headers,
        uri,
    }))
}
