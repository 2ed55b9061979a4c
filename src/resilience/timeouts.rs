//! Timeout enforcement.
//!
//! Wraps socket futures with Tokio's timer when a limit is configured.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A socket operation ran past its configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation} timed out after {after:?}")]
pub struct TimedOut {
    pub operation: &'static str,
    pub after: Duration,
}

/// Await `fut`, failing with [`TimedOut`] if `limit` is set and passes first.
pub async fn deadline<F>(
    operation: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| TimedOut { operation, after }),
        None => Ok(fut.await),
    }
}
