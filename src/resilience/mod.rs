//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Socket operation (client read, origin connect/read, any write):
//!     → timeouts.rs (optional deadline from config)
//!     → on expiry: TimedOut for this connection only
//! ```
//!
//! # Design Decisions
//! - No deadline unless configured; a stalled peer blocks only its own worker
//! - No retries: a GET is forwarded exactly once

pub mod timeouts;

pub use timeouts::{deadline, TimedOut};
