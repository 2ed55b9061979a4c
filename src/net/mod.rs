//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, optional connection limit)
//!     → connection.rs (ID, lifecycle tracking, state machine)
//!     → Hand off to the HTTP worker
//!
//! Connection States:
//!     Accepted → HeaderRead → CacheHit | CacheMiss → Forwarding → Responded → Closed
//! ```
//!
//! # Design Decisions
//! - Unbounded admission by default; a semaphore bounds it when configured
//! - Each connection tracked so shutdown can wait for in-flight workers

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
