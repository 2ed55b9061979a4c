//! Origin-facing subsystem.
//!
//! # Data Flow
//! ```text
//! InFlightRequest (cache miss)
//!     → forwarder.rs connect to host:port
//!     → http::outbound rewrites the request (HTTP/1.0, fixed headers)
//!     → stream origin bytes to the client chunk by chunk
//!     → bytes also buffered while total ≤ max_object_size
//!     → clean close: buffered body handed back for caching
//! ```
//!
//! # Design Decisions
//! - The client sees origin bytes as soon as they arrive
//! - Oversized responses are not errors; they just skip the cache
//! - Any I/O failure stops caching for that response

pub mod forwarder;

pub use forwarder::{ForwardError, Forwarded, Forwarder};
