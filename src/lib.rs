//! Caching HTTP forward proxy library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::server (one task per connection)
//!                                      │
//!                                      ├── cache::ObjectCache ── hit ──▶ Client
//!                                      │
//!                                      └── upstream::Forwarder ── miss ──▶ Origin
//!                                               │
//!                                               └── streamed to Client, cached if small
//! ```

// Core subsystems
pub mod cache;
pub mod config;
pub mod http;
pub mod net;
pub mod upstream;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cache::ObjectCache;
pub use config::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
