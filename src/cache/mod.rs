//! Object cache subsystem.
//!
//! # Data Flow
//! ```text
//! worker (request URI)
//!     → store.rs lookup (per-slot read locks, linear scan)
//!         hit  → cached bytes written straight to the client
//!         miss → forwarder streams from origin
//!     → store.rs insert (writer lock, one slot write-locked at a time)
//!         vacant slot → fill
//!         key present → overwrite in place
//!         full        → evict least-recent slot
//! ```
//!
//! # Design Decisions
//! - Fixed slot array sized `max_cache_size / max_object_size`
//! - Readers-writers lock per slot; lookups never contend with each other
//! - Inserts are serialized among themselves so a key is never stored twice
//! - Recency is a logical clock, refreshed on insert (and on hit if enabled)

mod slot;
mod stats;
mod store;


pub use slot::CachedObject;
pub use stats::CacheStats;
pub use store::{InsertOutcome, ObjectCache};
