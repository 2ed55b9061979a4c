//! A single fixed-capacity cache slot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One cached response, keyed by the exact request-target URI.
#[derive(Debug, Clone)]
pub struct CachedObject {
    pub key: String,
    pub body: Arc<[u8]>,
}

/// A lockable storage unit. Empty slots hold `None`.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    object: RwLock<Option<CachedObject>>,
    /// Logical timestamp of the last touch. Only meaningful while occupied.
    recency: AtomicU64,
}

impl Slot {
    /// Shared access. A panic while holding the lock cannot leave a
    /// half-written object behind (writes are a single `Option` swap), so
    /// poisoning is ignored.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Option<CachedObject>> {
        self.object.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Option<CachedObject>> {
        self.object.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn recency(&self) -> u64 {
        self.recency.load(Ordering::Acquire)
    }

    pub(crate) fn touch(&self, stamp: u64) {
        self.recency.store(stamp, Ordering::Release);
    }
}
