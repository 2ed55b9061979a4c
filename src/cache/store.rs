//! Cache Store Module
//!
//! Fixed array of independently locked slots with least-recently-used
//! replacement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::cache::slot::{CachedObject, Slot};
use crate::cache::stats::{CacheStats, StatsCounters};
use crate::config::CacheConfig;
use crate::observability::metrics;

/// Where an insert landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Filled a previously empty slot.
    Vacant { slot: usize },
    /// The key was already cached; its slot was overwritten in place.
    Updated { slot: usize },
    /// Replaced the least-recently-used entry.
    Evicted { slot: usize, evicted_key: String },
}

impl InsertOutcome {
    pub fn slot(&self) -> usize {
        match self {
            InsertOutcome::Vacant { slot }
            | InsertOutcome::Updated { slot }
            | InsertOutcome::Evicted { slot, .. } => *slot,
        }
    }
}

/// Process-wide response cache shared by every worker.
///
/// Lookups take one slot read lock at a time, so they proceed in parallel
/// with each other and with an insert into any other slot. Inserts are
/// serialized through `writer` so that two workers missing on the same URI
/// cannot store it twice; an insert still holds at most one slot lock.
#[derive(Debug)]
pub struct ObjectCache {
    slots: Box<[Slot]>,
    /// Logical clock for recency stamps. Starts at 1 so 0 never marks a live entry.
    clock: AtomicU64,
    writer: Mutex<()>,
    max_object_size: usize,
    refresh_on_hit: bool,
    stats: StatsCounters,
}

impl ObjectCache {
    /// Build a cache sized from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_slots(config.slot_count(), config.max_object_size, config.refresh_on_hit)
    }

    /// Build a cache with an explicit slot count (at least one slot).
    pub fn with_slots(slots: usize, max_object_size: usize, refresh_on_hit: bool) -> Self {
        let slots = (0..slots.max(1)).map(|_| Slot::default()).collect();
        Self {
            slots,
            clock: AtomicU64::new(1),
            writer: Mutex::new(()),
            max_object_size,
            refresh_on_hit,
            stats: StatsCounters::default(),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Largest body `insert` accepts.
    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    /// Whether a body of `len` bytes fits in one slot.
    pub fn fits(&self, len: usize) -> bool {
        len <= self.max_object_size
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.read().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.capacity(), self.max_object_size)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Return the cached body for `key`, compared byte-exactly.
    pub fn lookup(&self, key: &str) -> Option<Arc<[u8]>> {
        for slot in self.slots.iter() {
            let guard = slot.read();
            if let Some(object) = guard.as_ref() {
                if object.key == key {
                    if self.refresh_on_hit {
                        slot.touch(self.tick());
                    }
                    self.stats.record_hit();
                    metrics::record_cache_hit();
                    return Some(Arc::clone(&object.body));
                }
            }
        }

        self.stats.record_miss();
        metrics::record_cache_miss();
        None
    }

    /// Store `body` under `key`.
    ///
    /// Callers must not offer bodies larger than `max_object_size`.
    /// Target slot: the slot already holding `key`, else the first empty
    /// slot, else the occupied slot with the oldest recency stamp (lowest
    /// index on ties).
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Arc<[u8]>>) -> InsertOutcome {
        let key = key.into();
        let body = body.into();
        debug_assert!(body.len() <= self.max_object_size, "oversized object offered to cache");

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut existing = None;
        let mut vacant = None;
        let mut oldest: Option<(usize, u64)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            let guard = slot.read();
            match guard.as_ref() {
                Some(object) if object.key == key => {
                    existing = Some(index);
                    break;
                }
                Some(_) => {
                    let recency = slot.recency();
                    if oldest.map_or(true, |(_, stamp)| recency < stamp) {
                        oldest = Some((index, recency));
                    }
                }
                None => {
                    if vacant.is_none() {
                        vacant = Some(index);
                    }
                }
            }
        }

        let index = existing
            .or(vacant)
            .or(oldest.map(|(index, _)| index))
            .unwrap_or(0);

        let slot = &self.slots[index];
        let previous = {
            let mut guard = slot.write();
            let previous = guard.replace(CachedObject {
                key: key.clone(),
                body,
            });
            slot.touch(self.tick());
            previous
        };

        self.stats.record_insert();
        metrics::record_cache_insert();

        match previous {
            None => {
                self.stats.record_fill();
                InsertOutcome::Vacant { slot: index }
            }
            Some(old) if old.key == key => InsertOutcome::Updated { slot: index },
            Some(old) => {
                self.stats.record_eviction();
                metrics::record_cache_eviction();
                tracing::debug!(evicted = %old.key, inserted = %key, slot = index, "Evicted cache entry");
                InsertOutcome::Evicted {
                    slot: index,
                    evicted_key: old.key,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn body(text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    #[test]
    fn test_lookup_empty() {
        let cache = ObjectCache::with_slots(4, 1024, false);
        assert!(cache.lookup("http://x.test/").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_insert_then_hit() {
        let cache = ObjectCache::with_slots(4, 1024, false);
        let outcome = cache.insert("http://x.test/page", body("hello"));

        assert_eq!(outcome, InsertOutcome::Vacant { slot: 0 });
        assert_eq!(&*cache.lookup("http://x.test/page").unwrap(), b"hello");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_byte_exact() {
        let cache = ObjectCache::with_slots(4, 1024, false);
        cache.insert("http://x.test/Page", body("a"));

        assert!(cache.lookup("http://x.test/page").is_none());
        assert!(cache.lookup("http://x.test/Page ").is_none());
        assert!(cache.lookup("http://X.test/Page").is_none());
        assert!(cache.lookup("http://x.test/Page").is_some());
    }

    #[test]
    fn test_fills_first_empty_slot() {
        let cache = ObjectCache::with_slots(3, 1024, false);
        assert_eq!(cache.insert("a", body("1")).slot(), 0);
        assert_eq!(cache.insert("b", body("2")).slot(), 1);
        assert_eq!(cache.insert("c", body("3")).slot(), 2);
    }

    #[test]
    fn test_same_key_overwrites_in_place() {
        let cache = ObjectCache::with_slots(3, 1024, false);
        cache.insert("a", body("old"));
        cache.insert("b", body("b"));

        let outcome = cache.insert("a", body("new"));
        assert_eq!(outcome, InsertOutcome::Updated { slot: 0 });
        assert_eq!(&*cache.lookup("a").unwrap(), b"new");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().occupied, 2);
    }

    #[test]
    fn test_evicts_least_recent_insert() {
        let cache = ObjectCache::with_slots(3, 1024, false);
        cache.insert("a", body("1"));
        cache.insert("b", body("2"));
        cache.insert("c", body("3"));

        let outcome = cache.insert("d", body("4"));
        assert_eq!(
            outcome,
            InsertOutcome::Evicted {
                slot: 0,
                evicted_key: "a".to_string()
            }
        );
        assert!(cache.lookup("a").is_none());

        // "b" is now the oldest
        let outcome = cache.insert("e", body("5"));
        assert_eq!(outcome.slot(), 1);
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_overwrite_refreshes_recency() {
        let cache = ObjectCache::with_slots(2, 1024, false);
        cache.insert("a", body("1"));
        cache.insert("b", body("2"));
        cache.insert("a", body("1b"));

        let outcome = cache.insert("c", body("3"));
        assert_eq!(
            outcome,
            InsertOutcome::Evicted {
                slot: 1,
                evicted_key: "b".to_string()
            }
        );
    }

    #[test]
    fn test_hit_does_not_refresh_by_default() {
        let cache = ObjectCache::with_slots(2, 1024, false);
        cache.insert("a", body("1"));
        cache.insert("b", body("2"));
        assert!(cache.lookup("a").is_some());

        let outcome = cache.insert("c", body("3"));
        assert_eq!(outcome.slot(), 0);
        assert!(cache.lookup("a").is_none());
    }

    #[test]
    fn test_hit_refreshes_when_enabled() {
        let cache = ObjectCache::with_slots(2, 1024, true);
        cache.insert("a", body("1"));
        cache.insert("b", body("2"));
        assert!(cache.lookup("a").is_some());

        let outcome = cache.insert("c", body("3"));
        assert_eq!(outcome.slot(), 1);
        assert!(cache.lookup("a").is_some());
        assert!(cache.lookup("b").is_none());
    }

    #[test]
    fn test_sized_from_config() {
        let cache = ObjectCache::new(&CacheConfig::default());
        assert_eq!(cache.capacity(), 1024);
        assert!(cache.fits(1024));
        assert!(!cache.fits(1025));
    }

    #[test]
    fn test_concurrent_lookups_match_serial() {
        let cache = ObjectCache::with_slots(16, 1024, false);
        for i in 0..16 {
            cache.insert(format!("http://x.test/{}", i), vec![i as u8; 100 + i]);
        }
        let serial: Vec<_> = (0..16)
            .map(|i| cache.lookup(&format!("http://x.test/{}", i)).unwrap())
            .collect();

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        for (i, expected) in serial.iter().enumerate() {
                            let got = cache.lookup(&format!("http://x.test/{}", i)).unwrap();
                            assert_eq!(&*got, &**expected);
                        }
                    }
                });
            }
        });
    }

    #[test]
    fn test_concurrent_inserts_of_same_key_never_duplicate() {
        let cache = ObjectCache::with_slots(8, 1024, false);
        thread::scope(|s| {
            for t in 0..8u8 {
                let cache = &cache;
                s.spawn(move || {
                    for _ in 0..50 {
                        cache.insert("http://x.test/same", vec![t; 10]);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 1);
        let got = cache.lookup("http://x.test/same").unwrap();
        assert_eq!(got.len(), 10);
        assert!(got.iter().all(|b| *b == got[0]));
    }

    #[test]
    fn test_readers_never_observe_torn_objects() {
        let cache = ObjectCache::with_slots(2, 1024, false);
        cache.insert("k", vec![0u8; 512]);

        thread::scope(|s| {
            s.spawn(|| {
                for round in 1..=200u8 {
                    cache.insert("k", vec![round; 512]);
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..500 {
                        let got = cache.lookup("k").unwrap();
                        assert_eq!(got.len(), 512);
                        assert!(got.iter().all(|b| *b == got[0]));
                    }
                });
            }
        });
    }
}
