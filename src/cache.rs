//! Process-wide lazily-populated cache slot.
//!
//! Holds a single shared value that is expensive (or at least repetitive) to
//! build, populating it once under a lock and serving plain reads afterwards.
//! Hit/miss counters are kept with atomics so the fast path never contends
//! with the statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// Snapshot of cache usage, exposed for diagnostics endpoints and tests.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
    /// Duration of the most recent build, if any
    pub last_build: Option<Duration>,
    pub is_cached: bool,
}

/// A lazily-initialized slot guarded by the double-checked locking pattern:
/// the write lock is only taken when the slot is empty, and once populated
/// every access goes through the shared read path.
pub struct SlotCache<T> {
    slot: RwLock<Option<Arc<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    // Nanoseconds of the last build; zero means "never built".
    last_build_nanos: AtomicU64,
}

impl<T> SlotCache<T> {
    pub const fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_build_nanos: AtomicU64::new(0),
        }
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Arc<T>>> {
        match self.slot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Arc<T>>> {
        match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Return the cached value, building and storing it on first access.
    pub fn get_or_init(&self, build: impl FnOnce() -> T) -> Arc<T> {
        if let Some(value) = self.read_slot().as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut guard = self.write_slot();
        if let Some(value) = guard.as_ref() {
            // Another thread populated the slot between our read and write.
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(value);
        }

        let started = Instant::now();
        let value = Arc::new(build());
        let elapsed = started.elapsed();
        self.last_build_nanos
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        info!(build_time = ?elapsed, "cache slot populated");

        *guard = Some(Arc::clone(&value));
        value
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        };
        let nanos = self.last_build_nanos.load(Ordering::Relaxed);

        CacheStats {
            hits,
            misses,
            total_requests: total,
            hit_rate_percent: hit_rate,
            last_build: (nanos > 0).then(|| Duration::from_nanos(nanos)),
            is_cached: self.read_slot().is_some(),
        }
    }

    /// Clear the slot and all counters, forcing the next access to rebuild.
    /// Intended for test isolation.
    pub fn reset(&self) {
        let mut guard = self.write_slot();
        *guard = None;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.last_build_nanos.store(0, Ordering::Relaxed);
        info!("cache slot reset");
    }
}

impl<T> Default for SlotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_access_is_a_miss_then_hits() {
        let cache: SlotCache<String> = SlotCache::new();
        let first = cache.get_or_init(|| "value".to_string());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert!(stats.is_cached);
        assert!(stats.last_build.is_some());

        let second = cache.get_or_init(|| unreachable!("must not rebuild"));
        assert!(Arc::ptr_eq(&first, &second));

        let third = cache.get_or_init(|| unreachable!("must not rebuild"));
        assert!(Arc::ptr_eq(&first, &third));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 3);
        assert!((stats.hit_rate_percent - 66.67).abs() < 0.01);
    }

    #[test]
    fn reset_clears_counters_and_forces_rebuild() {
        let cache: SlotCache<u32> = SlotCache::new();
        let _ = cache.get_or_init(|| 7);
        let _ = cache.get_or_init(|| unreachable!());

        cache.reset();
        let stats = cache.stats();
        assert_eq!(stats, CacheStats {
            hits: 0,
            misses: 0,
            total_requests: 0,
            hit_rate_percent: 0.0,
            last_build: None,
            is_cached: false,
        });

        // Next access rebuilds and counts as a miss again.
        let rebuilt = cache.get_or_init(|| 9);
        assert_eq!(*rebuilt, 9);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        use std::sync::atomic::AtomicUsize;

        static BUILDS: AtomicUsize = AtomicUsize::new(0);
        let cache: Arc<SlotCache<u32>> = Arc::new(SlotCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.get_or_init(|| {
                        BUILDS.fetch_add(1, Ordering::SeqCst);
                        42
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(*handle.join().expect("thread panicked"), 42);
        }
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().total_requests, 8);
    }
}
