//! Rate sheet caching with TTL support.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use cnbfx_common::{Clock, RateSheet, SystemClock, Timestamp};
use parking_lot::RwLock;
use tracing::debug;

/// Cached sheet entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    sheet: Arc<RateSheet>,
    cached_at: Timestamp,
}

/// Configuration for the sheet cache.
#[derive(Debug, Clone)]
pub struct SheetCacheConfig {
    /// How long a fetched sheet is served before refetching.
    pub ttl: Duration,
}

impl Default for SheetCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
        }
    }
}

/// Holds the most recent sheet until it goes stale.
///
/// A refresh swaps in a new `Arc<RateSheet>`; readers holding the old one
/// keep a consistent snapshot.
pub struct SheetCache {
    entry: RwLock<Option<CacheEntry>>,
    config: SheetCacheConfig,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SheetCache {
    /// Create a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(SheetCacheConfig::default())
    }

    pub fn with_config(config: SheetCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: SheetCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: RwLock::new(None),
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get the cached sheet if still fresh.
    pub fn get(&self) -> Option<Arc<RateSheet>> {
        let fresh = self
            .entry
            .read()
            .as_ref()
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.sheet.clone());

        match &fresh {
            Some(sheet) => {
                debug!(as_of_date = %sheet.as_of_date(), "Cache hit");
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                debug!("Cache miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        fresh
    }

    /// Replace the cached sheet.
    pub fn insert(&self, sheet: Arc<RateSheet>) {
        *self.entry.write() = Some(CacheEntry {
            sheet,
            cached_at: self.clock.now(),
        });
    }

    /// Drop the cached sheet.
    pub fn clear(&self) {
        *self.entry.write() = None;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entry = self.entry.read();
        CacheStats {
            has_entry: entry.is_some(),
            fresh: entry.as_ref().is_some_and(|e| self.is_fresh(e)),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now().signed_duration_since(entry.cached_at) < self.config.ttl
    }
}

impl Default for SheetCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub has_entry: bool,
    pub fresh: bool,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    /// Clock whose time tests can move.
    struct ManualClock(RwLock<Timestamp>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.write();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            *self.0.read()
        }
    }

    fn setup() -> (SheetCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(RwLock::new(
            Utc.with_ymd_and_hms(2024, 9, 27, 14, 35, 0).unwrap(),
        )));
        let cache = SheetCache::with_clock(SheetCacheConfig::default(), clock.clone());
        (cache, clock)
    }

    fn sheet() -> Arc<RateSheet> {
        Arc::new(RateSheet::new(
            NaiveDate::from_ymd_opt(2024, 9, 27).unwrap(),
            Vec::new(),
            Utc.with_ymd_and_hms(2024, 9, 27, 14, 35, 0).unwrap(),
        ))
    }

    #[test]
    fn test_cache_insert_and_get() {
        let (cache, _) = setup();
        let sheet = sheet();

        cache.insert(sheet.clone());

        let cached = cache.get().unwrap();
        assert!(Arc::ptr_eq(&cached, &sheet));
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _) = setup();
        assert!(cache.get().is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_cache_expiry() {
        let (cache, clock) = setup();
        cache.insert(sheet());

        clock.advance(Duration::minutes(4));
        assert!(cache.get().is_some());

        clock.advance(Duration::minutes(1));
        assert!(cache.get().is_none());

        let stats = cache.stats();
        assert_eq!(
            stats,
            CacheStats {
                has_entry: true,
                fresh: false,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_cache_clear() {
        let (cache, _) = setup();
        cache.insert(sheet());
        assert!(cache.stats().has_entry);

        cache.clear();

        assert!(!cache.stats().has_entry);
        assert!(cache.get().is_none());
    }
}
