//! Enrichment Cache (spec.md §4.3).
//!
//! Bounded LRU keyed by client IP. Freshness is a property the middleware
//! evaluates against the stored record's `last_updated`, not something the
//! cache computes itself — `get` always returns whatever is stored, stale
//! or not. Spec.md §8 requires "LRU eviction order is strict recency",
//! which the teacher's `DashMap` + access-count scoring in the CDN cache
//! does not guarantee, so this wraps `lru::LruCache` directly instead.

use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;

use crate::enrichment::EnrichmentRecord;

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct EnrichmentCache {
    inner: Mutex<LruCache<IpAddr, EnrichmentRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EnrichmentCache {
    pub fn new(size: usize) -> Self {
        let capacity = NonZeroUsize::new(size).unwrap_or_else(|| NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the stored record for `ip`, if any, and marks it as the most
    /// recently used entry. Never returns a partially-written record:
    /// writes happen under the same lock, so a concurrent `put` either
    /// finishes before or after a `get`, never interleaved.
    pub fn get(&self, ip: &IpAddr) -> Option<EnrichmentRecord> {
        let mut inner = self.inner.lock().expect("enrichment cache lock poisoned");
        let found = inner.get(ip).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Inserts or overwrites the record for `ip`. Last-write-wins under
    /// concurrent misses for the same IP, matching the reference (spec.md
    /// §5, §9): no single-flight coordination is implemented.
    pub fn put(&self, ip: IpAddr, record: EnrichmentRecord) {
        let mut inner = self.inner.lock().expect("enrichment cache lock poisoned");
        inner.put(ip, record);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .inner
            .lock()
            .expect("enrichment cache lock poisoned")
            .len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Evaluates freshness per spec.md §4.3: a TTL of `0` means the entry is
/// never considered stale; otherwise it is fresh while `now < last_updated
/// + ttl`.
pub fn is_fresh(last_updated: i64, now: i64, ttl_secs: u64) -> bool {
    if ttl_secs == 0 {
        return true;
    }
    now < last_updated + ttl_secs as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{EnrichmentPayload, UpstreamStatus};

    fn record(status_code: u16, last_updated: i64) -> EnrichmentRecord {
        EnrichmentRecord {
            status_code,
            payload: Some(EnrichmentPayload {
                continent: None,
                country: None,
                asn: None,
                rdns_hostname: None,
                is_hosting: false,
                is_proxy: false,
                upstream_status: UpstreamStatus::Success,
            }),
            last_updated,
        }
    }

    #[test]
    fn get_put_round_trip() {
        let cache = EnrichmentCache::new(2);
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        assert!(cache.get(&ip).is_none());
        cache.put(ip, record(200, 0));
        let stored = cache.get(&ip).unwrap();
        assert_eq!(stored.status_code, 200);
    }

    #[test]
    fn evicts_least_recently_used_entry() {
        let cache = EnrichmentCache::new(2);
        let a: IpAddr = "1.1.1.1".parse().unwrap();
        let b: IpAddr = "2.2.2.2".parse().unwrap();
        let c: IpAddr = "3.3.3.3".parse().unwrap();

        cache.put(a, record(200, 0));
        cache.put(b, record(200, 0));
        // touch `a` so `b` becomes least recently used
        cache.get(&a);
        cache.put(c, record(200, 0));

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn zero_ttl_never_stale() {
        assert!(is_fresh(0, 1_000_000, 0));
    }

    #[test]
    fn ttl_boundary() {
        assert!(is_fresh(0, 99, 100));
        assert!(!is_fresh(0, 100, 100));
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = EnrichmentCache::new(4);
        let ip: IpAddr = "9.9.9.9".parse().unwrap();
        cache.get(&ip);
        cache.put(ip, record(200, 0));
        cache.get(&ip);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
