// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory TTL-bounded LRU cache backing [`LookupCache`].

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::traits::LookupCache;

/// LRU cache with per-entry expiry.
///
/// Entries past their deadline are treated as misses and evicted on access.
/// Capacity-bounded, so hot lookups stay cheap without the cache growing
/// with the conversation table.
pub struct TtlCache {
    inner: Mutex<LruCache<String, (Instant, String)>>,
    max_ttl: Option<Duration>,
}

impl TtlCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            max_ttl: None,
        }
    }

    /// Cache that clamps every entry's lifetime to `max_ttl`, letting an
    /// operator-configured ceiling override longer caller-supplied TTLs.
    pub fn with_max_ttl(capacity: NonZeroUsize, max_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            max_ttl: Some(max_ttl),
        }
    }
}

impl LookupCache for TtlCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match guard.get(key) {
            Some((deadline, value)) if *deadline > Instant::now() => Some(value.clone()),
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        let ttl = self.max_ttl.map_or(ttl, |cap| ttl.min(cap));
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.put(key.to_string(), (Instant::now() + ttl, value));
    }

    fn invalidate(&self, key: &str) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.pop(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(cap: usize) -> TtlCache {
        TtlCache::new(NonZeroUsize::new(cap).unwrap())
    }

    #[test]
    fn get_returns_live_entry() {
        let c = cache(4);
        c.put("k", "v".into(), Duration::from_secs(60));
        assert_eq!(c.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let c = cache(4);
        c.put("k", "v".into(), Duration::ZERO);
        assert_eq!(c.get("k"), None);
        // Evicted on the miss, not just hidden.
        assert_eq!(c.inner.lock().unwrap().len(), 0);
    }

    #[test]
    fn invalidate_removes_entry() {
        let c = cache(4);
        c.put("k", "v".into(), Duration::from_secs(60));
        c.invalidate("k");
        assert_eq!(c.get("k"), None);
    }

    #[test]
    fn max_ttl_clamps_caller_ttl() {
        let c = TtlCache::with_max_ttl(NonZeroUsize::new(4).unwrap(), Duration::ZERO);
        c.put("k", "v".into(), Duration::from_secs(3600));
        assert_eq!(c.get("k"), None);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let c = cache(2);
        c.put("a", "1".into(), Duration::from_secs(60));
        c.put("b", "2".into(), Duration::from_secs(60));
        c.put("c", "3".into(), Duration::from_secs(60));
        assert_eq!(c.get("a"), None);
        assert_eq!(c.get("c").as_deref(), Some("3"));
    }
}
