//! TTL cache of successful upstream responses.
//!
//! Backed by an unbounded `moka::sync::Cache` used purely as a concurrent
//! map. Expiry is not delegated to moka: every [`CacheEntry`] carries its
//! own `expires_at`, and freshness is decided against the tokio clock at
//! lookup time. Nothing sweeps expired entries; a stale entry lives on until
//! the next successful refresh of its key overwrites it.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::time::Instant;

use super::Payload;

/// One cached upstream response. Immutable once stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    payload: Payload,
    expires_at: Instant,
}

impl CacheEntry {
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Whether the entry is still fresh at `now`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent key → [`CacheEntry`] map with lookup-time expiry.
///
/// Replacing a key swaps in a new `Arc<CacheEntry>`, so readers see either
/// the old entry or the new one, never a partially written value.
#[derive(Clone)]
pub struct TtlCache {
    entries: Cache<String, Arc<CacheEntry>>,
}

impl TtlCache {
    /// Create an empty, unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    /// Look up a fresh entry for `key`.
    ///
    /// Returns `None` when the key was never stored or its entry has expired.
    pub fn lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.get(key)?;
        entry.is_fresh_at(Instant::now()).then_some(entry)
    }

    /// Store `payload` under `key`, fresh for `ttl` from now.
    pub fn store(&self, key: &str, payload: Payload, ttl: Duration) -> Arc<CacheEntry> {
        let now = Instant::now();
        let entry = Arc::new(CacheEntry {
            payload,
            // Absurd TTLs saturate to "about a century".
            expires_at: now
                .checked_add(ttl)
                .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 86_400)),
        });
        self.entries.insert(key.to_owned(), Arc::clone(&entry));
        entry
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
