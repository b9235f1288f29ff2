//! In-process [`CacheStore`] backed by a `HashMap` behind an async `RwLock`.
//!
//! Entry age is measured with `tokio::time::Instant`, so tests running on a
//! paused runtime can expire entries with `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::store::CacheStore;

struct StoredEntry {
    value: Vec<u8>,
    inserted_at: Instant,
    ttl: Duration,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Every this many writes, `put` drops all expired entries.
pub const SWEEP_INTERVAL: usize = 256;

/// Process-wide in-memory cache store.
///
/// A read that observes an expired entry treats it as absent and evicts it.
/// Keys that are never read again are reclaimed by the sweep that runs every
/// [`SWEEP_INTERVAL`] writes.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent put may have refreshed it.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            tracing::trace!(key, "evicted expired cache entry");
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = StoredEntry {
            value,
            inserted_at: now,
            ttl,
        };
        let mut entries = self.entries.write().await;
        if (self.puts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            tracing::debug!(
                evicted = before - entries.len(),
                "swept expired cache entries"
            );
        }
        entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
