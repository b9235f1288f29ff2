use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

/// A shared key → blob store with per-entry time-to-live.
///
/// Implementations synchronise internally; callers share one handle behind an
/// `Arc` and never lock around it. A read must never return an entry older
/// than its TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live value stored under `key`, or `None` on a miss or
    /// expired entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Drops every entry.
    async fn clear(&self) -> Result<(), CacheError>;
}
