//! Namespaced, JSON-encoded view over a [`CacheStore`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;
use crate::store::CacheStore;

/// Typed cache handle shared by every fetch running against one store.
///
/// The cache never fails its caller: store errors and undecodable blobs on
/// read become a miss, and write failures are logged and dropped. Fetching
/// simply proceeds without caching when the store is unreachable.
pub struct TypedCache<T> {
    store: Arc<dyn CacheStore>,
    namespace: &'static str,
    ttl: Duration,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace,
            ttl: self.ttl,
            _value: PhantomData,
        }
    }
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a cache writing under `namespace:` keys with a fixed TTL.
    pub fn new(store: Arc<dyn CacheStore>, namespace: &'static str, ttl: Duration) -> Self {
        Self {
            store,
            namespace,
            ttl,
            _value: PhantomData,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    /// Looks up `key`, treating every failure as a miss.
    pub async fn get(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let bytes = match self.store.get(&full_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "cached value does not decode; treating as miss");
                None
            }
        }
    }

    /// Stores `value` under `key`. Failures are logged and swallowed.
    pub async fn put(&self, key: &str, value: &T) {
        if let Err(e) = self.try_put(key, value).await {
            tracing::warn!(key, error = %e, "cache write failed; continuing without caching");
        }
    }

    async fn try_put(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let full_key = self.full_key(key);
        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Serialize {
            key: full_key.clone(),
            source,
        })?;
        self.store.put(&full_key, bytes, self.ttl).await
    }

    /// Drops every entry in the underlying store.
    ///
    /// # Errors
    ///
    /// Returns the store's [`CacheError`]; unlike reads and writes, an
    /// explicit clear is reported to the caller.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await
    }
}

/// Lowercases, trims, and collapses whitespace runs in a search query so that
/// trivially different spellings share one cache entry.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic price-sample cache key: hex SHA-256 of the normalized query
/// and the upper-cased currency code.
#[must_use]
pub fn sample_cache_key(query: &str, currency: &str) -> String {
    use sha2::{Digest, Sha256};
    let input = format!(
        "{}\x00{}",
        normalize_query(query),
        currency.trim().to_uppercase()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use marketlens_core::{ExtractionStage, ListingDetail};

    use super::*;
    use crate::memory::MemoryStore;

    /// Store that is always unreachable, counting how often it was tried.
    #[derive(Default)]
    struct UnreachableStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for UnreachableStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_owned()))
        }

        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".to_owned()))
        }

        async fn clear(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_owned()))
        }
    }

    fn sample_detail() -> ListingDetail {
        ListingDetail {
            price: Some(12_800.0),
            currency: Some("JPY".to_owned()),
            availability: Some("InStock".to_owned()),
            description: Some("Used twice, boxed.".to_owned()),
            condition: Some("UsedCondition".to_owned()),
            seller_name: Some("tanaka".to_owned()),
            seller_review_count: Some(231),
            seller_rating: Some(4.8),
            categories: vec!["Games".to_owned(), "Consoles".to_owned()],
            like_count: Some(14),
            extraction: ExtractionStage::Structured,
            ..ListingDetail::default()
        }
    }

    #[tokio::test]
    async fn detail_round_trips_with_all_fields_equal() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = TypedCache::<ListingDetail>::new(store, "detail", Duration::from_secs(60));
        let detail = sample_detail();

        cache.put("m123", &detail).await;
        assert_eq!(cache.get("m123").await, Some(detail));
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let details =
            TypedCache::<ListingDetail>::new(Arc::clone(&store), "detail", Duration::from_secs(60));
        let others = TypedCache::<ListingDetail>::new(store, "other", Duration::from_secs(60));

        details.put("m1", &sample_detail()).await;
        assert!(others.get("m1").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_store_degrades_to_miss() {
        let store = Arc::new(UnreachableStore::default());
        let cache = TypedCache::<ListingDetail>::new(
            Arc::clone(&store) as Arc<dyn CacheStore>,
            "detail",
            Duration::from_secs(60),
        );

        assert!(cache.get("m1").await.is_none());
        cache.put("m1", &sample_detail()).await;
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn undecodable_blob_is_a_miss() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        store
            .put("detail:m1", b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = TypedCache::<ListingDetail>::new(store, "detail", Duration::from_secs(60));
        assert!(cache.get("m1").await.is_none());
    }

    #[tokio::test]
    async fn explicit_clear_reports_store_failure() {
        let cache = TypedCache::<ListingDetail>::new(
            Arc::new(UnreachableStore::default()),
            "detail",
            Duration::from_secs(60),
        );
        assert!(matches!(
            cache.clear().await,
            Err(CacheError::Unavailable(_))
        ));
    }

    #[test]
    fn normalize_query_collapses_case_and_whitespace() {
        assert_eq!(
            normalize_query("  Nintendo   Switch\tOLED "),
            "nintendo switch oled"
        );
    }

    #[test]
    fn sample_key_is_stable_across_spellings() {
        assert_eq!(
            sample_cache_key("Nintendo Switch OLED", "usd"),
            sample_cache_key(" nintendo  switch oled", "USD")
        );
    }

    #[test]
    fn sample_key_depends_on_currency() {
        assert_ne!(
            sample_cache_key("switch", "USD"),
            sample_cache_key("switch", "JPY")
        );
    }

    #[test]
    fn sample_key_is_hex_sha256() {
        let key = sample_cache_key("switch", "USD");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
