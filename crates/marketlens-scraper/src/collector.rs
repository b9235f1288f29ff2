//! Comparable-price sample collection with a query-keyed cache.

use std::sync::Arc;

use marketlens_cache::{normalize_query, sample_cache_key, TypedCache};
use marketlens_core::PriceSample;

use crate::error::ScraperError;
use crate::rate_limit::{retry_with_backoff, RetryPolicy};
use crate::search::ComparableSearch;

/// Sample size used when the caller does not configure one.
pub const DEFAULT_SAMPLE_SIZE: usize = 20;

/// Upper bound on the sample size a caller may request.
pub const MAX_SAMPLE_SIZE: usize = 50;

/// Collects comparable-listing prices for a query, one bulk search per
/// cache miss.
pub struct MarketSampleCollector {
    search: Arc<dyn ComparableSearch>,
    cache: TypedCache<PriceSample>,
    retry: RetryPolicy,
}

impl MarketSampleCollector {
    pub fn new(
        search: Arc<dyn ComparableSearch>,
        cache: TypedCache<PriceSample>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            search,
            cache,
            retry,
        }
    }

    /// Returns up to `max_size` comparable prices for `query`.
    ///
    /// `max_size` is clamped to `1..=`[`MAX_SAMPLE_SIZE`]. The full parsed
    /// search page is cached under the normalized query and the search
    /// currency, so a later call with a larger `max_size` is still served
    /// from cache. A search with no usable prices yields an empty sample,
    /// which is returned but not cached.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::EmptyQuery`] if `query` is blank.
    /// - Any search error that survived the retry policy.
    pub async fn collect_market_sample(
        &self,
        query: &str,
        max_size: usize,
    ) -> Result<PriceSample, ScraperError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(ScraperError::EmptyQuery);
        }
        let max_size = max_size.clamp(1, MAX_SAMPLE_SIZE);
        let currency = self.search.currency().to_owned();
        let key = sample_cache_key(&normalized, &currency);

        if let Some(sample) = self.cache.get(&key).await {
            tracing::debug!(query = %normalized, cached = sample.len(), "price sample cache hit");
            return Ok(sample.truncated(max_size));
        }

        let (outcome, attempts) =
            retry_with_backoff(self.retry, || self.search.search_prices(&normalized)).await;
        let outcome = outcome.inspect_err(|e| {
            tracing::warn!(query = %normalized, attempts, error = %e, "comparable search failed");
        })?;

        let sample = PriceSample::from_prices(normalized.clone(), &currency, &outcome.prices);
        if sample.is_empty() {
            tracing::info!(
                query = %normalized,
                unparsed = outcome.unparsed,
                "no comparable prices found"
            );
            return Ok(sample);
        }

        self.cache.put(&key, &sample).await;
        tracing::info!(
            query = %normalized,
            collected = sample.len(),
            unparsed = outcome.unparsed,
            "collected comparable price sample"
        );
        Ok(sample.truncated(max_size))
    }
}
