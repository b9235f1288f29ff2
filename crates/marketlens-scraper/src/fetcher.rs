//! Bounded-concurrency detail fetching with per-listing failure isolation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use marketlens_cache::TypedCache;
use marketlens_core::ListingDetail;

use crate::client::ListingSource;
use crate::error::{BatchError, FetchFailure, ScraperError};
use crate::extract::extract_detail;
use crate::rate_limit::{retry_with_backoff, RetryPolicy};

/// Fan-out used when the caller does not configure one.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Per-listing results of one [`DetailFetcher::fetch_details`] call.
///
/// Keyed by listing id, so the order in which fetches completed is not
/// observable.
#[derive(Debug, Clone, Default)]
pub struct DetailBatch {
    results: BTreeMap<String, Result<ListingDetail, FetchFailure>>,
    cache_hits: usize,
    network_fetches: usize,
}

impl DetailBatch {
    #[must_use]
    pub fn results(&self) -> &BTreeMap<String, Result<ListingDetail, FetchFailure>> {
        &self.results
    }

    #[must_use]
    pub fn into_results(self) -> BTreeMap<String, Result<ListingDetail, FetchFailure>> {
        self.results
    }

    #[must_use]
    pub fn get(&self, listing_id: &str) -> Option<&Result<ListingDetail, FetchFailure>> {
        self.results.get(listing_id)
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &ListingDetail)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().ok().map(|d| (id.as_str(), d)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &FetchFailure)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|f| (id.as_str(), f)))
    }

    #[must_use]
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures().map(|(id, _)| id).collect()
    }

    /// Listings answered from the detail cache.
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.cache_hits
    }

    /// Listings that needed at least one network request.
    #[must_use]
    pub fn network_fetches(&self) -> usize {
        self.network_fetches
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

enum Outcome {
    Cached(ListingDetail),
    Fetched(ListingDetail),
    Failed { error: ScraperError, attempts: u32 },
}

/// Resolves listing ids to [`ListingDetail`]s through the detail cache and a
/// [`ListingSource`], never holding more than the requested number of page
/// fetches in flight.
pub struct DetailFetcher {
    source: Arc<dyn ListingSource>,
    cache: TypedCache<ListingDetail>,
    retry: RetryPolicy,
}

impl DetailFetcher {
    pub fn new(
        source: Arc<dyn ListingSource>,
        cache: TypedCache<ListingDetail>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            cache,
            retry,
        }
    }

    /// Fetches detail for every id in `listing_ids`.
    ///
    /// Ids are deduplicated (first occurrence wins) and blank ids dropped.
    /// Cache hits resolve without network access; misses are fetched with at
    /// most `concurrency_limit` (minimum 1) in flight, retried inside their
    /// slot, extracted, and written back to the cache.
    ///
    /// When `timeout` elapses, in-flight fetches are cancelled and every
    /// unresolved id is recorded as [`crate::FailureKind::TimedOut`].
    ///
    /// # Errors
    ///
    /// - [`BatchError::TimedOut`] if the deadline passed before any listing
    ///   resolved.
    /// - [`BatchError::TransportUnavailable`] if nothing succeeded and every
    ///   failure was a connection-level error.
    pub async fn fetch_details<S: AsRef<str>>(
        &self,
        listing_ids: &[S],
        concurrency_limit: usize,
        timeout: Duration,
    ) -> Result<DetailBatch, BatchError> {
        let unique = dedupe_ids(listing_ids);
        let mut batch = DetailBatch::default();
        if unique.is_empty() {
            return Ok(batch);
        }

        let limit = concurrency_limit.max(1);
        tracing::info!(
            listings = unique.len(),
            concurrency = limit,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "fetching listing details"
        );

        let deadline = tokio::time::Instant::now() + timeout;
        let mut transport_failures = 0usize;
        let mut last_transport_error: Option<String> = None;
        let mut timed_out = false;

        {
            let mut pending = stream::iter(unique.iter().cloned().map(|id| self.resolve(id)))
                .buffer_unordered(limit);

            loop {
                match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(Some((id, outcome))) => {
                        let result = match outcome {
                            Outcome::Cached(detail) => {
                                batch.cache_hits += 1;
                                Ok(detail)
                            }
                            Outcome::Fetched(detail) => {
                                batch.network_fetches += 1;
                                Ok(detail)
                            }
                            Outcome::Failed { error, attempts } => {
                                if attempts > 0 {
                                    batch.network_fetches += 1;
                                }
                                if error.is_transport() {
                                    transport_failures += 1;
                                    last_transport_error = Some(error.to_string());
                                }
                                tracing::warn!(
                                    listing_id = %id,
                                    attempts,
                                    kind = %error.failure_kind(),
                                    error = %error,
                                    "listing detail fetch failed"
                                );
                                Err(FetchFailure::from_error(&error, attempts))
                            }
                        };
                        batch.results.insert(id, result);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                }
            }
            // Dropping `pending` here cancels whatever is still in flight.
        }

        if timed_out {
            if batch.results.is_empty() {
                tracing::error!(
                    pending = unique.len(),
                    "batch deadline passed before any listing resolved"
                );
                return Err(BatchError::TimedOut {
                    pending: unique.len(),
                    timeout,
                });
            }
            let mut unresolved = 0usize;
            for id in &unique {
                if !batch.results.contains_key(id) {
                    unresolved += 1;
                    batch
                        .results
                        .insert(id.clone(), Err(FetchFailure::timed_out(timeout)));
                }
            }
            tracing::warn!(
                unresolved,
                resolved = unique.len() - unresolved,
                "batch deadline passed; returning partial results"
            );
        }

        let successes = batch.successes().count();
        let failures = batch.len() - successes;
        if successes == 0 && failures > 0 && transport_failures == failures {
            return Err(BatchError::TransportUnavailable {
                attempted: failures,
                last_error: last_transport_error.unwrap_or_default(),
            });
        }

        tracing::info!(
            succeeded = successes,
            failed = failures,
            cache_hits = batch.cache_hits,
            network_fetches = batch.network_fetches,
            "listing detail batch complete"
        );
        Ok(batch)
    }

    async fn resolve(&self, listing_id: String) -> (String, Outcome) {
        if let Some(detail) = self.cache.get(&listing_id).await {
            tracing::debug!(listing_id = %listing_id, "detail cache hit");
            return (listing_id, Outcome::Cached(detail));
        }

        let id = listing_id.as_str();
        let (page, attempts) =
            retry_with_backoff(self.retry, || self.source.fetch_listing_page(id)).await;

        let outcome = match page.and_then(|html| {
            extract_detail(&html).map_err(|source| ScraperError::Extract {
                listing_id: listing_id.clone(),
                source,
            })
        }) {
            Ok(detail) => {
                self.cache.put(&listing_id, &detail).await;
                Outcome::Fetched(detail)
            }
            Err(error) => Outcome::Failed { error, attempts },
        };
        (listing_id, outcome)
    }
}

/// Trims ids, drops blanks, and removes duplicates keeping first-seen order.
fn dedupe_ids<S: AsRef<str>>(listing_ids: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(listing_ids.len());
    for raw in listing_ids {
        let id = raw.as_ref().trim();
        if id.is_empty() {
            tracing::warn!("dropping blank listing id");
            continue;
        }
        if seen.insert(id.to_owned()) {
            unique.push(id.to_owned());
        }
    }
    unique
}
