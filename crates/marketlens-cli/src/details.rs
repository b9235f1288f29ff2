//! `details` command: fetch listing detail records as JSON.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use marketlens_cache::{CacheStore, TypedCache, DETAIL_NAMESPACE};
use marketlens_core::AppConfig;
use marketlens_scraper::{DetailBatch, DetailFetcher, ListingClient, RetryPolicy};
use serde_json::{json, Value};

/// Fetches `ids` through the detail cache and prints one JSON object keyed by
/// listing id. Listings that failed carry their failure kind and message
/// instead of a detail record; the command itself only fails on batch-level
/// errors.
///
/// # Errors
///
/// Returns an error if the listing client cannot be built, or the batch
/// timed out with nothing resolved or could not reach the marketplace at all.
pub(crate) async fn run_details(
    config: &AppConfig,
    store: Arc<dyn CacheStore>,
    ids: &[String],
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    let client = ListingClient::new(
        &config.listing_base_url,
        config.request_timeout_secs,
        &config.user_agent,
    )
    .map_err(|e| anyhow::anyhow!("failed to build listing client: {e}"))?;

    let fetcher = DetailFetcher::new(
        Arc::new(client),
        TypedCache::new(
            store,
            DETAIL_NAMESPACE,
            Duration::from_secs(config.detail_cache_ttl_secs),
        ),
        RetryPolicy::new(config.max_retries, config.retry_backoff_base_ms),
    );

    let batch = fetcher
        .fetch_details(
            ids,
            concurrency.unwrap_or(config.max_concurrent_fetches),
            Duration::from_secs(timeout_secs.unwrap_or(config.batch_timeout_secs)),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&batch_to_json(&batch))?);

    let failed = batch.failed_ids();
    tracing::info!(
        requested = batch.len(),
        cache_hits = batch.cache_hits(),
        network_fetches = batch.network_fetches(),
        failed = failed.len(),
        "detail batch complete"
    );
    if !failed.is_empty() {
        eprintln!(
            "could not evaluate {} of {} listings: {}",
            failed.len(),
            batch.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

fn batch_to_json(batch: &DetailBatch) -> Value {
    let listings: BTreeMap<&str, Value> = batch
        .results()
        .iter()
        .map(|(id, result)| {
            let entry = match result {
                Ok(detail) => json!({ "status": "ok", "detail": detail }),
                Err(failure) => json!({ "status": "failed", "failure": failure }),
            };
            (id.as_str(), entry)
        })
        .collect();

    json!({
        "listings": listings,
        "cache_hits": batch.cache_hits(),
        "network_fetches": batch.network_fetches(),
    })
}
