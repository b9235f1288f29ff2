//! `research` and `stats` commands: comparable-price market reports.

use std::sync::Arc;
use std::time::Duration;

use marketlens_cache::{CacheStore, TypedCache, SAMPLE_NAMESPACE};
use marketlens_core::{AppConfig, FixedRateConverter, PriceSample};
use marketlens_market::{compute_statistics, describe};
use marketlens_scraper::{MarketSampleCollector, RetryPolicy, SerpApiClient};

/// Collects a comparable-price sample for `query` and prints its report.
///
/// # Errors
///
/// Returns an error if `SERPAPI_API_KEY` is unset, the search fails after
/// retries, or the sample violates the statistics input contract.
pub(crate) async fn run_research(
    config: &AppConfig,
    store: Arc<dyn CacheStore>,
    query: &str,
    max_size: Option<usize>,
    display_currency: Option<&str>,
) -> anyhow::Result<()> {
    let api_key = config.require_serpapi_api_key()?;

    let search = SerpApiClient::new(
        &config.search_base_url,
        api_key,
        config.request_timeout_secs,
        &config.user_agent,
    )
    .map_err(|e| anyhow::anyhow!("failed to build search client: {e}"))?;

    let collector = MarketSampleCollector::new(
        Arc::new(search),
        TypedCache::new(
            store,
            SAMPLE_NAMESPACE,
            Duration::from_secs(config.sample_cache_ttl_secs),
        ),
        RetryPolicy::new(config.max_retries, config.retry_backoff_base_ms),
    );

    let sample = collector
        .collect_market_sample(query, max_size.unwrap_or(config.sample_max_size))
        .await?;
    print_report(config, query, &sample, display_currency)
}

/// Prints the report for prices supplied directly.
///
/// # Errors
///
/// Returns an error if a price is negative or non-finite, or the display
/// currency is not supported.
pub(crate) fn run_stats(
    config: &AppConfig,
    label: &str,
    currency: &str,
    prices: &[f64],
    display_currency: Option<&str>,
) -> anyhow::Result<()> {
    let sample = PriceSample::from_prices(label, &currency.to_ascii_uppercase(), prices);
    print_report(config, label, &sample, display_currency)
}

fn print_report(
    config: &AppConfig,
    query: &str,
    sample: &PriceSample,
    display_currency: Option<&str>,
) -> anyhow::Result<()> {
    let outcome = compute_statistics(sample)?;
    let converter = FixedRateConverter::usd_jpy(config.usd_jpy_rate);
    let display_currency = display_currency.unwrap_or(&config.display_currency);
    print!(
        "{}",
        describe(query, &outcome, &converter, display_currency)?
    );
    Ok(())
}
