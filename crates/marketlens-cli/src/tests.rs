use marketlens_cache::CacheStore;

use super::*;

#[test]
fn parses_details_with_defaults() {
    let cli = Cli::try_parse_from(["marketlens", "details", "m123", "m456"])
        .expect("expected valid cli args");

    match cli.command {
        Commands::Details {
            ids,
            concurrency,
            timeout_secs,
        } => {
            assert_eq!(ids, vec!["m123".to_owned(), "m456".to_owned()]);
            assert!(concurrency.is_none());
            assert!(timeout_secs.is_none());
        }
        other => panic!("expected Details, got: {other:?}"),
    }
}

#[test]
fn parses_details_overrides() {
    let cli = Cli::try_parse_from([
        "marketlens",
        "details",
        "m1",
        "--concurrency",
        "2",
        "--timeout-secs",
        "15",
    ])
    .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Details {
            concurrency: Some(2),
            timeout_secs: Some(15),
            ..
        }
    ));
}

#[test]
fn details_requires_an_id() {
    assert!(Cli::try_parse_from(["marketlens", "details"]).is_err());
}

#[test]
fn research_joins_query_words() {
    let cli = Cli::try_parse_from([
        "marketlens",
        "research",
        "nintendo",
        "switch",
        "oled",
        "--max-size",
        "30",
        "--display-currency",
        "JPY",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Research {
            query,
            max_size,
            display_currency,
        } => {
            assert_eq!(query.join(" "), "nintendo switch oled");
            assert_eq!(max_size, Some(30));
            assert_eq!(display_currency.as_deref(), Some("JPY"));
        }
        other => panic!("expected Research, got: {other:?}"),
    }
}

#[test]
fn research_requires_a_query() {
    assert!(Cli::try_parse_from(["marketlens", "research"]).is_err());
}

#[test]
fn stats_defaults_currency_and_label() {
    let cli = Cli::try_parse_from(["marketlens", "stats", "89", "250.5", "280"])
        .expect("expected valid cli args");

    match cli.command {
        Commands::Stats {
            prices,
            currency,
            display_currency,
            label,
        } => {
            assert_eq!(prices, vec![89.0, 250.5, 280.0]);
            assert_eq!(currency, "USD");
            assert!(display_currency.is_none());
            assert_eq!(label, "comparable items");
        }
        other => panic!("expected Stats, got: {other:?}"),
    }
}

#[test]
fn stats_accepts_negative_prices_for_validation_downstream() {
    let cli = Cli::try_parse_from(["marketlens", "stats", "10", "-5", "20"])
        .expect("expected valid cli args");

    assert!(matches!(cli.command, Commands::Stats { ref prices, .. } if prices.len() == 3));
}

#[test]
fn stats_rejects_non_numeric_price() {
    assert!(Cli::try_parse_from(["marketlens", "stats", "10", "abc"]).is_err());
}

#[test]
fn parses_clear_cache_command() {
    let cli = Cli::try_parse_from(["marketlens", "clear-cache"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::ClearCache));
}

#[test]
fn clear_cache_takes_no_arguments() {
    assert!(Cli::try_parse_from(["marketlens", "clear-cache", "detail"]).is_err());
}

#[test]
fn no_command_is_an_error() {
    assert!(Cli::try_parse_from(["marketlens"]).is_err());
}

fn test_config(database_url: Option<&str>) -> marketlens_core::AppConfig {
    marketlens_core::AppConfig {
        log_level: "info".to_string(),
        listing_base_url: "https://jp.mercari.com/item/".to_string(),
        search_base_url: "https://serpapi.com/".to_string(),
        serpapi_api_key: None,
        request_timeout_secs: 30,
        user_agent: "marketlens-test/0.1".to_string(),
        max_concurrent_fetches: 5,
        batch_timeout_secs: 120,
        max_retries: 3,
        retry_backoff_base_ms: 500,
        detail_cache_ttl_secs: 86_400,
        sample_cache_ttl_secs: 21_600,
        sample_max_size: 20,
        display_currency: "USD".to_string(),
        usd_jpy_rate: 150.0,
        database_url: database_url.map(str::to_string),
        db_max_connections: 1,
        db_acquire_timeout_secs: 1,
    }
}

#[tokio::test]
async fn unreachable_database_falls_back_to_memory_cache() {
    let config = test_config(Some("postgres://marketlens@127.0.0.1:1/marketlens"));
    let store = cache::open_store(&config).await;

    store
        .put("detail:m1", b"v".to_vec(), std::time::Duration::from_secs(60))
        .await
        .expect("memory store accepts writes");
    assert_eq!(
        store.get("detail:m1").await.expect("memory store reads"),
        Some(b"v".to_vec())
    );
}

#[tokio::test]
async fn clear_cache_without_database_is_a_no_op() {
    assert!(cache::run_clear_cache(&test_config(None)).await.is_ok());
}

#[tokio::test]
async fn clear_cache_reports_unreachable_database() {
    let config = test_config(Some("postgres://marketlens@127.0.0.1:1/marketlens"));
    assert!(cache::run_clear_cache(&config).await.is_err());
}
