use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("MARKETLENS_LOG_LEVEL", "info");
    let listing_base_url = or_default(
        "MARKETLENS_LISTING_BASE_URL",
        "https://jp.mercari.com/item/",
    );
    let search_base_url = or_default("MARKETLENS_SEARCH_BASE_URL", "https://serpapi.com/");
    let serpapi_api_key = lookup("SERPAPI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());

    let request_timeout_secs = parse_u64("MARKETLENS_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default(
        "MARKETLENS_USER_AGENT",
        "marketlens/0.1 (shopping-assistant)",
    );
    let max_concurrent_fetches = parse_usize("MARKETLENS_MAX_CONCURRENT_FETCHES", "5")?;
    if max_concurrent_fetches == 0 {
        return Err(invalid(
            "MARKETLENS_MAX_CONCURRENT_FETCHES",
            "must be at least 1".to_string(),
        ));
    }
    let batch_timeout_secs = parse_u64("MARKETLENS_BATCH_TIMEOUT_SECS", "120")?;
    let max_retries = parse_u32("MARKETLENS_MAX_RETRIES", "3")?;
    let retry_backoff_base_ms = parse_u64("MARKETLENS_RETRY_BACKOFF_BASE_MS", "500")?;
    let detail_cache_ttl_secs = parse_u64("MARKETLENS_DETAIL_CACHE_TTL_SECS", "86400")?;
    let sample_cache_ttl_secs = parse_u64("MARKETLENS_SAMPLE_CACHE_TTL_SECS", "21600")?;
    let sample_max_size = parse_usize("MARKETLENS_SAMPLE_MAX_SIZE", "20")?;
    let display_currency = or_default("MARKETLENS_DISPLAY_CURRENCY", "USD").to_ascii_uppercase();

    let raw_rate = or_default("MARKETLENS_USD_JPY_RATE", "150.0");
    let usd_jpy_rate = raw_rate
        .parse::<f64>()
        .map_err(|e| invalid("MARKETLENS_USD_JPY_RATE", e.to_string()))?;
    if !usd_jpy_rate.is_finite() || usd_jpy_rate <= 0.0 {
        return Err(invalid(
            "MARKETLENS_USD_JPY_RATE",
            format!("rate must be a positive number, got {raw_rate}"),
        ));
    }

    let database_url = lookup("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());
    let db_max_connections = parse_u32("MARKETLENS_DB_MAX_CONNECTIONS", "5")?;
    let db_acquire_timeout_secs = parse_u64("MARKETLENS_DB_ACQUIRE_TIMEOUT_SECS", "5")?;

    Ok(AppConfig {
        log_level,
        listing_base_url,
        search_base_url,
        serpapi_api_key,
        request_timeout_secs,
        user_agent,
        max_concurrent_fetches,
        batch_timeout_secs,
        max_retries,
        retry_backoff_base_ms,
        detail_cache_ttl_secs,
        sample_cache_ttl_secs,
        sample_max_size,
        display_currency,
        usd_jpy_rate,
        database_url,
        db_max_connections,
        db_acquire_timeout_secs,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
