use crate::ConfigError;

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub listing_base_url: String,
    pub search_base_url: String,
    pub serpapi_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrent_fetches: usize,
    pub batch_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub detail_cache_ttl_secs: u64,
    pub sample_cache_ttl_secs: u64,
    pub sample_max_size: usize,
    pub display_currency: String,
    pub usd_jpy_rate: f64,
    /// Postgres URL for the persistent cache; the in-memory store is used
    /// when unset.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// The SerpApi key, which only market research needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if `SERPAPI_API_KEY` is unset or
    /// blank.
    pub fn require_serpapi_api_key(&self) -> Result<&str, ConfigError> {
        self.serpapi_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SERPAPI_API_KEY".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("listing_base_url", &self.listing_base_url)
            .field("search_base_url", &self.search_base_url)
            .field(
                "serpapi_api_key",
                &self.serpapi_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("batch_timeout_secs", &self.batch_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("detail_cache_ttl_secs", &self.detail_cache_ttl_secs)
            .field("sample_cache_ttl_secs", &self.sample_cache_ttl_secs)
            .field("sample_max_size", &self.sample_max_size)
            .field("display_currency", &self.display_currency)
            .field("usd_jpy_rate", &self.usd_jpy_rate)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
