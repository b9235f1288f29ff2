//! Cache store selection and the `clear-cache` command.

use std::sync::Arc;

use marketlens_cache::{CacheStore, MemoryStore, PgStore, PoolConfig};
use marketlens_core::AppConfig;

fn pool_config(config: &AppConfig) -> PoolConfig {
    PoolConfig {
        max_connections: config.db_max_connections,
        acquire_timeout_secs: config.db_acquire_timeout_secs,
    }
}

/// Opens the Postgres cache when `DATABASE_URL` is set, falling back to an
/// in-process store when it is unset or unreachable.
pub(crate) async fn open_store(config: &AppConfig) -> Arc<dyn CacheStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::debug!("DATABASE_URL not set; using in-memory cache");
        return Arc::new(MemoryStore::new());
    };

    match PgStore::connect(database_url, pool_config(config)).await {
        Ok(store) => {
            tracing::debug!("using postgres cache");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "postgres cache unavailable; continuing with in-memory cache");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Empties the persistent cache.
///
/// # Errors
///
/// Returns an error if the database cannot be reached or the delete fails.
pub(crate) async fn run_clear_cache(config: &AppConfig) -> anyhow::Result<()> {
    let Some(database_url) = config.database_url.as_deref() else {
        println!("DATABASE_URL is not set; the in-memory cache does not outlive a run, nothing to clear");
        return Ok(());
    };

    let store = PgStore::connect(database_url, pool_config(config)).await?;
    store.clear().await?;
    println!("cache cleared");
    Ok(())
}
