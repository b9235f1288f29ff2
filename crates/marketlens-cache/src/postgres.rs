//! Postgres-backed [`CacheStore`] so cached details and samples outlive the
//! process.
//!
//! Expiry is evaluated by the database clock (`expires_at > now()`), so every
//! process sharing the table agrees on what is live.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::CacheError;
use crate::memory::SWEEP_INTERVAL;
use crate::store::CacheStore;

// Path relative to crates/marketlens-cache/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    fn options(self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
    }
}

pub struct PgStore {
    pool: PgPool,
    puts: AtomicUsize,
}

impl PgStore {
    /// Connects to `database_url` and applies pending cache migrations.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if no connection can be made, or
    /// [`CacheError::Migration`] if the schema cannot be brought up to date.
    pub async fn connect(database_url: &str, config: PoolConfig) -> Result<Self, CacheError> {
        let pool = config.options().connect(database_url).await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    /// Builds a store whose connections are opened on first use. No
    /// migrations are run.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if `database_url` cannot be parsed.
    pub fn connect_lazy(database_url: &str, config: PoolConfig) -> Result<Self, CacheError> {
        let pool = config.options().connect_lazy(database_url)?;
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing, already-migrated pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            puts: AtomicUsize::new(0),
        }
    }

    /// Deletes every expired row and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the delete fails.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CacheStore for PgStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT value FROM cache_entries WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        if value.is_none() {
            let evicted =
                sqlx::query("DELETE FROM cache_entries WHERE key = $1 AND expires_at <= now()")
                    .bind(key)
                    .execute(&self.pool)
                    .await?
                    .rows_affected();
            if evicted > 0 {
                tracing::trace!(key, "evicted expired cache entry");
            }
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at, updated_at) \
             VALUES ($1, $2, now() + make_interval(secs => $3), now()) \
             ON CONFLICT (key) DO UPDATE SET \
                 value = EXCLUDED.value, \
                 expires_at = EXCLUDED.expires_at, \
                 updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        if (self.puts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            match self.purge_expired().await {
                Ok(evicted) => tracing::debug!(evicted, "swept expired cache entries"),
                Err(e) => tracing::warn!(error = %e, "cache sweep failed"),
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;
        tracing::info!(removed = result.rows_affected(), "cache cleared");
        Ok(())
    }
}
