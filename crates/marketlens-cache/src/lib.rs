//! Shared TTL caches for listing details and comparable price samples.
//!
//! [`CacheStore`] is the raw key → blob contract, implemented in-process by
//! [`MemoryStore`] and persistently by [`PgStore`]; [`TypedCache`] layers
//! namespacing, JSON encoding and the degrade-to-miss policy on top of it.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod typed;

pub use error::CacheError;
pub use memory::{MemoryStore, SWEEP_INTERVAL};
pub use postgres::{PgStore, PoolConfig};
pub use store::CacheStore;
pub use typed::{normalize_query, sample_cache_key, TypedCache};

/// Key namespace for per-listing detail records.
pub const DETAIL_NAMESPACE: &str = "detail";

/// Key namespace for comparable price samples.
pub const SAMPLE_NAMESPACE: &str = "sample";
