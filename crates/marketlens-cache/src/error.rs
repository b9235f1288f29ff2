use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or refused the operation.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache value for {key} could not be encoded: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for CacheError {
    fn from(error: sqlx::Error) -> Self {
        CacheError::Unavailable(error.to_string())
    }
}
