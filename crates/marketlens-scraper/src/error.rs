use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::ExtractError;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after_secs: Option<u64>,
    },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("server error {status} from {url}")]
    ServerError { status: u16, url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("listing {listing_id} has no usable detail payload: {source}")]
    Extract {
        listing_id: String,
        #[source]
        source: ExtractError,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("search API error: {0}")]
    SearchApi(String),

    #[error("search query is empty")]
    EmptyQuery,
}

impl ScraperError {
    /// Maps the error onto the per-listing failure taxonomy.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ScraperError::NotFound { .. } | ScraperError::InvalidUrl { .. } => FailureKind::NotFound,
            ScraperError::Deserialize { .. }
            | ScraperError::Extract { .. }
            | ScraperError::EmptyQuery => FailureKind::MalformedData,
            ScraperError::Http(_)
            | ScraperError::RateLimited { .. }
            | ScraperError::ServerError { .. }
            | ScraperError::UnexpectedStatus { .. }
            | ScraperError::SearchApi(_) => FailureKind::Transient,
        }
    }

    /// `true` when the request never reached the remote host (DNS failure,
    /// refused connection). A batch where every fetch fails this way is a
    /// transport outage rather than a set of per-listing failures.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, ScraperError::Http(e) if e.is_connect())
    }
}

/// Per-listing failure category reported in a batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The listing does not exist. Never retried.
    NotFound,
    /// Network or server-side failure that survived every retry.
    Transient,
    /// The page had no structured payload, or it could not be parsed.
    MalformedData,
    /// The batch deadline passed before this listing resolved.
    TimedOut,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NotFound => write!(f, "not_found"),
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::MalformedData => write!(f, "malformed_data"),
            FailureKind::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Why one listing in a batch could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Network attempts made before giving up (0 if none were started).
    pub attempts: u32,
}

impl FetchFailure {
    #[must_use]
    pub fn from_error(err: &ScraperError, attempts: u32) -> Self {
        Self {
            kind: err.failure_kind(),
            message: err.to_string(),
            attempts,
        }
    }

    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            kind: FailureKind::TimedOut,
            message: format!("batch deadline of {}ms elapsed", timeout.as_millis()),
            attempts: 0,
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Batch-level failures. Individual listing failures never escalate here.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch timed out after {}ms with none of {pending} listings resolved", .timeout.as_millis())]
    TimedOut { pending: usize, timeout: Duration },

    #[error("all {attempted} listing fetches failed to connect; last error: {last_error}")]
    TransportUnavailable { attempted: usize, last_error: String },
}
