//! Retry with exponential back-off and jitter for listing and search requests.
//!
//! Only transient failures are retried: connection and timeout errors, HTTP
//! 429 and 5xx responses. Not-found listings, non-retriable statuses, and
//! payloads that fail to parse are returned after the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Hard ceiling on attempts per request, including the first one.
pub const MAX_ATTEMPTS: u32 = 5;

const MAX_DELAY_MS: u64 = 30_000;

/// Returns `true` if `err` is a transient condition worth retrying.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.is_body()
                || e.status().is_some_and(|s| s.is_server_error())
        }
        ScraperError::RateLimited { .. } | ScraperError::ServerError { .. } => true,
        ScraperError::NotFound { .. }
        | ScraperError::UnexpectedStatus { .. }
        | ScraperError::Deserialize { .. }
        | ScraperError::Extract { .. }
        | ScraperError::InvalidUrl { .. }
        | ScraperError::SearchApi(_)
        | ScraperError::EmptyQuery => false,
    }
}

/// How many times a request is retried and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_base_ms: u64,
}

impl RetryPolicy {
    /// Creates a policy of `max_retries` additional attempts after the first.
    ///
    /// The total is capped at [`MAX_ATTEMPTS`] regardless of `max_retries`.
    #[must_use]
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self {
            max_retries: max_retries.min(MAX_ATTEMPTS - 1),
            backoff_base_ms,
        }
    }

    /// A single attempt, never retried.
    #[must_use]
    pub fn no_retries() -> Self {
        Self::new(0, 0)
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based): `base × 2^(retry-1)`,
    /// capped at 30 s, then scaled by a ±25 % jitter. A server-provided
    /// `Retry-After` raises the floor of the delay.
    fn delay_for(&self, retry: u32, retry_after_secs: Option<u64>) -> Duration {
        let computed = self
            .backoff_base_ms
            .saturating_mul(1u64 << (retry - 1).min(10));
        let floor = retry_after_secs.map_or(0, |s| s.saturating_mul(1_000));
        let capped = computed.max(floor).min(MAX_DELAY_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jittered = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
        Duration::from_millis(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500)
    }
}

/// Runs `operation` under `policy`, returning its final result together with
/// the number of attempts made.
///
/// Non-retriable errors are returned immediately. Each retry happens inside
/// the caller's concurrency slot, so retries never widen fan-out.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> (Result<T, ScraperError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return (Ok(value), attempt),
            Err(err) => {
                let retries_used = attempt - 1;
                if !is_retriable(&err) || retries_used >= policy.max_retries {
                    return (Err(err), attempt);
                }
                let retry_after_secs = match &err {
                    ScraperError::RateLimited {
                        retry_after_secs, ..
                    } => *retry_after_secs,
                    _ => None,
                };
                let delay = policy.delay_for(attempt, retry_after_secs);
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient fetch error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn server_error() -> ScraperError {
        ScraperError::ServerError {
            status: 503,
            url: "https://jp.mercari.com/item/m1".to_owned(),
        }
    }

    #[test]
    fn policy_caps_total_attempts_at_five() {
        assert_eq!(RetryPolicy::new(12, 100).max_retries(), MAX_ATTEMPTS - 1);
        assert_eq!(RetryPolicy::new(2, 100).max_retries(), 2);
    }

    #[test]
    fn not_found_is_not_retriable() {
        assert!(!is_retriable(&ScraperError::NotFound {
            url: "u".to_owned()
        }));
    }

    #[test]
    fn rate_limited_and_server_errors_are_retriable() {
        assert!(is_retriable(&ScraperError::RateLimited {
            url: "u".to_owned(),
            retry_after_secs: None,
        }));
        assert!(is_retriable(&server_error()));
    }

    #[test]
    fn delay_grows_exponentially_within_jitter_band() {
        let policy = RetryPolicy::new(4, 1_000);
        let first = policy.delay_for(1, None).as_millis();
        let third = policy.delay_for(3, None).as_millis();
        assert!((750..=1_250).contains(&first), "first delay {first}");
        assert!((3_000..=5_000).contains(&third), "third delay {third}");
    }

    #[test]
    fn retry_after_sets_delay_floor() {
        let policy = RetryPolicy::new(4, 0);
        let delay = policy.delay_for(1, Some(2)).as_millis();
        assert!((1_500..=2_500).contains(&delay), "delay {delay}");
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let (result, attempts) = retry_with_backoff(RetryPolicy::new(3, 0), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ScraperError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let (result, attempts) = retry_with_backoff(RetryPolicy::new(3, 0), || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(server_error())
                } else {
                    Ok::<u32, ScraperError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn gives_up_after_policy_is_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let (result, attempts) = retry_with_backoff(RetryPolicy::new(2, 0), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(server_error())
            }
        })
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ScraperError::ServerError { .. })));
    }

    #[tokio::test]
    async fn never_exceeds_five_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let (_, attempts) = retry_with_backoff(RetryPolicy::new(50, 0), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(server_error())
            }
        })
        .await;
        assert_eq!(attempts, MAX_ATTEMPTS);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let (result, attempts) = retry_with_backoff(RetryPolicy::new(3, 0), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(ScraperError::NotFound {
                    url: "https://jp.mercari.com/item/gone".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(attempts, 1, "NotFound must not be retried");
        assert!(matches!(result, Err(ScraperError::NotFound { .. })));
    }
}
