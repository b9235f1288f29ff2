//! HTTP client for marketplace listing pages.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::error::ScraperError;

/// Source of raw listing page HTML.
///
/// [`ListingClient`] is the production implementation; tests substitute
/// in-memory sources to count calls and observe concurrency.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetches the page for one listing. Implementations make exactly one
    /// request per call; retries are the caller's concern.
    async fn fetch_listing_page(&self, listing_id: &str) -> Result<String, ScraperError>;
}

/// Fetches listing pages from `{base_url}{listing_id}`.
///
/// Requests are sent with a Japanese-first `Accept-Language` so the
/// marketplace serves the same markup its own storefront does.
pub struct ListingClient {
    client: Client,
    base_url: String,
}

impl ListingClient {
    /// Creates a client with the given base URL, request timeout, and
    /// `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        let mut base_url = base_url.trim().to_owned();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { client, base_url })
    }

    /// Builds the listing page URL for `listing_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if the id contains anything other
    /// than ASCII letters, digits, `-` or `_`, or the resulting URL does not
    /// parse.
    pub fn listing_url(&self, listing_id: &str) -> Result<String, ScraperError> {
        let id = listing_id.trim();
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ScraperError::InvalidUrl {
                url: format!("{}{listing_id}", self.base_url),
                reason: format!("listing id \"{listing_id}\" is not a plain identifier"),
            });
        }
        let url = format!("{}{id}", self.base_url);
        reqwest::Url::parse(&url).map_err(|e| ScraperError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        Ok(url)
    }
}

#[async_trait]
impl ListingSource for ListingClient {
    async fn fetch_listing_page(&self, listing_id: &str) -> Result<String, ScraperError> {
        let url = self.listing_url(listing_id)?;
        tracing::debug!(listing_id, url = %url, "fetching listing page");

        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "ja-JP,ja;q=0.9,en;q=0.8")
            .send()
            .await?;

        let response = check_status(response, &url)?;
        Ok(response.text().await?)
    }
}

/// Maps non-2xx responses onto typed errors.
///
/// 404 and 410 are terminal; 429 carries `Retry-After` when the server sent
/// one in seconds; 5xx are server errors; anything else is unexpected.
pub(crate) fn check_status(response: Response, url: &str) -> Result<Response, ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        return Err(ScraperError::RateLimited {
            url: url.to_owned(),
            retry_after_secs,
        });
    }

    if status.is_server_error() {
        return Err(ScraperError::ServerError {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    Err(ScraperError::UnexpectedStatus {
        status: status.as_u16(),
        url: url.to_owned(),
    })
}
