//! Comparable-listing price search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::client::check_status;
use crate::error::ScraperError;

/// Prices parsed from one comparable-listing search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Every result price that parsed as a non-negative number, in result
    /// order.
    pub prices: Vec<f64>,
    /// Results dropped because they carried no usable price.
    pub unparsed: usize,
}

/// A source of prices for listings comparable to a query.
#[async_trait]
pub trait ComparableSearch: Send + Sync {
    /// ISO 4217 code every returned price is denominated in.
    fn currency(&self) -> &str;

    /// Runs one search request. Retries are the caller's concern.
    async fn search_prices(&self, query: &str) -> Result<SearchOutcome, ScraperError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Option<Vec<OrganicResult>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    price: Option<ResultPrice>,
}

#[derive(Debug, Deserialize)]
struct ResultPrice {
    #[serde(default)]
    extracted: Option<Value>,
    #[serde(default)]
    from: Option<PriceBound>,
}

#[derive(Debug, Deserialize)]
struct PriceBound {
    #[serde(default)]
    extracted: Option<Value>,
}

impl OrganicResult {
    /// `price.extracted`, or the lower bound of a price range.
    fn price(&self) -> Option<f64> {
        let price = self.price.as_ref()?;
        let raw = price
            .extracted
            .as_ref()
            .or_else(|| price.from.as_ref()?.extracted.as_ref())?;
        let value = match raw {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
            _ => return None,
        };
        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

/// eBay search through SerpApi. Prices are in US dollars.
pub struct SerpApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerpApiClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        let mut base_url = base_url.trim().to_owned();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_owned(),
        })
    }

    fn search_url(&self, query: &str) -> Result<reqwest::Url, ScraperError> {
        let base = format!("{}search.json", self.base_url);
        let mut url = reqwest::Url::parse(&base).map_err(|e| ScraperError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("engine", "ebay")
            .append_pair("_nkw", query)
            .append_pair("ebay_domain", "ebay.com")
            .append_pair("api_key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl ComparableSearch for SerpApiClient {
    fn currency(&self) -> &str {
        "USD"
    }

    async fn search_prices(&self, query: &str) -> Result<SearchOutcome, ScraperError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScraperError::EmptyQuery);
        }
        let url = self.search_url(query)?;
        // The key travels in the query string: errors carry the bare
        // endpoint, never the request URL.
        let display_url = format!("{}search.json", self.base_url);
        tracing::debug!(query, "searching comparable listings");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ScraperError::Http(e.without_url()))?;
        let response = check_status(response, &display_url)?;
        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::Http(e.without_url()))?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|source| ScraperError::Deserialize {
                context: format!("comparable search for \"{query}\""),
                source,
            })?;

        if let Some(error) = parsed.error {
            if error.contains("hasn't returned any results") {
                tracing::debug!(query, "search returned no results");
                return Ok(SearchOutcome::default());
            }
            return Err(ScraperError::SearchApi(error));
        }

        let results = parsed.organic_results.unwrap_or_default();
        let mut outcome = SearchOutcome::default();
        for result in &results {
            match result.price() {
                Some(price) => outcome.prices.push(price),
                None => outcome.unparsed += 1,
            }
        }
        if outcome.unparsed > 0 {
            tracing::debug!(
                query,
                unparsed = outcome.unparsed,
                kept = outcome.prices.len(),
                "dropped search results without a usable price"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(json: &str) -> OrganicResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn price_prefers_extracted() {
        let r = result(r#"{"price":{"raw":"$249.99","extracted":249.99}}"#);
        assert_eq!(r.price(), Some(249.99));
    }

    #[test]
    fn price_falls_back_to_range_lower_bound() {
        let r = result(
            r#"{"price":{"from":{"raw":"$20.00","extracted":20.0},"to":{"raw":"$35.00","extracted":35.0}}}"#,
        );
        assert_eq!(r.price(), Some(20.0));
    }

    #[test]
    fn price_accepts_numeric_strings() {
        let r = result(r#"{"price":{"extracted":"1,249.00"}}"#);
        assert_eq!(r.price(), Some(1_249.0));
    }

    #[test]
    fn missing_or_negative_price_is_unusable() {
        assert_eq!(result(r#"{"title":"x"}"#).price(), None);
        assert_eq!(result(r#"{"price":{"raw":"See price"}}"#).price(), None);
        assert_eq!(result(r#"{"price":{"extracted":-3}}"#).price(), None);
    }

    #[test]
    fn search_url_carries_engine_query_and_key() {
        let client =
            SerpApiClient::new("https://serpapi.com", "k3y", 5, "test-agent").unwrap();
        let url = client.search_url("switch oled").unwrap();
        assert_eq!(url.path(), "/search.json");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("engine".to_owned(), "ebay".to_owned())));
        assert!(pairs.contains(&("_nkw".to_owned(), "switch oled".to_owned())));
        assert!(pairs.contains(&("ebay_domain".to_owned(), "ebay.com".to_owned())));
        assert!(pairs.contains(&("api_key".to_owned(), "k3y".to_owned())));
    }
}
