use serde::{Deserialize, Serialize};

/// A listing as parsed from a marketplace results page, before any detail
/// page has been fetched.
///
/// Summaries are produced by the listing discovery walk and never mutated
/// afterwards; [`ListingSummary::with_detail`] returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    /// Marketplace listing identifier, e.g. `"m18276289519"`. Stable across
    /// runs and used as the detail cache key.
    pub id: String,
    pub name: String,
    /// Listed price in `currency`. Never negative.
    pub price: f64,
    /// ISO 4217 currency code (e.g., `"JPY"`).
    pub currency: String,
    pub thumbnail_url: String,
    /// Canonical listing page URL.
    pub url: String,
}

impl ListingSummary {
    /// Returns a copy of this summary with every field that the detail
    /// payload carries (price, currency, name, image) taking precedence.
    #[must_use]
    pub fn with_detail(&self, detail: &ListingDetail) -> Self {
        let mut merged = self.clone();
        if let Some(price) = detail.price {
            merged.price = price;
        }
        if let Some(currency) = &detail.currency {
            merged.currency.clone_from(currency);
        }
        if let Some(name) = &detail.name {
            merged.name.clone_from(name);
        }
        if let Some(image_url) = &detail.image_url {
            merged.thumbnail_url.clone_from(image_url);
        }
        merged
    }
}

/// Which extraction stage produced a [`ListingDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStage {
    /// Parsed from the page's own schema.org JSON-LD product markup.
    #[default]
    Structured,
    /// Scraped from meta tags and page markup because no structured payload
    /// was present.
    Heuristic,
}

/// Full detail record for a single listing, as extracted from its page.
///
/// Every field is optional: marketplaces omit fields freely and the record
/// only carries what the page actually exposed. A re-fetch replaces the whole
/// record rather than patching individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ListingDetail {
    /// More precise price from the payload; overrides the summary price.
    pub price: Option<f64>,
    pub currency: Option<String>,
    /// schema.org availability, shortened (e.g. `"InStock"`, `"SoldOut"`).
    pub availability: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    /// Display price already converted by the marketplace, e.g. `"≈ US$ 52"`.
    pub converted_price: Option<String>,
    pub description: Option<String>,
    /// Condition classification (e.g. `"UsedCondition"`, `"Like new"`).
    pub condition: Option<String>,
    pub posted_date: Option<String>,
    pub shipping_origin: Option<String>,
    pub shipping_fee: Option<String>,
    pub seller_name: Option<String>,
    pub seller_handle: Option<String>,
    pub seller_review_count: Option<u32>,
    /// Average seller rating on a 0.0–5.0 scale.
    pub seller_rating: Option<f64>,
    /// Category path, most general first.
    #[serde(default)]
    pub categories: Vec<String>,
    pub seller_verification: Option<String>,
    pub like_count: Option<u32>,
    #[serde(default)]
    pub extraction: ExtractionStage,
}
