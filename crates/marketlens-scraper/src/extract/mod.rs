//! Two-stage listing detail extraction.
//!
//! Stage one reads the page's schema.org JSON-LD product markup. Stage two
//! scrapes meta tags and `data-testid` nodes, and only runs when the page has
//! no structured payload at all. A structured payload that is present but
//! broken is reported as an error rather than papered over by the fallback.

mod heuristic;
mod structured;

use std::sync::LazyLock;

use marketlens_core::ListingDetail;
use regex::Regex;
use thiserror::Error;

pub use heuristic::extract_heuristic;
pub use structured::extract_structured;

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("valid regex")
});

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("structured product payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("structured product field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("no structured payload and no recognisable listing markup")]
    Missing,
}

/// Extracts a [`ListingDetail`] from a listing page.
///
/// # Errors
///
/// Propagates [`ExtractError::InvalidJson`] and [`ExtractError::InvalidField`]
/// from the structured stage, and returns [`ExtractError::Missing`] when
/// neither stage finds anything.
pub fn extract_detail(html: &str) -> Result<ListingDetail, ExtractError> {
    if let Some(detail) = extract_structured(html)? {
        return Ok(detail);
    }
    tracing::debug!("no JSON-LD product payload; falling back to page markup");
    extract_heuristic(html).ok_or(ExtractError::Missing)
}

/// Decodes the HTML entities that show up in listing text and attributes.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    "yen" => Some('¥'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_owned(), String::from)
        })
        .into_owned()
}

/// Parses a price that may carry thousands separators or a currency sign,
/// e.g. `"12,800"` or `"¥12,800"`.
pub(crate) fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use marketlens_core::ExtractionStage;

    use super::*;

    #[test]
    fn structured_payload_takes_precedence() {
        let html = r#"<html><head>
            <meta property="og:title" content="From meta">
            <script type="application/ld+json">
              {"@type":"Product","name":"From JSON-LD","offers":{"price":"4500","priceCurrency":"JPY"}}
            </script></head></html>"#;
        let detail = extract_detail(html).unwrap();
        assert_eq!(detail.name.as_deref(), Some("From JSON-LD"));
        assert_eq!(detail.extraction, ExtractionStage::Structured);
    }

    #[test]
    fn falls_back_to_markup_when_structured_payload_is_absent() {
        let html = r#"<html><head>
            <meta property="og:title" content="Camera body">
            <meta property="product:price:amount" content="42000">
            <meta property="product:price:currency" content="JPY">
            </head></html>"#;
        let detail = extract_detail(html).unwrap();
        assert_eq!(detail.name.as_deref(), Some("Camera body"));
        assert_eq!(detail.price, Some(42_000.0));
        assert_eq!(detail.extraction, ExtractionStage::Heuristic);
    }

    #[test]
    fn broken_structured_payload_does_not_fall_back() {
        let html = r#"<html><head>
            <meta property="og:title" content="Camera body">
            <script type="application/ld+json">{"@type":"Product","name": </script>
            </head></html>"#;
        assert!(matches!(
            extract_detail(html),
            Err(ExtractError::InvalidJson(_))
        ));
    }

    #[test]
    fn empty_page_is_missing() {
        assert!(matches!(
            extract_detail("<html><body>Loading…</body></html>"),
            Err(ExtractError::Missing)
        ));
    }

    #[test]
    fn decodes_named_and_numeric_entities() {
        assert_eq!(
            decode_entities("Tom &amp; Jerry &#39;92&#x21; &lt;b&gt;"),
            "Tom & Jerry '92! <b>"
        );
        assert_eq!(decode_entities("&unknown; stays"), "&unknown; stays");
    }

    #[test]
    fn price_text_ignores_separators_and_symbols() {
        assert_eq!(parse_price_text("¥12,800"), Some(12_800.0));
        assert_eq!(parse_price_text("$1,299.50"), Some(1_299.5));
        assert_eq!(parse_price_text("free"), None);
    }
}
