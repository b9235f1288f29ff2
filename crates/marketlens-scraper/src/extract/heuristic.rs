//! Stage two: meta tags and `data-testid` text nodes.

use std::sync::LazyLock;

use marketlens_core::{ExtractionStage, ListingDetail};
use regex::Regex;

use super::{decode_entities, parse_price_text};

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9-]*)[^>]*?(/?)>").expect("valid regex"));
static TESTID_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<[a-z][a-z0-9-]*\b[^>]*\bdata-testid\s*=\s*["']([^"']+)["'][^>]*>"#)
        .expect("valid regex")
});

static PROPERTY_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| attr_regex("property"));
static NAME_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| attr_regex("name"));
static CONTENT_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| attr_regex("content"));

const VOID_ELEMENTS: [&str; 8] = ["br", "img", "meta", "input", "hr", "link", "source", "wbr"];

/// Builds a [`ListingDetail`] from OpenGraph and product meta tags plus the
/// marketplace's `data-testid` nodes.
///
/// Returns `None` when none of the recognised markers are present.
#[must_use]
pub fn extract_heuristic(html: &str) -> Option<ListingDetail> {
    let testid = |id: &str| testid_text(html, id);

    let detail = ListingDetail {
        price: meta(html, "product:price:amount")
            .and_then(|p| parse_price_text(&p))
            .filter(|p| p.is_finite() && *p >= 0.0),
        currency: meta(html, "product:price:currency").map(|c| c.to_uppercase()),
        availability: meta(html, "product:availability"),
        name: meta(html, "og:title"),
        image_url: meta(html, "og:image"),
        converted_price: testid("converted-currency-section"),
        description: testid("description").or_else(|| meta(html, "og:description")),
        condition: testid("item-condition")
            .or_else(|| testid("商品の状態"))
            .or_else(|| meta(html, "product:condition")),
        posted_date: None,
        shipping_origin: testid("発送元の地域"),
        shipping_fee: None,
        seller_name: testid("seller-name"),
        seller_handle: None,
        seller_review_count: None,
        seller_rating: None,
        categories: Vec::new(),
        seller_verification: None,
        like_count: testid("icon-heart-button").and_then(|t| {
            let digits: String = t.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }),
        extraction: ExtractionStage::Heuristic,
    };

    let empty = ListingDetail {
        extraction: ExtractionStage::Heuristic,
        ..ListingDetail::default()
    };
    (detail != empty).then_some(detail)
}

/// Content of the first `<meta property=key>` or `<meta name=key>` tag.
fn meta(html: &str, key: &str) -> Option<String> {
    META_TAG_RE.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let matches_key = [&*PROPERTY_ATTR_RE, &*NAME_ATTR_RE]
            .into_iter()
            .any(|re| attr_value(re, tag).is_some_and(|value| value.eq_ignore_ascii_case(key)));
        if !matches_key {
            return None;
        }
        attr_value(&CONTENT_ATTR_RE, tag)
            .map(|c| decode_entities(c.trim()))
            .filter(|c| !c.is_empty())
    })
}

fn attr_regex(attr: &str) -> Regex {
    Regex::new(&format!(
        r#"(?is)(?:^|\s){attr}\s*=\s*(?:"([^"]*)"|'([^']*)')"#
    ))
    .expect("valid regex")
}

fn attr_value<'t>(re: &Regex, tag: &'t str) -> Option<&'t str> {
    re.captures(tag)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
}

/// Text content of the first element carrying `data-testid="{id}"`, with
/// nested tags stripped and `<br>` turned into newlines.
fn testid_text(html: &str, id: &str) -> Option<String> {
    let open = TESTID_TAG_RE
        .captures_iter(html)
        .find(|c| c.get(1).is_some_and(|m| m.as_str() == id))?
        .get(0)?;

    let rest = &html[open.end()..];
    let self_closing = open.as_str().ends_with("/>");
    if self_closing {
        return None;
    }

    let mut depth = 1usize;
    let mut text = String::new();
    let mut cursor = 0usize;
    for tag in TAG_RE.captures_iter(rest) {
        let Some(whole) = tag.get(0) else { continue };
        text.push_str(&rest[cursor..whole.start()]);
        cursor = whole.end();

        let closing = tag.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = tag.get(2).map_or("", |m| m.as_str()).to_ascii_lowercase();
        let explicit_self_close = tag.get(3).is_some_and(|m| !m.as_str().is_empty());

        if closing {
            depth -= 1;
            if depth == 0 {
                break;
            }
        } else if name == "br" {
            text.push('\n');
        } else if !explicit_self_close && !VOID_ELEMENTS.contains(&name.as_str()) {
            depth += 1;
        }
    }

    let cleaned = decode_entities(
        &text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    );
    (!cleaned.is_empty()).then_some(cleaned)
}
