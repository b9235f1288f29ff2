//! Stage one: schema.org JSON-LD product markup.

use std::sync::LazyLock;

use marketlens_core::{ExtractionStage, ListingDetail};
use regex::Regex;
use serde_json::Value;

use super::{decode_entities, parse_price_text, ExtractError};

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

const PRODUCT_TYPES: [&str; 3] = ["Product", "IndividualProduct", "ProductModel"];

/// Extracts listing detail from `<script type="application/ld+json">` blocks.
///
/// Top-level objects, arrays, and `@graph` containers are all searched; the
/// first node typed `Product`, `IndividualProduct`, or `ProductModel` wins.
///
/// Returns `Ok(None)` when the page carries no JSON-LD product at all.
///
/// # Errors
///
/// - [`ExtractError::InvalidJson`] if a block that names a product type does
///   not parse and no other block yields a product.
/// - [`ExtractError::InvalidField`] if the product carries a negative price,
///   a rating outside 0–5 after `bestRating` scaling, or a negative count.
pub fn extract_structured(html: &str) -> Result<Option<ListingDetail>, ExtractError> {
    let mut nodes: Vec<Value> = Vec::new();
    let mut parse_error: Option<serde_json::Error> = None;

    for cap in SCRIPT_RE.captures_iter(html) {
        let Some(json_text) = cap.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if json_text.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(json_text) {
            Ok(value) => collect_nodes(value, &mut nodes),
            Err(e) => {
                // Broken site-wide markup (breadcrumbs, organisation) is not
                // our concern; a broken product block is.
                if json_text.contains("Product") && parse_error.is_none() {
                    parse_error = Some(e);
                } else {
                    tracing::debug!(error = %e, "skipping unparseable JSON-LD block");
                }
            }
        }
    }

    let Some(product) = nodes.iter().find(|n| has_type(n, &PRODUCT_TYPES)) else {
        return match parse_error {
            Some(e) => Err(ExtractError::InvalidJson(e)),
            None => Ok(None),
        };
    };

    let breadcrumb = nodes.iter().find(|n| has_type(n, &["BreadcrumbList"]));
    product_to_detail(product, breadcrumb).map(Some)
}

/// Flattens top-level arrays and `@graph` containers into `out`.
fn collect_nodes(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_nodes(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(Value::Array(graph)) = map.remove("@graph") {
                for item in graph {
                    collect_nodes(item, out);
                }
            }
            if !map.is_empty() {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// `@type` may be a plain string or an array of strings, optionally
/// prefixed with a schema.org IRI.
fn has_type(node: &Value, accepted: &[&str]) -> bool {
    let matches = |s: &str| {
        let short = last_segment(s);
        accepted.iter().any(|t| short.eq_ignore_ascii_case(t))
    };
    match node.get("@type") {
        Some(Value::String(s)) => matches(s),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn product_to_detail(
    product: &Value,
    breadcrumb: Option<&Value>,
) -> Result<ListingDetail, ExtractError> {
    let offer = first_of(product.get("offers"));

    let price = match offer.and_then(|o| o.get("price").or_else(|| o.get("lowPrice"))) {
        Some(v) => Some(non_negative_number(v, "offers.price")?),
        None => None,
    };

    let seller = offer
        .and_then(|o| o.get("seller"))
        .or_else(|| product.get("seller"));
    let rating = seller
        .and_then(|s| s.get("aggregateRating"))
        .or_else(|| product.get("aggregateRating"));
    let (seller_rating, seller_review_count) = match rating {
        Some(r) => parse_rating(r)?,
        None => (None, None),
    };

    let like_count = match like_statistic(product) {
        Some(v) => Some(count(v, "interactionStatistic.userInteractionCount")?),
        None => None,
    };

    let shipping = first_of(offer.and_then(|o| o.get("shippingDetails")));

    let mut categories = category_path(product.get("category"));
    if categories.is_empty() {
        categories = breadcrumb.map(breadcrumb_path).unwrap_or_default();
    }

    Ok(ListingDetail {
        price,
        currency: offer
            .and_then(|o| text(o.get("priceCurrency")))
            .map(|c| c.to_uppercase()),
        availability: offer
            .and_then(|o| text(o.get("availability")))
            .map(|a| last_segment(&a).to_owned()),
        name: text(product.get("name")),
        image_url: image(product.get("image")),
        converted_price: None,
        description: text(product.get("description")),
        condition: offer
            .and_then(|o| text(o.get("itemCondition")))
            .or_else(|| text(product.get("itemCondition")))
            .map(|c| last_segment(&c).to_owned()),
        posted_date: ["datePosted", "datePublished", "dateCreated", "releaseDate"]
            .iter()
            .find_map(|key| {
                text(product.get(*key)).or_else(|| offer.and_then(|o| text(o.get(*key))))
            }),
        shipping_origin: shipping.and_then(|s| region(s.get("shippingOrigin"))),
        shipping_fee: shipping.and_then(|s| shipping_rate(s.get("shippingRate"))),
        seller_name: seller.and_then(|s| text(s.get("name"))),
        seller_handle: seller.and_then(|s| {
            text(s.get("alternateName")).or_else(|| text(s.get("identifier")))
        }),
        seller_review_count,
        seller_rating,
        categories,
        seller_verification: seller.and_then(|s| {
            if has_type(s, &["Organization", "OnlineStore", "Store"]) {
                Some("official".to_owned())
            } else {
                None
            }
        }),
        like_count,
        extraction: ExtractionStage::Structured,
    })
}

/// `offers`, `image`, and similar properties may be a single node or a list.
fn first_of(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let raw = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map.get("name").and_then(Value::as_str)?.to_owned(),
        _ => return None,
    };
    let decoded = decode_entities(raw.trim());
    (!decoded.is_empty()).then_some(decoded)
}

fn image(value: Option<&Value>) -> Option<String> {
    let node = first_of(value)?;
    if let Some(url) = node.as_str() {
        let url = url.trim();
        return (!url.is_empty()).then(|| url.to_owned());
    }
    text(node.get("url").or_else(|| node.get("contentUrl")))
}

fn last_segment(iri: &str) -> &str {
    iri.trim_end_matches('/').rsplit('/').next().unwrap_or(iri)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price_text(s),
        _ => None,
    }
}

fn non_negative_number(value: &Value, field: &'static str) -> Result<f64, ExtractError> {
    let n = number(value).ok_or_else(|| ExtractError::InvalidField {
        field,
        reason: format!("not a number: {value}"),
    })?;
    if !n.is_finite() || n < 0.0 {
        return Err(ExtractError::InvalidField {
            field,
            reason: format!("must be a non-negative finite number, got {n}"),
        });
    }
    Ok(n)
}

fn count(value: &Value, field: &'static str) -> Result<u32, ExtractError> {
    let n = non_negative_number(value, field)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let truncated = n.min(f64::from(u32::MAX)) as u32;
    Ok(truncated)
}

/// Returns `(rating on 0–5, review count)`.
fn parse_rating(rating: &Value) -> Result<(Option<f64>, Option<u32>), ExtractError> {
    let review_count = match rating.get("reviewCount").or_else(|| rating.get("ratingCount")) {
        Some(v) => Some(count(v, "aggregateRating.reviewCount")?),
        None => None,
    };

    let Some(raw) = rating.get("ratingValue") else {
        return Ok((None, review_count));
    };
    let value = non_negative_number(raw, "aggregateRating.ratingValue")?;
    let best = match rating.get("bestRating") {
        Some(v) => non_negative_number(v, "aggregateRating.bestRating")?,
        None => 5.0,
    };
    if best <= 0.0 {
        return Err(ExtractError::InvalidField {
            field: "aggregateRating.bestRating",
            reason: "must be positive".to_owned(),
        });
    }

    let scaled = value * 5.0 / best;
    if scaled > 5.0 {
        return Err(ExtractError::InvalidField {
            field: "aggregateRating.ratingValue",
            reason: format!("{value} exceeds bestRating {best}"),
        });
    }
    Ok((Some(scaled), review_count))
}

fn like_statistic(product: &Value) -> Option<&Value> {
    let stats = product.get("interactionStatistic")?;
    let candidates: Vec<&Value> = match stats {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    candidates
        .into_iter()
        .find(|s| {
            s.get("interactionType")
                .and_then(|t| text(Some(t)))
                .is_some_and(|t| t.ends_with("LikeAction"))
        })
        .and_then(|s| s.get("userInteractionCount"))
}

/// `category` is either `"A > B > C"` or an array of names.
fn category_path(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split('>')
            .map(|part| decode_entities(part.trim()))
            .filter(|part| !part.is_empty())
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        _ => Vec::new(),
    }
}

/// Category names from a `BreadcrumbList`, ordered by `position`.
fn breadcrumb_path(list: &Value) -> Vec<String> {
    let Some(items) = list.get("itemListElement").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut entries: Vec<(i64, String)> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let name = text(item.get("name")).or_else(|| text(item.get("item")))?;
            let position = item
                .get("position")
                .and_then(|p| p.as_i64().or_else(|| p.as_str()?.parse().ok()))
                .unwrap_or_else(|| i64::try_from(idx).unwrap_or(i64::MAX));
            Some((position, name))
        })
        .collect();
    entries.sort_by_key(|(position, _)| *position);
    entries.into_iter().map(|(_, name)| name).collect()
}

fn region(value: Option<&Value>) -> Option<String> {
    let node = first_of(value)?;
    text(node.get("addressRegion"))
        .or_else(|| text(node.get("name")))
        .or_else(|| text(node.get("addressCountry")))
}

fn shipping_rate(value: Option<&Value>) -> Option<String> {
    let rate = first_of(value)?;
    let amount = rate.get("value").and_then(number)?;
    match text(rate.get("currency")) {
        Some(currency) => Some(format!("{amount} {currency}")),
        None => Some(amount.to_string()),
    }
}
