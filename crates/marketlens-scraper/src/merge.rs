//! Joins search-result summaries with a fetched [`DetailBatch`].

use std::collections::HashSet;

use marketlens_core::{ListingDetail, ListingSummary};
use serde::Serialize;

use crate::error::FetchFailure;
use crate::fetcher::DetailBatch;

/// A summary enriched with whatever the detail fetch produced for it.
///
/// `summary` already carries the detail overrides (price, currency, name,
/// image). Exactly one of `detail` and `failure` is set when the listing was
/// part of the batch; both are `None` when it was not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedListing {
    pub summary: ListingSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ListingDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FetchFailure>,
}

/// Merges `batch` into `summaries`, dropping repeated listing ids (the first
/// occurrence is kept) and preserving the input order otherwise.
#[must_use]
pub fn merge_details(summaries: &[ListingSummary], batch: &DetailBatch) -> Vec<EnrichedListing> {
    let mut seen = HashSet::new();
    summaries
        .iter()
        .filter(|s| seen.insert(s.id.as_str()))
        .map(|summary| match batch.get(&summary.id) {
            Some(Ok(detail)) => EnrichedListing {
                summary: summary.with_detail(detail),
                detail: Some(detail.clone()),
                failure: None,
            },
            Some(Err(failure)) => EnrichedListing {
                summary: summary.clone(),
                detail: None,
                failure: Some(failure.clone()),
            },
            None => EnrichedListing {
                summary: summary.clone(),
                detail: None,
                failure: None,
            },
        })
        .collect()
}
