//! Listing acquisition: the listing page client, the two-stage detail
//! extractor, the bounded-concurrency [`DetailFetcher`], and the comparable
//! price [`MarketSampleCollector`].

pub mod client;
pub mod collector;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod merge;
pub mod rate_limit;
pub mod search;

pub use client::{ListingClient, ListingSource};
pub use collector::{MarketSampleCollector, DEFAULT_SAMPLE_SIZE, MAX_SAMPLE_SIZE};
pub use error::{BatchError, FailureKind, FetchFailure, ScraperError};
pub use extract::{extract_detail, extract_heuristic, extract_structured, ExtractError};
pub use fetcher::{DetailBatch, DetailFetcher, DEFAULT_CONCURRENCY};
pub use merge::{merge_details, EnrichedListing};
pub use rate_limit::{RetryPolicy, MAX_ATTEMPTS};
pub use search::{ComparableSearch, SearchOutcome, SerpApiClient};
