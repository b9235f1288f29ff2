use serde::{Deserialize, Serialize};

/// Smallest sample the statistics engine will compute tiers for.
pub const MIN_SAMPLE_SIZE: usize = 3;

/// One observed comparable-listing price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub currency: String,
}

/// Prices collected for one comparable-item query, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// The comparable-item query the sample was collected for.
    pub query: String,
    pub points: Vec<PricePoint>,
}

impl PriceSample {
    #[must_use]
    pub fn new(query: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            query: query.into(),
            points,
        }
    }

    /// Builds a sample where every price shares one currency.
    #[must_use]
    pub fn from_prices(query: impl Into<String>, currency: &str, prices: &[f64]) -> Self {
        let points = prices
            .iter()
            .map(|&price| PricePoint {
                price,
                currency: currency.to_owned(),
            })
            .collect();
        Self::new(query, points)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `true` once the sample holds enough prices for tier computation.
    #[must_use]
    pub fn is_sufficient(&self) -> bool {
        self.points.len() >= MIN_SAMPLE_SIZE
    }

    /// Keeps at most `max_size` prices, dropping the latest arrivals.
    #[must_use]
    pub fn truncated(mut self, max_size: usize) -> Self {
        self.points.truncate(max_size);
        self
    }
}
