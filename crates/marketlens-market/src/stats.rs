//! Descriptive statistics, price tiers, and volatility for a price sample.
//!
//! Every cut point uses the lower empirical quantile: for percentile `p` over
//! `n` ascending prices, the value is the sample member at 1-based rank
//! `max(1, floor(p·n))`. Boundaries are therefore always observed prices, so
//! `min ≤ boundary ≤ max` holds by construction.

use std::fmt;

use marketlens_core::{PriceSample, MIN_SAMPLE_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Highest quartile coefficient of dispersion still classified as stable.
pub const STABLE_MAX_QCD: f64 = 0.10;

/// Highest quartile coefficient of dispersion still classified as moderate.
pub const MODERATE_MAX_QCD: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Stable,
    Moderate,
    Volatile,
}

impl Volatility {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Volatility::Stable => "stable",
            Volatility::Moderate => "moderate",
            Volatility::Volatile => "volatile",
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a quartile coefficient of dispersion. Both thresholds are
/// inclusive.
#[must_use]
pub fn classify_qcd(qcd: f64) -> Volatility {
    if qcd <= STABLE_MAX_QCD {
        Volatility::Stable
    } else if qcd <= MODERATE_MAX_QCD {
        Volatility::Moderate
    } else {
        Volatility::Volatile
    }
}

/// Tier boundaries, all in the sample's currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTiers {
    /// 25th percentile.
    pub budget_max: f64,
    /// 25th percentile.
    pub mid_min: f64,
    /// 75th percentile.
    pub mid_max: f64,
    /// 75th percentile.
    pub premium_min: f64,
    /// 10th percentile.
    pub excellent_deal_max: f64,
    /// 40th percentile.
    pub good_deal_max: f64,
    /// 90th percentile.
    pub overpriced_min: f64,
}

impl PriceTiers {
    /// Every boundary, for invariant checks.
    #[must_use]
    pub fn boundaries(&self) -> [f64; 7] {
        [
            self.budget_max,
            self.mid_min,
            self.mid_max,
            self.premium_min,
            self.excellent_deal_max,
            self.good_deal_max,
            self.overpriced_min,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatistics {
    pub count: usize,
    pub currency: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub tiers: PriceTiers,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    /// Quartile coefficient of dispersion, `(Q3 − Q1) / (Q3 + Q1)`.
    pub qcd: f64,
    pub volatility: Volatility,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsOutcome {
    Computed(MarketStatistics),
    /// Too few prices for tiers or volatility to mean anything.
    InsufficientData { count: usize, required: usize },
}

/// Computes statistics for `sample`. Pure and deterministic; the sample is
/// not modified.
///
/// # Errors
///
/// Returns [`MarketError::ContractViolation`] if any price is negative, NaN,
/// or infinite, or if the sample mixes currencies. These are checked before
/// the size threshold.
pub fn compute_statistics(sample: &PriceSample) -> Result<StatisticsOutcome, MarketError> {
    let mut currency: Option<&str> = None;
    for point in &sample.points {
        if !point.price.is_finite() || point.price < 0.0 {
            return Err(MarketError::ContractViolation(format!(
                "price {} in sample for \"{}\" is not a non-negative finite number",
                point.price, sample.query
            )));
        }
        match currency {
            None => currency = Some(point.currency.as_str()),
            Some(c) if c.eq_ignore_ascii_case(&point.currency) => {}
            Some(c) => {
                return Err(MarketError::ContractViolation(format!(
                    "sample for \"{}\" mixes currencies {c} and {}",
                    sample.query, point.currency
                )));
            }
        }
    }

    let count = sample.len();
    let Some(currency) = currency.filter(|_| count >= MIN_SAMPLE_SIZE) else {
        tracing::debug!(query = %sample.query, count, "insufficient data for market statistics");
        return Ok(StatisticsOutcome::InsufficientData {
            count,
            required: MIN_SAMPLE_SIZE,
        });
    };

    let mut sorted: Vec<f64> = sample.points.iter().map(|p| p.price).collect();
    sorted.sort_by(f64::total_cmp);

    let q1 = lower_quantile(&sorted, 25);
    let q3 = lower_quantile(&sorted, 75);
    let iqr = q3 - q1;
    let denominator = q3 + q1;
    let qcd = if denominator > 0.0 {
        iqr / denominator
    } else {
        0.0
    };

    #[allow(clippy::cast_precision_loss)]
    let mean = sorted.iter().sum::<f64>() / count as f64;

    Ok(StatisticsOutcome::Computed(MarketStatistics {
        count,
        currency: currency.to_ascii_uppercase(),
        min: sorted[0],
        max: sorted[count - 1],
        mean,
        median: median(&sorted),
        tiers: PriceTiers {
            budget_max: q1,
            mid_min: q1,
            mid_max: q3,
            premium_min: q3,
            excellent_deal_max: lower_quantile(&sorted, 10),
            good_deal_max: lower_quantile(&sorted, 40),
            overpriced_min: lower_quantile(&sorted, 90),
        },
        q1,
        q3,
        iqr,
        qcd,
        volatility: classify_qcd(qcd),
    }))
}

/// Sample member at 1-based rank `max(1, floor(percent·n/100))`.
///
/// Integer arithmetic keeps the rank exact; `sorted` must be non-empty.
fn lower_quantile(sorted: &[f64], percent: usize) -> f64 {
    let n = sorted.len();
    let rank = (percent * n / 100).clamp(1, n);
    sorted[rank - 1]
}

/// Midpoint rule: the middle value, or the mean of the two middle values.
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    let mid = n / 2;
    if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use marketlens_core::PricePoint;

    use super::*;

    const EXAMPLE: [f64; 13] = [
        89.0, 250.0, 280.0, 294.0, 310.0, 330.0, 350.0, 387.0, 420.0, 450.0, 470.0, 500.0, 549.0,
    ];

    fn computed(prices: &[f64]) -> MarketStatistics {
        match compute_statistics(&PriceSample::from_prices("q", "USD", prices)).unwrap() {
            StatisticsOutcome::Computed(stats) => stats,
            other => panic!("expected Computed, got: {other:?}"),
        }
    }

    #[test]
    fn thirteen_item_example_is_moderate() {
        let stats = computed(&EXAMPLE);
        assert_eq!(stats.count, 13);
        assert_eq!(stats.currency, "USD");
        assert!((stats.median - 330.0).abs() < f64::EPSILON);
        assert!((stats.q1 - 280.0).abs() < f64::EPSILON);
        assert!((stats.q3 - 420.0).abs() < f64::EPSILON);
        assert!((stats.iqr - 140.0).abs() < f64::EPSILON);
        assert!((stats.qcd - 0.20).abs() < 1e-12);
        assert_eq!(stats.volatility, Volatility::Moderate);
        assert!((stats.min - 89.0).abs() < f64::EPSILON);
        assert!((stats.max - 549.0).abs() < f64::EPSILON);
    }

    #[test]
    fn thirteen_item_example_tiers() {
        let tiers = computed(&EXAMPLE).tiers;
        assert!((tiers.excellent_deal_max - 89.0).abs() < f64::EPSILON);
        assert!((tiers.budget_max - 280.0).abs() < f64::EPSILON);
        assert!((tiers.mid_min - 280.0).abs() < f64::EPSILON);
        assert!((tiers.good_deal_max - 310.0).abs() < f64::EPSILON);
        assert!((tiers.mid_max - 420.0).abs() < f64::EPSILON);
        assert!((tiers.premium_min - 420.0).abs() < f64::EPSILON);
        assert!((tiers.overpriced_min - 470.0).abs() < f64::EPSILON);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let mut shuffled = EXAMPLE;
        shuffled.reverse();
        shuffled.swap(2, 9);
        assert_eq!(computed(&shuffled), computed(&EXAMPLE));
    }

    #[test]
    fn qcd_boundaries_are_inclusive() {
        assert_eq!(classify_qcd(0.0), Volatility::Stable);
        assert_eq!(classify_qcd(0.10), Volatility::Stable);
        assert_eq!(classify_qcd(0.100_000_1), Volatility::Moderate);
        assert_eq!(classify_qcd(0.20), Volatility::Moderate);
        assert_eq!(classify_qcd(0.200_000_1), Volatility::Volatile);
    }

    #[test]
    fn sample_with_qcd_exactly_one_tenth_is_stable() {
        // n = 4: Q1 is rank 1, Q3 is rank 3.
        let stats = computed(&[90.0, 100.0, 110.0, 120.0]);
        assert!((stats.qcd - 0.10).abs() < 1e-12);
        assert_eq!(stats.volatility, Volatility::Stable);
    }

    #[test]
    fn wide_spread_is_volatile() {
        let stats = computed(&[10.0, 20.0, 200.0, 400.0]);
        assert_eq!(stats.volatility, Volatility::Volatile);
    }

    #[test]
    fn every_boundary_lies_within_observed_range() {
        let samples: [&[f64]; 4] = [
            &[5.0, 5.0, 5.0],
            &[1.0, 1_000.0, 2.0],
            &EXAMPLE,
            &[0.0, 0.0, 0.0, 12.5, 99.0, 3.0, 7.0],
        ];
        for prices in samples {
            let stats = computed(prices);
            for boundary in stats.tiers.boundaries() {
                assert!(
                    stats.min <= boundary && boundary <= stats.max,
                    "boundary {boundary} outside [{}, {}] for {prices:?}",
                    stats.min,
                    stats.max
                );
            }
        }
    }

    #[test]
    fn even_count_median_uses_midpoint() {
        let stats = computed(&[10.0, 20.0, 30.0, 40.0]);
        assert!((stats.median - 25.0).abs() < f64::EPSILON);
        assert!((stats.mean - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_zero_prices_have_zero_qcd() {
        let stats = computed(&[0.0, 0.0, 0.0]);
        assert!(stats.qcd.abs() < f64::EPSILON);
        assert_eq!(stats.volatility, Volatility::Stable);
    }

    #[test]
    fn fewer_than_three_prices_is_insufficient() {
        for prices in [&[][..], &[10.0][..], &[10.0, 20.0][..]] {
            let outcome =
                compute_statistics(&PriceSample::from_prices("q", "USD", prices)).unwrap();
            assert_eq!(
                outcome,
                StatisticsOutcome::InsufficientData {
                    count: prices.len(),
                    required: 3
                }
            );
        }
    }

    #[test]
    fn negative_price_is_a_contract_violation() {
        let sample = PriceSample::from_prices("q", "USD", &[10.0, -1.0, 20.0]);
        assert!(matches!(
            compute_statistics(&sample),
            Err(MarketError::ContractViolation(_))
        ));
    }

    #[test]
    fn non_finite_price_is_a_contract_violation() {
        for bad in [f64::NAN, f64::INFINITY] {
            let sample = PriceSample::from_prices("q", "USD", &[10.0, bad, 20.0]);
            assert!(compute_statistics(&sample).is_err());
        }
    }

    #[test]
    fn mixed_currencies_are_a_contract_violation() {
        let sample = PriceSample::new(
            "q",
            vec![
                PricePoint {
                    price: 10.0,
                    currency: "USD".to_owned(),
                },
                PricePoint {
                    price: 1_500.0,
                    currency: "JPY".to_owned(),
                },
                PricePoint {
                    price: 12.0,
                    currency: "USD".to_owned(),
                },
            ],
        );
        assert!(matches!(
            compute_statistics(&sample),
            Err(MarketError::ContractViolation(_))
        ));
    }

    #[test]
    fn repeated_computation_is_identical_and_leaves_input_untouched() {
        let sample = PriceSample::from_prices("q", "USD", &EXAMPLE);
        let before = sample.clone();
        let first = compute_statistics(&sample).unwrap();
        let second = compute_statistics(&sample).unwrap();
        assert_eq!(first, second);
        assert_eq!(sample, before);
    }
}
