//! Shopper-facing market report built from [`MarketStatistics`].

use std::fmt;
use std::fmt::Write as _;

use marketlens_core::CurrencyConverter;
use serde::Serialize;

use crate::error::MarketError;
use crate::money::format_money;
use crate::stats::{MarketStatistics, StatisticsOutcome, Volatility};

/// A price in the sample's currency alongside its display-currency value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DualPrice {
    pub native: f64,
    pub native_currency: String,
    pub display: f64,
    pub display_currency: String,
}

impl DualPrice {
    fn convert(
        amount: f64,
        native_currency: &str,
        converter: &dyn CurrencyConverter,
        display_currency: &str,
    ) -> Result<Self, MarketError> {
        Ok(Self {
            native: amount,
            native_currency: native_currency.to_owned(),
            display: converter.convert(amount, native_currency, display_currency)?,
            display_currency: display_currency.to_owned(),
        })
    }
}

impl fmt::Display for DualPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let native = format_money(self.native, &self.native_currency);
        if self
            .native_currency
            .eq_ignore_ascii_case(&self.display_currency)
        {
            f.write_str(&native)
        } else {
            write!(
                f,
                "{native} ({})",
                format_money(self.display, &self.display_currency)
            )
        }
    }
}

/// One line of guidance per price tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceGuidance {
    pub budget: String,
    pub typical: String,
    pub premium: String,
    pub excellent_deals: String,
    pub good_deals: String,
    pub avoid_overpriced: String,
    pub expected_price: String,
}

/// Price, timing, and value advice keyed on volatility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingStrategies {
    pub price: String,
    pub timing: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketReport {
    pub query: String,
    pub count: usize,
    pub summary: String,
    pub typical_price: DualPrice,
    pub range_low: DualPrice,
    pub range_high: DualPrice,
    pub volatility: Volatility,
    pub qcd: f64,
    /// Prices at or below this are good value (40th percentile).
    pub look_for_below: DualPrice,
    /// Prices above this are likely overpriced (90th percentile).
    pub avoid_above: DualPrice,
    pub guidance: PriceGuidance,
    pub strategies: ShoppingStrategies,
}

impl MarketReport {
    /// Builds the report for `stats`, expressing every price in the sample
    /// currency and in `display_currency`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Conversion`] if `converter` cannot convert from
    /// the sample currency to `display_currency`.
    pub fn build(
        query: &str,
        stats: &MarketStatistics,
        converter: &dyn CurrencyConverter,
        display_currency: &str,
    ) -> Result<Self, MarketError> {
        let display_currency = display_currency.trim().to_ascii_uppercase();
        let dual =
            |amount: f64| DualPrice::convert(amount, &stats.currency, converter, &display_currency);
        let tiers = &stats.tiers;

        let typical_price = dual(stats.median)?;
        let range_low = dual(stats.min)?;
        let range_high = dual(stats.max)?;
        let look_for_below = dual(tiers.good_deal_max)?;
        let avoid_above = dual(tiers.overpriced_min)?;
        let budget_max = dual(tiers.budget_max)?;
        let mid_min = dual(tiers.mid_min)?;
        let mid_max = dual(tiers.mid_max)?;
        let premium_min = dual(tiers.premium_min)?;
        let excellent = dual(tiers.excellent_deal_max)?;

        let guidance = PriceGuidance {
            budget: format!("For budget options, look for items under {budget_max}"),
            typical: format!("Typical prices range from {mid_min} to {mid_max}"),
            premium: format!("Premium options start around {premium_min}"),
            excellent_deals: format!("Excellent deals are items under {excellent}"),
            good_deals: format!("Good deals are items under {look_for_below}"),
            avoid_overpriced: format!("Avoid items over {avoid_above} (likely overpriced)"),
            expected_price: format!("Expect to pay around {typical_price} for typical quality"),
        };

        let (price, timing) = match stats.volatility {
            Volatility::Stable => (
                "Prices are stable. Safe to buy at typical market rates.",
                "Good time to buy. Stable pricing indicates a mature market.",
            ),
            Volatility::Moderate => (
                "Moderate price variation. Look for deals below the median.",
                "Decent time to buy. Some price variation allows for deals.",
            ),
            Volatility::Volatile => (
                "High price volatility. Wait for significant discounts.",
                "Consider waiting for price drops. High volatility suggests an unstable market.",
            ),
        };
        let strategies = ShoppingStrategies {
            price: price.to_owned(),
            timing: timing.to_owned(),
            value: format!(
                "Best value: items under {look_for_below}. Avoid: items over {avoid_above}. \
                 Typical range: {mid_min} - {mid_max}."
            ),
        };

        let summary = format!(
            "Market intelligence for {query}: Analyzed {} items. Typical price: {typical_price} \
             (range: {range_low}-{range_high}). Price volatility: {}. Recommendation: Look for \
             items under {look_for_below} for best value. Avoid items over {avoid_above}.",
            stats.count, stats.volatility
        );

        Ok(Self {
            query: query.to_owned(),
            count: stats.count,
            summary,
            typical_price,
            range_low,
            range_high,
            volatility: stats.volatility,
            qcd: stats.qcd,
            look_for_below,
            avoid_above,
            guidance,
            strategies,
        })
    }

    /// Multi-line text report for the tool layer.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "Market report: {}", self.query);
        let _ = writeln!(out, "{}", self.summary);
        let _ = writeln!(out);
        let _ = writeln!(out, "Sample size:      {}", self.count);
        let _ = writeln!(out, "Typical price:    {}", self.typical_price);
        let _ = writeln!(
            out,
            "Observed range:   {} to {}",
            self.range_low, self.range_high
        );
        let _ = writeln!(
            out,
            "Volatility:       {} (QCD {:.3})",
            self.volatility, self.qcd
        );
        let _ = writeln!(out, "Look for under:   {}", self.look_for_below);
        let _ = writeln!(out, "Avoid above:      {}", self.avoid_above);
        let _ = writeln!(out);
        let _ = writeln!(out, "Price guidance:");
        for line in [
            &self.guidance.budget,
            &self.guidance.typical,
            &self.guidance.premium,
            &self.guidance.excellent_deals,
            &self.guidance.good_deals,
            &self.guidance.avoid_overpriced,
            &self.guidance.expected_price,
        ] {
            let _ = writeln!(out, "  - {line}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Shopping strategy:");
        let _ = writeln!(out, "  - Price:  {}", self.strategies.price);
        let _ = writeln!(out, "  - Timing: {}", self.strategies.timing);
        let _ = writeln!(out, "  - Value:  {}", self.strategies.value);
        out
    }
}

/// Renders a [`StatisticsOutcome`]: the full report when statistics were
/// computed, an explicit not-enough-data message otherwise.
///
/// # Errors
///
/// Propagates [`MarketError::Conversion`] from [`MarketReport::build`].
pub fn describe(
    query: &str,
    outcome: &StatisticsOutcome,
    converter: &dyn CurrencyConverter,
    display_currency: &str,
) -> Result<String, MarketError> {
    match outcome {
        StatisticsOutcome::Computed(stats) => {
            Ok(MarketReport::build(query, stats, converter, display_currency)?.render())
        }
        StatisticsOutcome::InsufficientData { count, required } => Ok(format!(
            "Not enough comparable listings for {query}: found {count}, need at least {required}. \
             No price tiers or volatility can be given.\n"
        )),
    }
}

#[cfg(test)]
mod tests {
    use marketlens_core::{ConversionError, FixedRateConverter, PriceSample};

    use super::*;
    use crate::stats::compute_statistics;

    const EXAMPLE: [f64; 13] = [
        89.0, 250.0, 280.0, 294.0, 310.0, 330.0, 350.0, 387.0, 420.0, 450.0, 470.0, 500.0, 549.0,
    ];

    fn example_stats() -> MarketStatistics {
        match compute_statistics(&PriceSample::from_prices("switch", "USD", &EXAMPLE)).unwrap() {
            StatisticsOutcome::Computed(stats) => stats,
            other => panic!("expected Computed, got: {other:?}"),
        }
    }

    #[test]
    fn summary_sentence_names_thresholds() {
        let report = MarketReport::build(
            "Nintendo Switch OLED",
            &example_stats(),
            &FixedRateConverter::usd_only(),
            "USD",
        )
        .unwrap();
        assert_eq!(
            report.summary,
            "Market intelligence for Nintendo Switch OLED: Analyzed 13 items. Typical price: $330 \
             (range: $89-$549). Price volatility: moderate. Recommendation: Look for items under \
             $310 for best value. Avoid items over $470."
        );
    }

    #[test]
    fn prices_carry_display_currency() {
        let report = MarketReport::build(
            "switch",
            &example_stats(),
            &FixedRateConverter::usd_jpy(150.0),
            "jpy",
        )
        .unwrap();
        assert!((report.typical_price.native - 330.0).abs() < f64::EPSILON);
        assert!((report.typical_price.display - 49_500.0).abs() < 1e-9);
        assert_eq!(report.typical_price.display_currency, "JPY");
        assert_eq!(report.typical_price.to_string(), "$330 (¥49,500)");
        assert_eq!(report.avoid_above.to_string(), "$470 (¥70,500)");
    }

    #[test]
    fn strategies_follow_volatility() {
        let report = MarketReport::build(
            "switch",
            &example_stats(),
            &FixedRateConverter::usd_only(),
            "USD",
        )
        .unwrap();
        assert!(report.strategies.price.starts_with("Moderate price variation"));
        assert_eq!(
            report.strategies.value,
            "Best value: items under $310. Avoid: items over $470. Typical range: $280 - $420."
        );
        assert_eq!(
            report.guidance.budget,
            "For budget options, look for items under $280"
        );
    }

    #[test]
    fn unsupported_display_currency_fails() {
        let err = MarketReport::build(
            "switch",
            &example_stats(),
            &FixedRateConverter::usd_only(),
            "EUR",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MarketError::Conversion(ConversionError::Unsupported { .. })
        ));
    }

    #[test]
    fn render_includes_every_section() {
        let text = MarketReport::build(
            "switch",
            &example_stats(),
            &FixedRateConverter::usd_only(),
            "USD",
        )
        .unwrap()
        .render();
        for needle in [
            "Market report: switch",
            "Typical price:    $330",
            "Observed range:   $89 to $549",
            "Volatility:       moderate (QCD 0.200)",
            "Price guidance:",
            "Shopping strategy:",
            "Avoid items over $470 (likely overpriced)",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
        }
    }

    #[test]
    fn describe_reports_insufficient_data() {
        let text = describe(
            "rare lens",
            &StatisticsOutcome::InsufficientData {
                count: 2,
                required: 3,
            },
            &FixedRateConverter::usd_only(),
            "USD",
        )
        .unwrap();
        assert!(text.starts_with("Not enough comparable listings for rare lens: found 2"));
    }

    #[test]
    fn report_serializes_for_the_tool_layer() {
        let report = MarketReport::build(
            "switch",
            &example_stats(),
            &FixedRateConverter::usd_only(),
            "USD",
        )
        .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["volatility"], "moderate");
        assert_eq!(json["look_for_below"]["native"], 310.0);
    }
}
