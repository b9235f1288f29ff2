//! Market statistics over comparable-listing price samples: descriptive
//! statistics, price tiers, volatility, and the shopper-facing report.

pub mod error;
pub mod money;
pub mod report;
pub mod stats;

pub use error::MarketError;
pub use money::format_money;
pub use report::{describe, DualPrice, MarketReport, PriceGuidance, ShoppingStrategies};
pub use stats::{
    classify_qcd, compute_statistics, MarketStatistics, PriceTiers, StatisticsOutcome, Volatility,
    MODERATE_MAX_QCD, STABLE_MAX_QCD,
};
