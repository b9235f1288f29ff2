pub mod app_config;
pub mod config;
pub mod currency;
pub mod listing;
pub mod sample;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use currency::{ConversionError, CurrencyConverter, FixedRateConverter};
pub use listing::{ExtractionStage, ListingDetail, ListingSummary};
pub use sample::{PricePoint, PriceSample, MIN_SAMPLE_SIZE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
