use marketlens_core::ConversionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    /// The sample broke an input invariant (negative or non-finite price,
    /// mixed currencies). Never retried.
    #[error("price sample contract violation: {0}")]
    ContractViolation(String),

    #[error("currency conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}
