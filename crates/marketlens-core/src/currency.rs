//! Currency conversion collaborator.
//!
//! Conversion is a pure lookup owned outside this workspace; the statistics
//! report only needs the [`CurrencyConverter`] seam. [`FixedRateConverter`]
//! is the table-driven implementation the CLI wires in.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("unsupported currency conversion: {from} to {to}")]
    Unsupported { from: String, to: String },

    #[error("cannot convert non-finite amount {0}")]
    InvalidAmount(f64),
}

/// Converts an amount between two ISO 4217 currencies.
pub trait CurrencyConverter: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ConversionError::Unsupported`] when either currency is not
    /// known to the converter.
    fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, ConversionError>;
}

/// Converter backed by a fixed table of units-per-USD rates.
#[derive(Debug, Clone)]
pub struct FixedRateConverter {
    per_usd: HashMap<String, f64>,
}

impl FixedRateConverter {
    /// Creates a converter knowing only USD.
    #[must_use]
    pub fn usd_only() -> Self {
        let mut per_usd = HashMap::new();
        per_usd.insert("USD".to_owned(), 1.0);
        Self { per_usd }
    }

    /// Creates the USD/JPY converter used by the shopping assistant.
    #[must_use]
    pub fn usd_jpy(jpy_per_usd: f64) -> Self {
        Self::usd_only().with_rate("JPY", jpy_per_usd)
    }

    /// Registers `code` at `per_usd` units per US dollar.
    #[must_use]
    pub fn with_rate(mut self, code: &str, per_usd: f64) -> Self {
        self.per_usd.insert(code.to_ascii_uppercase(), per_usd);
        self
    }

    fn rate(&self, code: &str) -> Option<f64> {
        self.per_usd.get(&code.to_ascii_uppercase()).copied()
    }
}

impl CurrencyConverter for FixedRateConverter {
    fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
        if !amount.is_finite() {
            return Err(ConversionError::InvalidAmount(amount));
        }
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }
        let unsupported = || ConversionError::Unsupported {
            from: from.to_owned(),
            to: to.to_owned(),
        };
        let from_rate = self.rate(from).ok_or_else(unsupported)?;
        let to_rate = self.rate(to).ok_or_else(unsupported)?;
        Ok(amount / from_rate * to_rate)
    }
}
