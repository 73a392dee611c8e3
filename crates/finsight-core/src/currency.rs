//! Currency conversion to the USD reporting currency
//!
//! Rates are looked up in a static table that configuration may extend.
//! Unknown codes fail loudly unless the table was built lenient.

use std::collections::HashMap;

use tracing::warn;

use crate::constants;
use crate::error::{FinsightError, Result};

/// How an unrecognised currency code is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrencyPolicy {
    /// Abort the calculation with `UnknownCurrency`
    #[default]
    Strict,
    /// Substitute the identity rate and log a warning
    Lenient,
}

/// Exchange rate lookup table (USD per one unit of currency)
#[derive(Debug, Clone)]
pub struct RateTable {
    rates: HashMap<String, f64>,
    policy: CurrencyPolicy,
}

impl Default for RateTable {
    fn default() -> Self {
        let rates = constants::DEFAULT_USD_RATES
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        Self {
            rates,
            policy: CurrencyPolicy::Strict,
        }
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl RateTable {
    /// Built-in table extended with configured overrides
    pub fn with_overrides<'a>(
        overrides: impl IntoIterator<Item = (&'a str, f64)>,
        policy: CurrencyPolicy,
    ) -> Result<Self> {
        let mut table = Self {
            policy,
            ..Self::default()
        };
        for (code, rate) in overrides {
            table.set_rate(code, rate)?;
        }
        Ok(table)
    }

    pub fn policy(&self) -> CurrencyPolicy {
        self.policy
    }

    /// Add or replace a rate
    pub fn set_rate(&mut self, code: &str, rate: f64) -> Result<()> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(FinsightError::validation("currency code must not be empty"));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(FinsightError::validation(format!(
                "exchange rate for {} must be positive (got {})",
                code, rate
            )));
        }
        if code == constants::BASE_CURRENCY && rate != 1.0 {
            return Err(FinsightError::validation("USD rate is fixed at 1.0"));
        }
        self.rates.insert(code, rate);
        Ok(())
    }

    /// USD value of one unit of `code`
    pub fn exchange_rate(&self, code: &str) -> Result<f64> {
        let normalized = normalize_code(code);
        if let Some(rate) = self.rates.get(&normalized) {
            return Ok(*rate);
        }
        match self.policy {
            CurrencyPolicy::Strict => Err(FinsightError::UnknownCurrency(normalized)),
            CurrencyPolicy::Lenient => {
                warn!(
                    "Unknown currency '{}', treating as {}",
                    normalized,
                    constants::BASE_CURRENCY
                );
                Ok(1.0)
            }
        }
    }

    /// Convert `amount` in `code` to USD
    pub fn convert_to_usd(&self, amount: f64, code: &str) -> Result<f64> {
        Ok(amount * self.exchange_rate(code)?)
    }
}
