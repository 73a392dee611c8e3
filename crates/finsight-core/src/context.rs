//! Organisation context passed explicitly to every calculator

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::currency::RateTable;
use crate::error::{FinsightError, Result};

/// Organisation the books belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Bank balance as of `last_bank_balance_update`
    #[serde(default)]
    pub bank_balance: Option<f64>,
    #[serde(default)]
    pub last_bank_balance_update: Option<NaiveDate>,
    /// Share of net profit kept by the company before partner payouts (0-100)
    #[serde(default)]
    pub retention_percentage: f64,
}

impl Organization {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            bank_balance: None,
            last_bank_balance_update: None,
            retention_percentage: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_percentage("retention percentage", self.retention_percentage)
    }
}

/// Reject percentages outside 0-100
pub fn validate_percentage(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(FinsightError::validation(format!(
            "{} must be between 0 and 100 (got {})",
            name, value
        )));
    }
    Ok(())
}

/// Tunable windows and thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub burn_window_months: u32,
    pub upcoming_bill_days: i64,
    pub expiring_contract_days: i64,
    pub review_stale_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            burn_window_months: constants::BURN_WINDOW_MONTHS,
            upcoming_bill_days: constants::UPCOMING_BILL_DAYS,
            expiring_contract_days: constants::EXPIRING_CONTRACT_DAYS,
            review_stale_days: constants::REVIEW_STALE_DAYS,
        }
    }
}

/// Everything a calculation needs besides the entity snapshots
#[derive(Debug, Clone)]
pub struct BookContext {
    pub organization: Organization,
    pub user_id: String,
    /// Reference day for aging, expiry and upcoming-bill windows
    pub today: NaiveDate,
    pub rates: RateTable,
    pub settings: Settings,
}

impl BookContext {
    pub fn new(organization: Organization, today: NaiveDate) -> Self {
        Self {
            organization,
            user_id: String::new(),
            today,
            rates: RateTable::default(),
            settings: Settings::default(),
        }
    }
}
