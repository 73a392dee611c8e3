//! Configuration for the FinSight host

use anyhow::{Context, Result};
use chrono::NaiveDate;
use finsight_core::constants as core_constants;
use finsight_core::{CurrencyPolicy, Organization, RateTable, Settings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// File-based Configuration (finsight.toml)
// =============================================================================

/// Configuration loaded from finsight.toml
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub cash_flow: CashFlowConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

/// Organisation section
#[derive(Debug, Deserialize)]
pub struct OrganizationConfig {
    #[serde(default = "default_org_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bank_balance: Option<f64>,
    #[serde(default)]
    pub bank_balance_date: Option<NaiveDate>,
    #[serde(default)]
    pub retention_percentage: f64,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            id: default_org_id(),
            name: String::new(),
            bank_balance: None,
            bank_balance_date: None,
            retention_percentage: 0.0,
        }
    }
}

fn default_org_id() -> String {
    "default".to_string()
}

/// Currency section
#[derive(Debug, Deserialize)]
pub struct CurrencyConfig {
    /// Fail on unknown currency codes instead of assuming USD
    #[serde(default = "default_true")]
    pub strict: bool,
    /// USD per one unit, merged over the built-in table
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            strict: true,
            rates: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Cash-flow windows and thresholds
#[derive(Debug, Deserialize)]
pub struct CashFlowConfig {
    #[serde(default = "default_burn_window")]
    pub burn_window_months: u32,
    #[serde(default = "default_upcoming_bill_days")]
    pub upcoming_bill_days: i64,
    #[serde(default = "default_expiring_contract_days")]
    pub expiring_contract_days: i64,
    #[serde(default = "default_review_stale_days")]
    pub review_stale_days: i64,
}

impl Default for CashFlowConfig {
    fn default() -> Self {
        Self {
            burn_window_months: default_burn_window(),
            upcoming_bill_days: default_upcoming_bill_days(),
            expiring_contract_days: default_expiring_contract_days(),
            review_stale_days: default_review_stale_days(),
        }
    }
}

fn default_burn_window() -> u32 {
    core_constants::BURN_WINDOW_MONTHS
}

fn default_upcoming_bill_days() -> i64 {
    core_constants::UPCOMING_BILL_DAYS
}

fn default_expiring_contract_days() -> i64 {
    core_constants::EXPIRING_CONTRACT_DAYS
}

fn default_review_stale_days() -> i64 {
    core_constants::REVIEW_STALE_DAYS
}

/// Remote forecast service
#[derive(Debug, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_forecast_months")]
    pub months: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            months: default_forecast_months(),
        }
    }
}

fn default_forecast_months() -> u32 {
    core_constants::FORECAST_DEFAULT_MONTHS
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Forecast service endpoint and credentials
#[derive(Debug, Clone)]
pub struct ForecastService {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub organization: Organization,
    pub rates: RateTable,
    pub settings: Settings,
    /// Unset means the local forecast is always used
    pub forecast_service: Option<ForecastService>,
    pub forecast_months: u32,
}

impl Config {
    /// Validate the file config and lift it into runtime values
    pub fn from_file(file_config: &FileConfig) -> Result<Self> {
        let org = &file_config.organization;
        let organization = Organization {
            id: org.id.clone(),
            name: org.name.clone(),
            bank_balance: org.bank_balance,
            last_bank_balance_update: org.bank_balance_date,
            retention_percentage: org.retention_percentage,
        };
        organization
            .validate()
            .context("Invalid [organization] section")?;

        let policy = if file_config.currency.strict {
            CurrencyPolicy::Strict
        } else {
            CurrencyPolicy::Lenient
        };
        let rates = RateTable::with_overrides(
            file_config
                .currency
                .rates
                .iter()
                .map(|(code, rate)| (code.as_str(), *rate)),
            policy,
        )
        .context("Invalid [currency.rates] entry")?;

        let cash_flow = &file_config.cash_flow;
        if cash_flow.burn_window_months == 0 {
            anyhow::bail!("[cash_flow] burn_window_months must be at least 1");
        }
        for (name, days) in [
            ("upcoming_bill_days", cash_flow.upcoming_bill_days),
            ("expiring_contract_days", cash_flow.expiring_contract_days),
            ("review_stale_days", cash_flow.review_stale_days),
        ] {
            if days < 0 {
                anyhow::bail!("[cash_flow] {} must not be negative (got {})", name, days);
            }
        }
        let settings = Settings {
            burn_window_months: cash_flow.burn_window_months,
            upcoming_bill_days: cash_flow.upcoming_bill_days,
            expiring_contract_days: cash_flow.expiring_contract_days,
            review_stale_days: cash_flow.review_stale_days,
        };

        let forecast_service = file_config
            .forecast
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|endpoint| ForecastService {
                endpoint: endpoint.to_string(),
                api_key: file_config.forecast.api_key.clone(),
            });

        Ok(Self {
            organization,
            rates,
            settings,
            forecast_service,
            forecast_months: file_config.forecast.months,
        })
    }
}
