//! Recurring vendor subscriptions normalised to monthly and annual cost

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FinsightError, Result};
use crate::period::days_between;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Paused,
}

/// Vendor subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub vendor: String,
    #[serde(default)]
    pub category: Option<String>,
    pub cost: f64,
    pub billing_cycle: BillingCycle,
    pub next_billing_date: NaiveDate,
    pub status: SubscriptionStatus,
    /// Estimated saving if the subscription were cut or downgraded
    #[serde(default)]
    pub savings_opportunity: Option<f64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    pub fn monthly_cost(&self) -> f64 {
        match self.billing_cycle {
            BillingCycle::Monthly => self.cost,
            BillingCycle::Annual => self.cost / 12.0,
        }
    }

    pub fn annual_cost(&self) -> f64 {
        match self.billing_cycle {
            BillingCycle::Monthly => self.cost * 12.0,
            BillingCycle::Annual => self.cost,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(FinsightError::validation(format!(
                "subscription {} cost must not be negative (got {})",
                self.vendor, self.cost
            )));
        }
        Ok(())
    }
}

/// Bill due soon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingBill {
    pub subscription_id: String,
    pub vendor: String,
    pub amount: f64,
    pub billing_date: NaiveDate,
    pub days_until: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionMetrics {
    pub monthly_total: f64,
    pub annual_total: f64,
    pub active_count: usize,
    pub potential_savings: f64,
    pub upcoming_bills: Vec<UpcomingBill>,
}

/// Normalised totals over active subscriptions, plus bills due within
/// `[today, today + window_days]`
pub fn subscription_metrics(
    subscriptions: &[Subscription],
    today: NaiveDate,
    window_days: i64,
) -> SubscriptionMetrics {
    let mut active: Vec<&Subscription> = subscriptions.iter().filter(|s| s.is_active()).collect();
    active.sort_by(|a, b| a.id.cmp(&b.id));

    let mut upcoming_bills: Vec<UpcomingBill> = active
        .iter()
        .filter_map(|s| {
            let days_until = days_between(today, s.next_billing_date);
            (0..=window_days).contains(&days_until).then(|| UpcomingBill {
                subscription_id: s.id.clone(),
                vendor: s.vendor.clone(),
                amount: s.cost,
                billing_date: s.next_billing_date,
                days_until,
            })
        })
        .collect();
    upcoming_bills.sort_by(|a, b| {
        a.billing_date
            .cmp(&b.billing_date)
            .then_with(|| a.vendor.cmp(&b.vendor))
    });

    SubscriptionMetrics {
        monthly_total: active.iter().map(|s| s.monthly_cost()).sum(),
        annual_total: active.iter().map(|s| s.annual_cost()).sum(),
        active_count: active.len(),
        potential_savings: active.iter().filter_map(|s| s.savings_opportunity).sum(),
        upcoming_bills,
    }
}
