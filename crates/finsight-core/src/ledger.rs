//! Ledger transactions and the P&L aggregator
//!
//! Only posted transactions count toward any financial total. Draft rows are
//! kept for bookkeeping but contribute nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{FinsightError, Result};
use crate::period::{Month, Period};

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Revenue,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Draft,
    Posted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

/// Ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub status: TransactionStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Amount received/paid so far on a partial payment
    #[serde(default)]
    pub amount_paid: Option<f64>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_terms: Option<String>,
}

impl Transaction {
    pub fn is_posted(&self) -> bool {
        self.status == TransactionStatus::Posted
    }

    pub fn is_revenue(&self) -> bool {
        self.kind == TransactionType::Revenue
    }

    /// Amount still owed to or by us
    pub fn outstanding(&self) -> f64 {
        match self.payment_status {
            PaymentStatus::Paid => 0.0,
            PaymentStatus::Partial => (self.amount - self.amount_paid.unwrap_or(0.0)).max(0.0),
            PaymentStatus::Unpaid => self.amount,
        }
    }

    /// Cash that has actually moved for this entry
    pub fn cash_amount(&self) -> f64 {
        match self.payment_status {
            PaymentStatus::Paid => self.amount,
            PaymentStatus::Partial => self.amount_paid.unwrap_or(0.0).clamp(0.0, self.amount),
            PaymentStatus::Unpaid => 0.0,
        }
    }

    /// Day the cash moved, if it has
    pub fn cash_date(&self) -> Option<NaiveDate> {
        match self.payment_status {
            PaymentStatus::Paid | PaymentStatus::Partial => {
                Some(self.payment_date.unwrap_or(self.date))
            }
            PaymentStatus::Unpaid => None,
        }
    }

    /// Date receivable/payable aging counts from
    pub fn aging_reference_date(&self) -> NaiveDate {
        self.invoice_date.unwrap_or(self.date)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(FinsightError::validation("transaction id must not be empty"));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(FinsightError::validation(format!(
                "transaction {} amount must not be negative (got {})",
                self.id, self.amount
            )));
        }
        if let Some(paid) = self.amount_paid
            && (!paid.is_finite() || paid < 0.0 || paid > self.amount)
        {
            return Err(FinsightError::validation(format!(
                "transaction {} amount paid must be between 0 and {} (got {})",
                self.id, self.amount, paid
            )));
        }
        Ok(())
    }
}

/// Which rows participate in an aggregate
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AggregateFilter {
    pub fn period(period: &Period) -> Self {
        Self {
            start_date: Some(period.start),
            end_date: Some(period.end),
        }
    }

    /// Inclusive on both bounds
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Totals per category, kept in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotals(Vec<(String, f64)>);

impl CategoryTotals {
    pub fn get(&self, category: &str) -> f64 {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, amount)| *amount)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, amount)| (name.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, amount)| amount).sum()
    }
}

/// Accrual P&L for a set of transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfitAndLoss {
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
    pub revenue_by_category: CategoryTotals,
    pub expenses_by_category: CategoryTotals,
}

impl ProfitAndLoss {
    pub fn margin(&self) -> f64 {
        margin(self.profit, self.revenue)
    }
}

/// Profit as a percentage of revenue; 0 when there is no revenue
pub fn margin(profit: f64, revenue: f64) -> f64 {
    ratio_percent(profit, revenue)
}

/// `part / whole * 100`, 0 when the ratio is undefined
pub fn ratio_percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 || !whole.is_finite() || !part.is_finite() {
        return 0.0;
    }
    part / whole * 100.0
}

/// Posted rows passing the filter, in stable id order
fn posted_in<'a>(transactions: &'a [Transaction], filter: &AggregateFilter) -> Vec<&'a Transaction> {
    let mut rows: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.is_posted() && filter.matches(t.date))
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

/// Sum posted transactions into a P&L
pub fn aggregate(transactions: &[Transaction], filter: &AggregateFilter) -> ProfitAndLoss {
    let rows = posted_in(transactions, filter);

    let mut revenue = 0.0;
    let mut expenses = 0.0;
    let mut revenue_sums: HashMap<&str, f64> = HashMap::new();
    let mut expense_sums: HashMap<&str, f64> = HashMap::new();

    for tx in &rows {
        if tx.is_revenue() {
            revenue += tx.amount;
            *revenue_sums.entry(tx.category.as_str()).or_insert(0.0) += tx.amount;
        } else {
            expenses += tx.amount;
            *expense_sums.entry(tx.category.as_str()).or_insert(0.0) += tx.amount;
        }
    }

    // Display order follows the caller's input order
    let mut revenue_by_category = Vec::new();
    let mut expenses_by_category = Vec::new();
    for tx in transactions
        .iter()
        .filter(|t| t.is_posted() && filter.matches(t.date))
    {
        let (sums, ordered) = if tx.is_revenue() {
            (&mut revenue_sums, &mut revenue_by_category)
        } else {
            (&mut expense_sums, &mut expenses_by_category)
        };
        if let Some(amount) = sums.remove(tx.category.as_str()) {
            ordered.push((tx.category.clone(), amount));
        }
    }

    ProfitAndLoss {
        revenue,
        expenses,
        profit: revenue - expenses,
        revenue_by_category: CategoryTotals(revenue_by_category),
        expenses_by_category: CategoryTotals(expenses_by_category),
    }
}

/// One day of posted activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

/// Posted activity grouped by exact date, ascending
pub fn daily_series(transactions: &[Transaction], filter: &AggregateFilter) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for tx in posted_in(transactions, filter) {
        let entry = days.entry(tx.date).or_default();
        if tx.is_revenue() {
            entry.0 += tx.amount;
        } else {
            entry.1 += tx.amount;
        }
    }

    days.into_iter()
        .map(|(date, (revenue, expenses))| DailyPoint {
            date,
            revenue,
            expenses,
            profit: revenue - expenses,
        })
        .collect()
}

/// One month of posted activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: Month,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

/// Posted activity for each month in `months`, zero-filled
pub fn monthly_series(transactions: &[Transaction], months: &[Month]) -> Vec<MonthlyPoint> {
    let mut totals: HashMap<Month, (f64, f64)> = HashMap::new();

    for tx in posted_in(transactions, &AggregateFilter::default()) {
        let entry = totals.entry(Month::of(tx.date)).or_default();
        if tx.is_revenue() {
            entry.0 += tx.amount;
        } else {
            entry.1 += tx.amount;
        }
    }

    months
        .iter()
        .map(|month| {
            let (revenue, expenses) = totals.get(month).copied().unwrap_or_default();
            MonthlyPoint {
                month: *month,
                revenue,
                expenses,
                profit: revenue - expenses,
            }
        })
        .collect()
}
