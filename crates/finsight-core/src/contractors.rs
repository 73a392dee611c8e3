//! Contractor assignments, timesheets and margin rollups
//!
//! A timesheet inherits its billing rates from its assignment. Derived
//! figures (days, cost, revenue, profit) are computed once when the timesheet
//! is written and must be reproducible from the raw inputs:
//!
//! ```text
//! total_days    = standard_days + overtime_days + overtime_hours / hours_per_day
//! internal_cost = total_days * internal_day_rate            (original currency)
//! cost_usd      = total_days * usd(internal_day_rate)
//! revenue       = total_days * external_day_rate            (USD)
//! profit        = revenue - cost_usd
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::constants;
use crate::currency::RateTable;
use crate::error::{BulkOutcome, FinsightError, RecordError, Result};
use crate::ledger::margin;
use crate::period::{Month, Period, days_between};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Ended,
}

/// Placement of a contractor with a customer at agreed day rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorAssignment {
    pub id: String,
    pub contractor_id: String,
    pub customer_id: String,
    pub status: AssignmentStatus,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub standard_days_per_month: f64,
    pub standard_hours_per_day: f64,
    pub internal_day_rate: f64,
    pub external_day_rate: f64,
    pub internal_currency: String,
    pub external_currency: String,
    /// Cached USD conversion of `internal_day_rate`
    #[serde(default)]
    pub internal_day_rate_usd: Option<f64>,
}

impl ContractorAssignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }

    pub fn hours_per_day(&self) -> f64 {
        if self.standard_hours_per_day > 0.0 {
            self.standard_hours_per_day
        } else {
            constants::DEFAULT_HOURS_PER_DAY
        }
    }

    pub fn days_per_month(&self) -> f64 {
        if self.standard_days_per_month > 0.0 {
            self.standard_days_per_month
        } else {
            constants::DEFAULT_DAYS_PER_MONTH
        }
    }

    /// USD cost of one day, preferring the cached conversion
    pub fn cost_per_day_usd(&self, rates: &RateTable) -> Result<f64> {
        match self.internal_day_rate_usd {
            Some(rate) => Ok(rate),
            None => rates.convert_to_usd(self.internal_day_rate, &self.internal_currency),
        }
    }

    /// Whether the assignment window (end inclusive, open when absent) touches the month
    pub fn overlaps(&self, month: Month) -> bool {
        self.start_date <= month.last_day()
            && self.end_date.is_none_or(|end| end >= month.first_day())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    NotInvoiced,
    Invoiced,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractorPaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

/// Raw inputs a timesheet's figures are derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesheetBasis {
    pub standard_days_worked: f64,
    pub overtime_days: f64,
    pub overtime_hours: f64,
    pub internal_day_rate: f64,
    pub external_day_rate: f64,
    pub internal_currency: String,
    pub external_currency: String,
}

impl TimesheetBasis {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("standard days worked", self.standard_days_worked),
            ("overtime days", self.overtime_days),
            ("overtime hours", self.overtime_hours),
            ("internal day rate", self.internal_day_rate),
            ("external day rate", self.external_day_rate),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(FinsightError::validation(format!(
                    "{} must not be negative (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Derive the persisted figures
    pub fn figures(&self, hours_per_day: f64, rates: &RateTable) -> Result<TimesheetFigures> {
        self.validate()?;
        let hours_per_day = if hours_per_day > 0.0 {
            hours_per_day
        } else {
            constants::DEFAULT_HOURS_PER_DAY
        };

        let total_days_worked =
            self.standard_days_worked + self.overtime_days + self.overtime_hours / hours_per_day;
        let exchange_rate = rates.exchange_rate(&self.internal_currency)?;
        let internal_day_rate_usd = self.internal_day_rate * exchange_rate;
        let internal_cost = total_days_worked * self.internal_day_rate;
        let internal_cost_usd = total_days_worked * internal_day_rate_usd;
        let external_revenue = total_days_worked * self.external_day_rate;

        Ok(TimesheetFigures {
            total_days_worked,
            internal_cost,
            internal_cost_usd,
            internal_day_rate_usd,
            exchange_rate,
            external_revenue,
            profit: external_revenue - internal_cost_usd,
        })
    }
}

/// Figures derived from a [`TimesheetBasis`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimesheetFigures {
    pub total_days_worked: f64,
    pub internal_cost: f64,
    pub internal_cost_usd: f64,
    pub internal_day_rate_usd: f64,
    pub exchange_rate: f64,
    pub external_revenue: f64,
    pub profit: f64,
}

/// Monthly timesheet for one assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorTimesheet {
    pub id: String,
    pub assignment_id: String,
    pub month: Month,
    #[serde(flatten)]
    pub basis: TimesheetBasis,
    #[serde(flatten)]
    pub figures: TimesheetFigures,
    #[serde(default)]
    pub invoice_status: InvoiceStatus,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_paid_date: Option<NaiveDate>,
    #[serde(default)]
    pub contractor_payment_status: ContractorPaymentStatus,
    #[serde(default)]
    pub contractor_paid_date: Option<NaiveDate>,
}

impl ContractorTimesheet {
    /// Customer cash received for this timesheet, with its date
    pub fn receipt(&self) -> Option<(NaiveDate, f64)> {
        match (self.invoice_status, self.invoice_paid_date) {
            (InvoiceStatus::Paid, Some(date)) => Some((date, self.figures.external_revenue)),
            _ => None,
        }
    }

    /// Contractor cash paid out for this timesheet, with its date
    pub fn payout(&self) -> Option<(NaiveDate, f64)> {
        match (self.contractor_payment_status, self.contractor_paid_date) {
            (ContractorPaymentStatus::Paid, Some(date)) => {
                Some((date, self.figures.internal_cost_usd))
            }
            _ => None,
        }
    }

    /// Date receivable/payable aging counts from
    pub fn aging_reference_date(&self) -> NaiveDate {
        self.invoice_date.unwrap_or_else(|| self.month.last_day())
    }
}

/// New timesheet as entered; rates default to the assignment's
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesheetInput {
    pub assignment_id: String,
    pub month: String,
    pub standard_days_worked: f64,
    #[serde(default)]
    pub overtime_days: f64,
    #[serde(default)]
    pub overtime_hours: f64,
    #[serde(default)]
    pub internal_day_rate: Option<f64>,
    #[serde(default)]
    pub external_day_rate: Option<f64>,
    #[serde(default)]
    pub internal_currency: Option<String>,
    #[serde(default)]
    pub external_currency: Option<String>,
}

/// Partial edit of a timesheet's raw inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimesheetPatch {
    pub standard_days_worked: Option<f64>,
    pub overtime_days: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub internal_day_rate: Option<f64>,
    pub external_day_rate: Option<f64>,
}

fn find_assignment<'a>(
    assignments: &'a [ContractorAssignment],
    id: &str,
) -> Result<&'a ContractorAssignment> {
    assignments
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| FinsightError::not_found("assignment", id))
}

/// Build a timesheet from entered values and its assignment
pub fn derive_timesheet(
    id: &str,
    input: &TimesheetInput,
    assignments: &[ContractorAssignment],
    rates: &RateTable,
) -> Result<ContractorTimesheet> {
    let assignment = find_assignment(assignments, &input.assignment_id)?;
    let month: Month = input.month.parse()?;

    let basis = TimesheetBasis {
        standard_days_worked: input.standard_days_worked,
        overtime_days: input.overtime_days,
        overtime_hours: input.overtime_hours,
        internal_day_rate: input
            .internal_day_rate
            .unwrap_or(assignment.internal_day_rate),
        external_day_rate: input
            .external_day_rate
            .unwrap_or(assignment.external_day_rate),
        internal_currency: input
            .internal_currency
            .clone()
            .unwrap_or_else(|| assignment.internal_currency.clone()),
        external_currency: input
            .external_currency
            .clone()
            .unwrap_or_else(|| assignment.external_currency.clone()),
    };
    let figures = basis.figures(assignment.hours_per_day(), rates)?;

    Ok(ContractorTimesheet {
        id: id.to_string(),
        assignment_id: assignment.id.clone(),
        month,
        basis,
        figures,
        invoice_status: InvoiceStatus::default(),
        invoice_date: None,
        invoice_paid_date: None,
        contractor_payment_status: ContractorPaymentStatus::default(),
        contractor_paid_date: None,
    })
}

/// Merge a partial edit onto an existing timesheet and re-derive every figure
pub fn recompute_timesheet(
    existing: &ContractorTimesheet,
    patch: &TimesheetPatch,
    assignments: &[ContractorAssignment],
    rates: &RateTable,
) -> Result<ContractorTimesheet> {
    let assignment = find_assignment(assignments, &existing.assignment_id)?;
    let old = &existing.basis;

    let basis = TimesheetBasis {
        standard_days_worked: patch
            .standard_days_worked
            .unwrap_or(old.standard_days_worked),
        overtime_days: patch.overtime_days.unwrap_or(old.overtime_days),
        overtime_hours: patch.overtime_hours.unwrap_or(old.overtime_hours),
        internal_day_rate: patch.internal_day_rate.unwrap_or(old.internal_day_rate),
        external_day_rate: patch.external_day_rate.unwrap_or(old.external_day_rate),
        internal_currency: old.internal_currency.clone(),
        external_currency: old.external_currency.clone(),
    };
    let figures = basis.figures(assignment.hours_per_day(), rates)?;

    Ok(ContractorTimesheet {
        basis,
        figures,
        ..existing.clone()
    })
}

// =============================================================================
// Rollups
// =============================================================================

/// Revenue/cost/profit for one contractor or customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginRow {
    pub key: String,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
    pub timesheets: usize,
}

/// Grouped rows plus timesheets that could not be attributed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rollup {
    pub rows: Vec<MarginRow>,
    #[serde(skip)]
    pub skipped: Vec<RecordError>,
}

#[derive(Clone, Copy)]
enum RollupKey {
    Contractor,
    Customer,
}

fn rollup(
    timesheets: &[ContractorTimesheet],
    assignments: &[ContractorAssignment],
    month: Option<Month>,
    key: RollupKey,
) -> Rollup {
    let by_id: HashMap<&str, &ContractorAssignment> =
        assignments.iter().map(|a| (a.id.as_str(), a)).collect();

    let mut sheets: Vec<&ContractorTimesheet> = timesheets
        .iter()
        .filter(|t| month.is_none_or(|m| t.month == m))
        .collect();
    sheets.sort_by(|a, b| a.id.cmp(&b.id));

    let mut groups: HashMap<String, MarginRow> = HashMap::new();
    let mut skipped = Vec::new();

    for sheet in sheets {
        let Some(assignment) = by_id.get(sheet.assignment_id.as_str()) else {
            skipped.push(RecordError {
                key: sheet.id.clone(),
                error: FinsightError::not_found("assignment", &sheet.assignment_id),
            });
            continue;
        };
        let group_key = match key {
            RollupKey::Contractor => &assignment.contractor_id,
            RollupKey::Customer => &assignment.customer_id,
        };
        let row = groups
            .entry(group_key.clone())
            .or_insert_with(|| MarginRow {
                key: group_key.clone(),
                revenue: 0.0,
                cost: 0.0,
                profit: 0.0,
                margin: 0.0,
                timesheets: 0,
            });
        row.revenue += sheet.figures.external_revenue;
        row.cost += sheet.figures.internal_cost_usd;
        row.profit += sheet.figures.profit;
        row.timesheets += 1;
    }

    let mut rows: Vec<MarginRow> = groups
        .into_values()
        .map(|mut row| {
            row.margin = margin(row.profit, row.revenue);
            row
        })
        .collect();
    rows.sort_by(|a, b| b.revenue.total_cmp(&a.revenue).then_with(|| a.key.cmp(&b.key)));

    Rollup { rows, skipped }
}

pub fn rollup_by_contractor(
    timesheets: &[ContractorTimesheet],
    assignments: &[ContractorAssignment],
    month: Option<Month>,
) -> Rollup {
    rollup(timesheets, assignments, month, RollupKey::Contractor)
}

pub fn rollup_by_customer(
    timesheets: &[ContractorTimesheet],
    assignments: &[ContractorAssignment],
    month: Option<Month>,
) -> Rollup {
    rollup(timesheets, assignments, month, RollupKey::Customer)
}

/// Headline contractor figures for a month (or all time)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContractorMetrics {
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_profit: f64,
    pub margin: f64,
    pub active_assignments: usize,
    pub timesheet_count: usize,
    pub by_contractor: Rollup,
    pub by_customer: Rollup,
}

pub fn contractor_metrics(
    assignments: &[ContractorAssignment],
    timesheets: &[ContractorTimesheet],
    month: Option<Month>,
) -> ContractorMetrics {
    let mut sheets: Vec<&ContractorTimesheet> = timesheets
        .iter()
        .filter(|t| month.is_none_or(|m| t.month == m))
        .collect();
    sheets.sort_by(|a, b| a.id.cmp(&b.id));

    let total_revenue: f64 = sheets.iter().map(|t| t.figures.external_revenue).sum();
    let total_cost: f64 = sheets.iter().map(|t| t.figures.internal_cost_usd).sum();
    let total_profit: f64 = sheets.iter().map(|t| t.figures.profit).sum();

    ContractorMetrics {
        total_revenue,
        total_cost,
        total_profit,
        margin: margin(total_profit, total_revenue),
        active_assignments: assignments.iter().filter(|a| a.is_active()).count(),
        timesheet_count: sheets.len(),
        by_contractor: rollup_by_contractor(timesheets, assignments, month),
        by_customer: rollup_by_customer(timesheets, assignments, month),
    }
}

/// Accrual revenue and USD cost of timesheets whose month touches `period`
pub fn accrual_in_period(timesheets: &[ContractorTimesheet], period: &Period) -> (f64, f64) {
    let mut sheets: Vec<&ContractorTimesheet> = timesheets
        .iter()
        .filter(|t| t.month.overlaps(period))
        .collect();
    sheets.sort_by(|a, b| a.id.cmp(&b.id));
    sheets.iter().fold((0.0, 0.0), |(revenue, cost), t| {
        (
            revenue + t.figures.external_revenue,
            cost + t.figures.internal_cost_usd,
        )
    })
}

// =============================================================================
// Projection and contract expiry
// =============================================================================

/// Expected figures for one future month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedMonth {
    pub month: Month,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin: f64,
    pub assignments: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    pub months: Vec<ProjectedMonth>,
    #[serde(skip)]
    pub skipped: Vec<RecordError>,
}

/// Standard-days revenue and cost for each of the next `months` calendar
/// months after the month containing `today`
pub fn project_future_revenue(
    assignments: &[ContractorAssignment],
    months: u32,
    today: NaiveDate,
    rates: &RateTable,
) -> Projection {
    let mut skipped = Vec::new();
    let mut active: Vec<(&ContractorAssignment, f64)> = Vec::new();

    for assignment in assignments.iter().filter(|a| a.is_active()) {
        match assignment.cost_per_day_usd(rates) {
            Ok(cost) => active.push((assignment, cost)),
            Err(error) => skipped.push(RecordError {
                key: assignment.id.clone(),
                error,
            }),
        }
    }
    active.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let mut month = Month::of(today);
    let mut projected = Vec::with_capacity(months as usize);
    for _ in 0..months {
        month = month.next();
        let mut revenue = 0.0;
        let mut cost = 0.0;
        let mut count = 0;
        for (assignment, cost_per_day) in active.iter().filter(|(a, _)| a.overlaps(month)) {
            revenue += assignment.standard_days_per_month * assignment.external_day_rate;
            cost += assignment.standard_days_per_month * cost_per_day;
            count += 1;
        }
        projected.push(ProjectedMonth {
            month,
            revenue,
            cost,
            profit: revenue - cost,
            margin: margin(revenue - cost, revenue),
            assignments: count,
        });
    }

    Projection {
        months: projected,
        skipped,
    }
}

/// Active contract ending soon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiringContract {
    pub assignment_id: String,
    pub contractor_id: String,
    pub customer_id: String,
    pub end_date: NaiveDate,
    pub days_remaining: i64,
}

/// Active assignments ending within `[today, today + threshold_days]`, soonest first
pub fn expiring_contracts(
    assignments: &[ContractorAssignment],
    today: NaiveDate,
    threshold_days: i64,
) -> Vec<ExpiringContract> {
    let mut expiring: Vec<ExpiringContract> = assignments
        .iter()
        .filter(|a| a.is_active())
        .filter_map(|a| {
            let end_date = a.end_date?;
            let days_remaining = days_between(today, end_date);
            (0..=threshold_days)
                .contains(&days_remaining)
                .then(|| ExpiringContract {
                    assignment_id: a.id.clone(),
                    contractor_id: a.contractor_id.clone(),
                    customer_id: a.customer_id.clone(),
                    end_date,
                    days_remaining,
                })
        })
        .collect();
    expiring.sort_by(|a, b| {
        a.days_remaining
            .cmp(&b.days_remaining)
            .then_with(|| a.assignment_id.cmp(&b.assignment_id))
    });
    expiring
}

// =============================================================================
// Bulk generation
// =============================================================================

/// Deterministic id of the generated timesheet for an assignment and month
pub fn timesheet_id(assignment_id: &str, month: Month) -> String {
    format!("{}-{}", assignment_id, month)
}

/// Create standard-days timesheets for every active assignment overlapping
/// `month` that does not have one yet. Failing assignments are reported and
/// skipped.
pub fn generate_monthly_timesheets(
    assignments: &[ContractorAssignment],
    existing: &[ContractorTimesheet],
    month: Month,
    rates: &RateTable,
) -> BulkOutcome<ContractorTimesheet> {
    let already: HashSet<&str> = existing
        .iter()
        .filter(|t| t.month == month)
        .map(|t| t.assignment_id.as_str())
        .collect();

    let mut outcome = BulkOutcome::default();
    for assignment in assignments
        .iter()
        .filter(|a| a.is_active() && a.overlaps(month) && !already.contains(a.id.as_str()))
    {
        let input = TimesheetInput {
            assignment_id: assignment.id.clone(),
            month: month.to_string(),
            standard_days_worked: assignment.days_per_month(),
            ..TimesheetInput::default()
        };
        let id = timesheet_id(&assignment.id, month);
        outcome.push(
            assignment.id.clone(),
            derive_timesheet(&id, &input, assignments, rates),
        );
    }
    outcome
}
