//! Cash-flow statement with accrual reconciliation, aging and runway
//!
//! Two bases are computed over the same period:
//!
//! - accrual: posted transactions dated in the period plus timesheets whose
//!   month overlaps it, regardless of payment
//! - cash: only money that actually moved, bucketed by the day it moved
//!
//! The reconciliation block ties them together:
//!
//! ```text
//! net_income - cash_from_operations == receivables_gap - payables_gap
//! ```

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::constants;
use crate::context::BookContext;
use crate::contractors::{ContractorPaymentStatus, ContractorTimesheet, InvoiceStatus, accrual_in_period};
use crate::distribution::{ProfitDistribution, paid_in};
use crate::ledger::{AggregateFilter, PaymentStatus, Transaction, aggregate};
use crate::period::{Month, Period, days_between};
use crate::subscriptions::{Subscription, subscription_metrics};

/// Snapshots a statement is built from
#[derive(Debug, Clone, Copy, Default)]
pub struct CashFlowInputs<'a> {
    pub transactions: &'a [Transaction],
    pub timesheets: &'a [ContractorTimesheet],
    pub subscriptions: &'a [Subscription],
    pub distributions: &'a [ProfitDistribution],
}

// =============================================================================
// Activities
// =============================================================================

/// Where an expense's cash goes on the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenseClass {
    Payroll,
    Subscription,
    Other,
}

/// Classify an expense by its category name (case-insensitive)
pub fn classify_expense(category: &str) -> ExpenseClass {
    let category = category.trim().to_lowercase();
    if constants::PAYROLL_CATEGORIES.contains(&category.as_str()) {
        ExpenseClass::Payroll
    } else if constants::SUBSCRIPTION_CATEGORIES.contains(&category.as_str()) {
        ExpenseClass::Subscription
    } else {
        ExpenseClass::Other
    }
}

/// Operating cash movements; payments are positive outflows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OperatingActivities {
    pub customer_receipts: f64,
    pub contractor_receipts: f64,
    pub contractor_payments: f64,
    pub payroll_payments: f64,
    pub subscription_payments: f64,
    pub other_payments: f64,
}

impl OperatingActivities {
    pub fn receipts(&self) -> f64 {
        self.customer_receipts + self.contractor_receipts
    }

    pub fn payments(&self) -> f64 {
        self.contractor_payments
            + self.payroll_payments
            + self.subscription_payments
            + self.other_payments
    }

    pub fn net(&self) -> f64 {
        self.receipts() - self.payments()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FinancingActivities {
    /// Completed partner payouts in the period (positive outflow)
    pub partner_distributions: f64,
}

impl FinancingActivities {
    pub fn net(&self) -> f64 {
        -self.partner_distributions
    }
}

/// Cash that moved between `from` and `to` inclusive
fn cash_activity(
    inputs: &CashFlowInputs,
    from: NaiveDate,
    to: NaiveDate,
) -> (OperatingActivities, FinancingActivities) {
    let mut operating = OperatingActivities::default();
    if to < from {
        return (operating, FinancingActivities::default());
    }
    let window = Period { start: from, end: to };

    let mut transactions: Vec<&Transaction> = inputs
        .transactions
        .iter()
        .filter(|t| t.is_posted())
        .collect();
    transactions.sort_by(|a, b| a.id.cmp(&b.id));

    for tx in transactions {
        let Some(day) = tx.cash_date() else { continue };
        if !window.contains(day) {
            continue;
        }
        let amount = tx.cash_amount();
        if tx.is_revenue() {
            operating.customer_receipts += amount;
            continue;
        }
        match classify_expense(&tx.category) {
            ExpenseClass::Payroll => operating.payroll_payments += amount,
            ExpenseClass::Subscription => operating.subscription_payments += amount,
            ExpenseClass::Other => operating.other_payments += amount,
        }
    }

    let mut timesheets: Vec<&ContractorTimesheet> = inputs.timesheets.iter().collect();
    timesheets.sort_by(|a, b| a.id.cmp(&b.id));

    for sheet in timesheets {
        if let Some((day, amount)) = sheet.receipt()
            && window.contains(day)
        {
            operating.contractor_receipts += amount;
        }
        if let Some((day, amount)) = sheet.payout()
            && window.contains(day)
        {
            operating.contractor_payments += amount;
        }
    }

    let financing = FinancingActivities {
        partner_distributions: paid_in(inputs.distributions, &window),
    };
    (operating, financing)
}

/// Net cash change between `from` and `to` inclusive (zero when empty)
fn net_cash_between(inputs: &CashFlowInputs, from: NaiveDate, to: NaiveDate) -> f64 {
    let (operating, financing) = cash_activity(inputs, from, to);
    operating.net() + financing.net()
}

// =============================================================================
// Accrual and reconciliation
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccrualTotals {
    pub revenue: f64,
    pub expenses: f64,
}

impl AccrualTotals {
    pub fn net_income(&self) -> f64 {
        self.revenue - self.expenses
    }
}

/// Accrual revenue and expenses: posted transactions plus timesheets
pub fn accrual_totals(inputs: &CashFlowInputs, period: &Period) -> AccrualTotals {
    let pnl = aggregate(inputs.transactions, &AggregateFilter::period(period));
    let (contractor_revenue, contractor_cost) = accrual_in_period(inputs.timesheets, period);
    AccrualTotals {
        revenue: pnl.revenue + contractor_revenue,
        expenses: pnl.expenses + contractor_cost,
    }
}

/// How accrual income and operating cash differ
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub net_income: f64,
    pub cash_from_operations: f64,
    /// Accrual revenue not yet received
    pub receivables_gap: f64,
    /// Accrual expenses not yet paid
    pub payables_gap: f64,
}

impl Reconciliation {
    pub fn new(accrual: &AccrualTotals, operating: &OperatingActivities) -> Self {
        Self {
            net_income: accrual.net_income(),
            cash_from_operations: operating.net(),
            receivables_gap: accrual.revenue - operating.receipts(),
            payables_gap: accrual.expenses - operating.payments(),
        }
    }

    /// Amount by which the identity fails to hold; zero up to float noise
    pub fn residual(&self) -> f64 {
        (self.net_income - self.cash_from_operations)
            - (self.receivables_gap - self.payables_gap)
    }
}

// =============================================================================
// Aging
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingSource {
    Transaction,
    Timesheet,
}

/// One outstanding receivable or payable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingItem {
    pub source: AgingSource,
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub reference_date: NaiveDate,
    pub days_outstanding: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingBucket {
    pub label: &'static str,
    pub amount: f64,
    pub count: usize,
    pub items: Vec<AgingItem>,
}

/// Outstanding items split into the five aging tiers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingReport {
    pub buckets: Vec<AgingBucket>,
    pub total: f64,
}

impl AgingReport {
    fn empty() -> Self {
        Self {
            buckets: constants::AGING_LABELS
                .iter()
                .map(|label| AgingBucket {
                    label,
                    amount: 0.0,
                    count: 0,
                    items: Vec::new(),
                })
                .collect(),
            total: 0.0,
        }
    }

    pub fn bucket(&self, label: &str) -> Option<&AgingBucket> {
        self.buckets.iter().find(|b| b.label == label)
    }

    fn insert(&mut self, item: AgingItem) {
        let bucket = &mut self.buckets[bucket_index(item.days_outstanding)];
        bucket.amount += item.amount;
        bucket.count += 1;
        self.total += item.amount;
        bucket.items.push(item);
    }
}

/// Tier index for a days-outstanding value
pub fn bucket_index(days_outstanding: i64) -> usize {
    constants::AGING_UPPER_BOUNDS
        .iter()
        .position(|upper| days_outstanding <= *upper)
        .unwrap_or(constants::AGING_UPPER_BOUNDS.len())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Receivable,
    Payable,
}

fn aging(inputs: &CashFlowInputs, today: NaiveDate, side: Side) -> AgingReport {
    let mut items = Vec::new();

    for tx in inputs.transactions.iter().filter(|t| t.is_posted()) {
        if tx.is_revenue() != (side == Side::Receivable) {
            continue;
        }
        let amount = tx.outstanding();
        if tx.payment_status == PaymentStatus::Paid || amount <= 0.0 {
            continue;
        }
        let reference_date = tx.aging_reference_date();
        items.push(AgingItem {
            source: AgingSource::Transaction,
            id: tx.id.clone(),
            description: if tx.description.is_empty() {
                tx.category.clone()
            } else {
                tx.description.clone()
            },
            amount,
            reference_date,
            days_outstanding: days_between(reference_date, today).max(0),
        });
    }

    for sheet in inputs.timesheets {
        let amount = match side {
            Side::Receivable if sheet.invoice_status != InvoiceStatus::Paid => {
                sheet.figures.external_revenue
            }
            Side::Payable if sheet.contractor_payment_status != ContractorPaymentStatus::Paid => {
                sheet.figures.internal_cost_usd
            }
            _ => continue,
        };
        if amount <= 0.0 {
            continue;
        }
        let reference_date = sheet.aging_reference_date();
        items.push(AgingItem {
            source: AgingSource::Timesheet,
            id: sheet.id.clone(),
            description: format!("{} {}", sheet.assignment_id, sheet.month),
            amount,
            reference_date,
            days_outstanding: days_between(reference_date, today).max(0),
        });
    }

    items.sort_by(|a, b| {
        b.days_outstanding
            .cmp(&a.days_outstanding)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut report = AgingReport::empty();
    for item in items {
        report.insert(item);
    }
    report
}

/// Unpaid revenue and uncollected timesheet revenue as of `today`
pub fn receivables_aging(inputs: &CashFlowInputs, today: NaiveDate) -> AgingReport {
    aging(inputs, today, Side::Receivable)
}

/// Unpaid expenses and unpaid contractor costs as of `today`
pub fn payables_aging(inputs: &CashFlowInputs, today: NaiveDate) -> AgingReport {
    aging(inputs, today, Side::Payable)
}

// =============================================================================
// Metrics
// =============================================================================

/// Months of cash left at the current burn
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "months", rename_all = "snake_case")]
pub enum Runway {
    /// Not burning cash
    Profitable,
    Months(f64),
}

impl Runway {
    pub fn from_burn(cash_position: f64, monthly_burn_rate: f64) -> Self {
        if monthly_burn_rate <= 0.0 {
            Runway::Profitable
        } else {
            Runway::Months((cash_position / monthly_burn_rate).max(0.0))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CashFlowMetrics {
    pub cash_position: f64,
    pub monthly_burn_rate: f64,
    pub days_sales_outstanding: f64,
    pub cash_runway: Runway,
    pub committed_monthly_subscriptions: f64,
}

/// Average monthly operating outflow net of inflows over the `window_months`
/// calendar months ending with `last`; zero when cash is not being burned
pub fn monthly_burn_rate(inputs: &CashFlowInputs, last: Month, window_months: u32) -> f64 {
    if window_months == 0 {
        return 0.0;
    }
    let first = last.offset(1 - window_months as i32);
    let total_net: f64 = (0..window_months as i32)
        .map(|i| {
            let month = first.offset(i);
            cash_activity(inputs, month.first_day(), month.last_day())
                .0
                .net()
        })
        .sum();
    let average_burn = -total_net / f64::from(window_months);
    average_burn.max(0.0)
}

/// `total_ar / cash_revenue * days`, zero without cash revenue
pub fn days_sales_outstanding(total_ar: f64, cash_revenue: f64, period_days: i64) -> f64 {
    if cash_revenue <= 0.0 || !cash_revenue.is_finite() {
        return 0.0;
    }
    total_ar / cash_revenue * period_days as f64
}

// =============================================================================
// Statement
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowStatement {
    pub period: Period,
    pub opening_balance: f64,
    pub operating: OperatingActivities,
    pub financing: FinancingActivities,
    pub net_cash_change: f64,
    pub closing_balance: f64,
    pub accrual: AccrualTotals,
    pub reconciliation: Reconciliation,
    pub receivables: AgingReport,
    pub payables: AgingReport,
    pub metrics: CashFlowMetrics,
}

/// Bank balance at the start of `period`, rolled from the organisation's
/// last known balance through the cash that moved in between
pub fn opening_balance(inputs: &CashFlowInputs, ctx: &BookContext, period: &Period) -> f64 {
    let balance = ctx.organization.bank_balance.unwrap_or(0.0);
    let Some(as_of) = ctx.organization.last_bank_balance_update else {
        return balance;
    };
    let day_before_start = period.start - Days::new(1);
    if as_of < period.start {
        balance + net_cash_between(inputs, as_of + Days::new(1), day_before_start)
    } else {
        balance - net_cash_between(inputs, period.start, as_of)
    }
}

fn statement_from(
    inputs: &CashFlowInputs,
    ctx: &BookContext,
    period: &Period,
    opening_balance: f64,
) -> CashFlowStatement {
    let (operating, financing) = cash_activity(inputs, period.start, period.end);
    let net_cash_change = operating.net() + financing.net();
    let closing_balance = opening_balance + net_cash_change;

    let accrual = accrual_totals(inputs, period);
    let receivables = receivables_aging(inputs, ctx.today);
    let payables = payables_aging(inputs, ctx.today);

    let monthly_burn_rate = monthly_burn_rate(
        inputs,
        Month::of(period.end),
        ctx.settings.burn_window_months,
    );
    let committed_monthly_subscriptions =
        subscription_metrics(inputs.subscriptions, ctx.today, ctx.settings.upcoming_bill_days)
            .monthly_total;

    let metrics = CashFlowMetrics {
        cash_position: closing_balance,
        monthly_burn_rate,
        days_sales_outstanding: days_sales_outstanding(
            receivables.total,
            operating.receipts(),
            period.days(),
        ),
        cash_runway: Runway::from_burn(closing_balance, monthly_burn_rate),
        committed_monthly_subscriptions,
    };

    CashFlowStatement {
        period: *period,
        opening_balance,
        operating,
        financing,
        net_cash_change,
        closing_balance,
        reconciliation: Reconciliation::new(&accrual, &operating),
        accrual,
        receivables,
        payables,
        metrics,
    }
}

/// Build the statement for one period
pub fn build_statement(
    inputs: &CashFlowInputs,
    ctx: &BookContext,
    period: &Period,
) -> CashFlowStatement {
    let opening = opening_balance(inputs, ctx, period);
    statement_from(inputs, ctx, period, opening)
}

/// Statements for consecutive periods, each opening where the previous closed
pub fn build_series(
    inputs: &CashFlowInputs,
    ctx: &BookContext,
    periods: &[Period],
) -> Vec<CashFlowStatement> {
    let mut statements: Vec<CashFlowStatement> = Vec::with_capacity(periods.len());
    for period in periods {
        let opening = match statements.last() {
            Some(previous) => previous.closing_balance,
            None => opening_balance(inputs, ctx, period),
        };
        statements.push(statement_from(inputs, ctx, period, opening));
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Organization;
    use crate::contractors::tests::sheet;
    use crate::distribution::DistributionStatus;
    use crate::ledger::TransactionType;
    use crate::ledger::tests::{date, tx};
    use crate::subscriptions::{BillingCycle, SubscriptionStatus};
    use proptest::prelude::*;

    fn ctx(today: &str) -> BookContext {
        BookContext::new(Organization::new("org"), date(today))
    }

    fn unpaid(mut t: Transaction) -> Transaction {
        t.payment_status = PaymentStatus::Unpaid;
        t.payment_date = None;
        t
    }

    fn period(start: &str, end: &str) -> Period {
        Period::new(date(start), date(end)).unwrap()
    }

    #[test]
    fn test_paid_revenue_unpaid_expense_scenario() {
        let txs = vec![
            tx("r1", "2026-09-19", TransactionType::Revenue, "Consulting", 10_000.0),
            unpaid(tx("e1", "2026-09-19", TransactionType::Expense, "Rent", 4_000.0)),
        ];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let ctx = ctx("2026-10-19");
        let statement = build_statement(&inputs, &ctx, &period("2026-09-01", "2026-10-19"));

        assert_eq!(statement.accrual.net_income(), 6_000.0);
        assert_eq!(statement.operating.net(), 10_000.0);

        let bucket = statement.payables.bucket("0-30").unwrap();
        assert_eq!(bucket.amount, 4_000.0);
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.items[0].days_outstanding, 30);
        assert_eq!(statement.payables.total, 4_000.0);
        assert_eq!(statement.receivables.total, 0.0);
    }

    #[test]
    fn test_reconciliation_identity_holds() {
        let mut partial = tx("r2", "2026-09-10", TransactionType::Revenue, "A", 500.0);
        partial.payment_status = PaymentStatus::Partial;
        partial.amount_paid = Some(200.0);
        let txs = vec![
            tx("r1", "2026-09-05", TransactionType::Revenue, "A", 1_000.0),
            partial,
            unpaid(tx("e1", "2026-09-07", TransactionType::Expense, "Payroll", 300.0)),
            tx("e2", "2026-09-08", TransactionType::Expense, "Software", 50.0),
        ];
        let timesheets = vec![sheet("t1", "a1", "2026-09", 10.0)];
        let inputs = CashFlowInputs {
            transactions: &txs,
            timesheets: &timesheets,
            ..CashFlowInputs::default()
        };
        let statement = build_statement(&inputs, &ctx("2026-10-19"), &period("2026-09-01", "2026-09-30"));

        let rec = statement.reconciliation;
        assert!(rec.residual().abs() < 1e-9);
        assert_eq!(statement.operating.customer_receipts, 1_200.0);
        assert_eq!(statement.operating.subscription_payments, 50.0);
        assert_eq!(statement.operating.payroll_payments, 0.0);
        assert_eq!(rec.receivables_gap, 300.0 + 8_000.0);
    }

    #[test]
    fn test_cash_uses_payment_date() {
        let mut late = tx("r1", "2026-08-28", TransactionType::Revenue, "A", 900.0);
        late.payment_date = Some(date("2026-09-03"));
        let txs = vec![late];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let ctx = ctx("2026-10-19");
        let august = build_statement(&inputs, &ctx, &period("2026-08-01", "2026-08-31"));
        let september = build_statement(&inputs, &ctx, &period("2026-09-01", "2026-09-30"));
        assert_eq!(august.accrual.revenue, 900.0);
        assert_eq!(august.operating.customer_receipts, 0.0);
        assert_eq!(september.operating.customer_receipts, 900.0);
    }

    #[test]
    fn test_timesheet_cash_and_aging() {
        let mut invoiced = sheet("t1", "a1", "2026-08", 20.0);
        invoiced.invoice_status = InvoiceStatus::Paid;
        invoiced.invoice_paid_date = Some(date("2026-09-15"));
        invoiced.contractor_payment_status = ContractorPaymentStatus::Paid;
        invoiced.contractor_paid_date = Some(date("2026-09-01"));
        let open = sheet("t2", "a1", "2026-06", 10.0);
        let timesheets = vec![invoiced, open];
        let inputs = CashFlowInputs {
            timesheets: &timesheets,
            ..CashFlowInputs::default()
        };
        let statement = build_statement(&inputs, &ctx("2026-10-19"), &period("2026-09-01", "2026-09-30"));

        assert_eq!(statement.operating.contractor_receipts, 16_000.0);
        assert!((statement.operating.contractor_payments - 11_000.0).abs() < 1e-6);
        // June 30 to October 19
        let ar = statement.receivables.bucket("91-120").unwrap();
        assert_eq!(ar.count, 1);
        assert_eq!(ar.amount, 8_000.0);
        assert_eq!(statement.payables.buckets.iter().map(|b| b.count).sum::<usize>(), 1);
    }

    #[test]
    fn test_financing_counts_completed_distributions() {
        let paid = ProfitDistribution {
            id: "dist-000001".to_string(),
            partner_id: "p1".to_string(),
            partner_name: "Partner".to_string(),
            period_start: date("2026-07-01"),
            period_end: date("2026-09-30"),
            amount: 2_500.0,
            share_percentage: 100.0,
            distributed_at: date("2026-10-02").and_hms_opt(12, 0, 0).unwrap().and_utc(),
            status: DistributionStatus::Completed,
        };
        let pending = ProfitDistribution {
            id: "dist-000002".to_string(),
            status: DistributionStatus::Pending,
            ..paid.clone()
        };
        let distributions = vec![paid, pending];
        let inputs = CashFlowInputs {
            distributions: &distributions,
            ..CashFlowInputs::default()
        };
        let statement = build_statement(&inputs, &ctx("2026-10-19"), &period("2026-10-01", "2026-10-19"));
        assert_eq!(statement.financing.net(), -2_500.0);
        assert_eq!(statement.net_cash_change, -2_500.0);
    }

    #[test]
    fn test_opening_balance_rolls_from_balance_date() {
        let txs = vec![
            tx("r1", "2026-08-10", TransactionType::Revenue, "A", 1_000.0),
            tx("e1", "2026-09-10", TransactionType::Expense, "Rent", 400.0),
        ];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let mut ctx = ctx("2026-10-19");
        ctx.organization.bank_balance = Some(5_000.0);
        ctx.organization.last_bank_balance_update = Some(date("2026-09-30"));

        let september = build_statement(&inputs, &ctx, &period("2026-09-01", "2026-09-30"));
        assert_eq!(september.opening_balance, 5_400.0);
        assert_eq!(september.closing_balance, 5_000.0);

        ctx.organization.last_bank_balance_update = Some(date("2026-07-31"));
        let september = build_statement(&inputs, &ctx, &period("2026-09-01", "2026-09-30"));
        assert_eq!(september.opening_balance, 6_000.0);

        ctx.organization.last_bank_balance_update = None;
        let september = build_statement(&inputs, &ctx, &period("2026-09-01", "2026-09-30"));
        assert_eq!(september.opening_balance, 5_000.0);
    }

    #[test]
    fn test_series_chains_closing_to_opening() {
        let txs = vec![
            tx("r1", "2026-08-10", TransactionType::Revenue, "A", 1_000.0),
            tx("e1", "2026-09-10", TransactionType::Expense, "Rent", 400.0),
        ];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let mut ctx = ctx("2026-10-19");
        ctx.organization.bank_balance = Some(100.0);
        let periods = vec![
            Period::month("2026-08".parse().unwrap()),
            Period::month("2026-09".parse().unwrap()),
        ];
        let series = build_series(&inputs, &ctx, &periods);
        assert_eq!(series[0].closing_balance, 1_100.0);
        assert_eq!(series[1].opening_balance, 1_100.0);
        assert_eq!(series[1].closing_balance, 700.0);
    }

    #[test]
    fn test_burn_rate_and_runway() {
        let txs = vec![
            tx("e1", "2026-07-05", TransactionType::Expense, "Payroll", 3_000.0),
            tx("e2", "2026-08-05", TransactionType::Expense, "Payroll", 3_000.0),
            tx("e3", "2026-09-05", TransactionType::Expense, "Payroll", 3_000.0),
            tx("r1", "2026-09-06", TransactionType::Revenue, "A", 1_500.0),
        ];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let mut ctx = ctx("2026-10-19");
        ctx.organization.bank_balance = Some(15_000.0);
        let statement = build_statement(&inputs, &ctx, &Period::month("2026-09".parse().unwrap()));

        assert_eq!(statement.metrics.monthly_burn_rate, 2_500.0);
        assert_eq!(statement.operating.payroll_payments, 3_000.0);
        match statement.metrics.cash_runway {
            Runway::Months(months) => {
                assert!((months - statement.closing_balance / 2_500.0).abs() < 1e-9)
            }
            Runway::Profitable => panic!("expected a finite runway"),
        }
    }

    #[test]
    fn test_profitable_runway_sentinel() {
        let txs = vec![tx("r1", "2026-09-06", TransactionType::Revenue, "A", 1_500.0)];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let statement = build_statement(&inputs, &ctx("2026-10-19"), &Period::month("2026-09".parse().unwrap()));
        assert_eq!(statement.metrics.monthly_burn_rate, 0.0);
        assert_eq!(statement.metrics.cash_runway, Runway::Profitable);
    }

    #[test]
    fn test_dso_guard_and_value() {
        assert_eq!(days_sales_outstanding(5_000.0, 0.0, 30), 0.0);
        assert_eq!(days_sales_outstanding(5_000.0, 10_000.0, 30), 15.0);
    }

    #[test]
    fn test_committed_subscriptions_in_metrics() {
        let subs = vec![Subscription {
            id: "s1".to_string(),
            vendor: "Hosting".to_string(),
            category: None,
            cost: 1_200.0,
            billing_cycle: BillingCycle::Annual,
            next_billing_date: date("2027-01-01"),
            status: SubscriptionStatus::Active,
            savings_opportunity: None,
            start_date: None,
        }];
        let inputs = CashFlowInputs {
            subscriptions: &subs,
            ..CashFlowInputs::default()
        };
        let statement = build_statement(&inputs, &ctx("2026-10-19"), &Period::month("2026-09".parse().unwrap()));
        assert_eq!(statement.metrics.committed_monthly_subscriptions, 100.0);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(30), 0);
        assert_eq!(bucket_index(31), 1);
        assert_eq!(bucket_index(60), 1);
        assert_eq!(bucket_index(90), 2);
        assert_eq!(bucket_index(120), 3);
        assert_eq!(bucket_index(121), 4);
    }

    #[test]
    fn test_future_reference_date_clamps_to_zero() {
        let mut t = unpaid(tx("r1", "2026-10-01", TransactionType::Revenue, "A", 10.0));
        t.invoice_date = Some(date("2026-11-01"));
        let txs = vec![t];
        let inputs = CashFlowInputs {
            transactions: &txs,
            ..CashFlowInputs::default()
        };
        let report = receivables_aging(&inputs, date("2026-10-19"));
        assert_eq!(report.buckets[0].items[0].days_outstanding, 0);
    }

    #[test]
    fn test_expense_classification() {
        assert_eq!(classify_expense("Salaries"), ExpenseClass::Payroll);
        assert_eq!(classify_expense(" SaaS "), ExpenseClass::Subscription);
        assert_eq!(classify_expense("Travel"), ExpenseClass::Other);
    }

    proptest! {
        #[test]
        fn prop_aging_partitions_outstanding(
            rows in prop::collection::vec((0.0f64..1.0e6, 0i64..400, any::<bool>()), 0..40),
        ) {
            let today = date("2026-10-19");
            let txs: Vec<Transaction> = rows
                .iter()
                .enumerate()
                .map(|(i, (amount, age, revenue))| {
                    let kind = if *revenue { TransactionType::Revenue } else { TransactionType::Expense };
                    let mut t = unpaid(tx(&format!("t{:03}", i), "2026-10-19", kind, "A", *amount));
                    t.date = today - Days::new(*age as u64);
                    t
                })
                .collect();
            let inputs = CashFlowInputs { transactions: &txs, ..CashFlowInputs::default() };

            for report in [receivables_aging(&inputs, today), payables_aging(&inputs, today)] {
                let bucket_sum: f64 = report.buckets.iter().map(|b| b.amount).sum();
                let item_count: usize = report.buckets.iter().map(|b| b.count).sum();
                let listed: usize = report.buckets.iter().map(|b| b.items.len()).sum();
                prop_assert!((bucket_sum - report.total).abs() <= 1e-6 * report.total.max(1.0));
                prop_assert_eq!(item_count, listed);
                prop_assert_eq!(report.buckets.len(), 5);
            }

            let expected: usize = rows.iter().filter(|(amount, _, _)| *amount > 0.0).count();
            let ar = receivables_aging(&inputs, today);
            let ap = payables_aging(&inputs, today);
            let counted: usize = ar.buckets.iter().chain(ap.buckets.iter()).map(|b| b.count).sum();
            prop_assert_eq!(counted, expected);
        }
    }
}
