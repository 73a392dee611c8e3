//! Console reports

use finsight_core::cashflow::{AgingReport, CashFlowStatement, Runway};
use finsight_core::contractors::{ContractorMetrics, ExpiringContract, Projection, Rollup};
use finsight_core::distribution::{DistributionPlan, ProfitDistribution};
use finsight_core::forecast::{Forecast, ForecastSource, Scenario};
use finsight_core::ledger::ProfitAndLoss;
use finsight_core::pipeline::{AttentionItem, AttentionKind, FunnelMetrics, PipelineMetrics};
use finsight_core::subscriptions::SubscriptionMetrics;
use finsight_core::{Period, RecordError};

use crate::store::StoreStats;

const WIDTH: usize = 60;

fn banner(title: &str) {
    println!("\n{}", "=".repeat(WIDTH));
    println!("{:^width$}", title, width = WIDTH);
    println!("{}\n", "=".repeat(WIDTH));
}

fn rule() {
    println!("{}", "-".repeat(WIDTH));
}

/// Truncate string for display
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn runway_label(runway: &Runway) -> String {
    match runway {
        Runway::Profitable => "profitable (not burning cash)".to_string(),
        Runway::Months(months) => format!("{:.1} months", months),
    }
}

pub fn print_skipped(skipped: &[RecordError]) {
    if skipped.is_empty() {
        return;
    }
    println!("\n{} record(s) skipped:", skipped.len());
    for error in skipped {
        println!("  {:<24} {}", truncate(&error.key, 24), error.error);
    }
}

// =============================================================================
// P&L
// =============================================================================

pub fn print_summary(pnl: &ProfitAndLoss, period: &Period) {
    banner(&format!("PROFIT & LOSS {}", period));

    println!("REVENUE");
    for (category, amount) in pnl.revenue_by_category.iter() {
        println!("  {:<36} ${:>14.2}", truncate(category, 36), amount);
    }
    println!("  {:<36} ${:>14.2}", "Total Revenue", pnl.revenue);

    println!("\nEXPENSES");
    for (category, amount) in pnl.expenses_by_category.iter() {
        println!("  {:<36} ${:>14.2}", truncate(category, 36), amount);
    }
    println!("  {:<36} ${:>14.2}", "Total Expenses", pnl.expenses);

    rule();
    println!("  {:<36} ${:>14.2}", "NET PROFIT", pnl.profit);
    println!("  {:<36} {:>14.1}%", "Margin", pnl.margin());
}

// =============================================================================
// Cash flow
// =============================================================================

fn print_aging(title: &str, report: &AgingReport) {
    println!("\n{}", title);
    for bucket in &report.buckets {
        println!(
            "  {:<10} {:>4} item(s) ${:>14.2}",
            bucket.label, bucket.count, bucket.amount
        );
    }
    println!("  {:<10} {:>13} ${:>14.2}", "Total", "", report.total);
}

pub fn print_cash_flow(statement: &CashFlowStatement) {
    banner(&format!("CASH FLOW {}", statement.period));

    let operating = &statement.operating;
    println!("  {:<36} ${:>14.2}", "Opening balance", statement.opening_balance);

    println!("\nOPERATING ACTIVITIES");
    println!("  {:<36} ${:>14.2}", "Customer receipts", operating.customer_receipts);
    println!("  {:<36} ${:>14.2}", "Contractor invoice receipts", operating.contractor_receipts);
    println!("  {:<36} ${:>14.2}", "Contractor payments", -operating.contractor_payments);
    println!("  {:<36} ${:>14.2}", "Payroll", -operating.payroll_payments);
    println!("  {:<36} ${:>14.2}", "Subscriptions", -operating.subscription_payments);
    println!("  {:<36} ${:>14.2}", "Other payments", -operating.other_payments);
    println!("  {:<36} ${:>14.2}", "Net operating cash", operating.net());

    println!("\nFINANCING ACTIVITIES");
    println!(
        "  {:<36} ${:>14.2}",
        "Partner distributions",
        statement.financing.net()
    );

    rule();
    println!("  {:<36} ${:>14.2}", "Net change in cash", statement.net_cash_change);
    println!("  {:<36} ${:>14.2}", "Closing balance", statement.closing_balance);

    let recon = &statement.reconciliation;
    println!("\nACCRUAL VS CASH");
    println!("  {:<36} ${:>14.2}", "Net income (accrual)", recon.net_income);
    println!("  {:<36} ${:>14.2}", "Revenue not yet received", recon.receivables_gap);
    println!("  {:<36} ${:>14.2}", "Expenses not yet paid", recon.payables_gap);
    println!("  {:<36} ${:>14.2}", "Cash from operations", recon.cash_from_operations);

    print_aging("RECEIVABLES AGING", &statement.receivables);
    print_aging("PAYABLES AGING", &statement.payables);

    let metrics = &statement.metrics;
    println!("\nMETRICS");
    println!("  {:<36} ${:>14.2}", "Cash position", metrics.cash_position);
    println!("  {:<36} ${:>14.2}", "Monthly burn rate", metrics.monthly_burn_rate);
    println!("  {:<36} {:>15}", "Runway", runway_label(&metrics.cash_runway));
    println!(
        "  {:<36} {:>11.1} days",
        "Days sales outstanding", metrics.days_sales_outstanding
    );
    println!(
        "  {:<36} ${:>14.2}",
        "Committed subscriptions / month", metrics.committed_monthly_subscriptions
    );
}

/// One line per period of a chained series
pub fn print_cash_flow_series(statements: &[CashFlowStatement]) {
    banner("CASH FLOW BY MONTH");
    println!(
        "{:<24} {:>14} {:>14} {:>14}",
        "Period", "Opening", "Net change", "Closing"
    );
    rule();
    for statement in statements {
        println!(
            "{:<24} {:>14.2} {:>14.2} {:>14.2}",
            statement.period.to_string(),
            statement.opening_balance,
            statement.net_cash_change,
            statement.closing_balance
        );
    }
}

// =============================================================================
// Contractors and subscriptions
// =============================================================================

fn print_rollup(title: &str, rollup: &Rollup) {
    println!("\n{}", title);
    println!(
        "  {:<18} {:>12} {:>12} {:>12} {:>7}",
        "Name", "Revenue", "Cost", "Profit", "Margin"
    );
    for row in &rollup.rows {
        println!(
            "  {:<18} {:>12.2} {:>12.2} {:>12.2} {:>6.1}%",
            truncate(&row.key, 18),
            row.revenue,
            row.cost,
            row.profit,
            row.margin
        );
    }
}

pub fn print_contractors(
    metrics: &ContractorMetrics,
    projection: &Projection,
    expiring: &[ExpiringContract],
) {
    banner("CONTRACTORS");
    println!("  {:<36} ${:>14.2}", "Revenue", metrics.total_revenue);
    println!("  {:<36} ${:>14.2}", "Cost (USD)", metrics.total_cost);
    println!("  {:<36} ${:>14.2}", "Profit", metrics.total_profit);
    println!("  {:<36} {:>14.1}%", "Margin", metrics.margin);
    println!(
        "  {:<36} {:>15}",
        "Active assignments", metrics.active_assignments
    );
    println!("  {:<36} {:>15}", "Timesheets", metrics.timesheet_count);

    print_rollup("BY CONTRACTOR", &metrics.by_contractor);
    print_rollup("BY CUSTOMER", &metrics.by_customer);

    if !projection.months.is_empty() {
        println!("\nPROJECTED (standard days)");
        for month in &projection.months {
            println!(
                "  {:<10} {:>12.2} {:>12.2} {:>12.2} {:>3} assignment(s)",
                month.month.to_string(),
                month.revenue,
                month.cost,
                month.profit,
                month.assignments
            );
        }
    }

    if !expiring.is_empty() {
        println!("\nEXPIRING CONTRACTS");
        for contract in expiring {
            println!(
                "  {:<14} {:<14} ends {} ({} days)",
                truncate(&contract.contractor_id, 14),
                truncate(&contract.customer_id, 14),
                contract.end_date,
                contract.days_remaining
            );
        }
    }

    let mut skipped = metrics.by_contractor.skipped.clone();
    skipped.extend(projection.skipped.iter().cloned());
    print_skipped(&skipped);
}

pub fn print_subscriptions(metrics: &SubscriptionMetrics) {
    banner("SUBSCRIPTIONS");
    println!("  {:<36} {:>15}", "Active", metrics.active_count);
    println!("  {:<36} ${:>14.2}", "Monthly total", metrics.monthly_total);
    println!("  {:<36} ${:>14.2}", "Annual total", metrics.annual_total);
    println!("  {:<36} ${:>14.2}", "Potential savings", metrics.potential_savings);

    if metrics.upcoming_bills.is_empty() {
        println!("\nNo bills due soon.");
        return;
    }
    println!("\nUPCOMING BILLS");
    for bill in &metrics.upcoming_bills {
        println!(
            "  {:<12} {:<24} ${:>10.2}  in {} day(s)",
            bill.billing_date,
            truncate(&bill.vendor, 24),
            bill.amount,
            bill.days_until
        );
    }
}

// =============================================================================
// Distribution
// =============================================================================

pub fn print_distribution(plan: &DistributionPlan, recorded: &[ProfitDistribution]) {
    banner("PROFIT DISTRIBUTION");
    println!("  {:<36} ${:>14.2}", "Net profit", plan.net_profit);
    println!(
        "  {:<36} ${:>14.2}",
        format!("Retained ({:.1}%)", plan.retention_percentage),
        plan.retained_amount
    );
    println!("  {:<36} ${:>14.2}", "Distributable pool", plan.distributable_pool);

    println!("\n  {:<24} {:>8} {:>14}", "Partner", "Share", "Amount");
    for allocation in &plan.allocations {
        println!(
            "  {:<24} {:>7.1}% ${:>13.2}",
            truncate(&allocation.partner_name, 24),
            allocation.share_percentage,
            allocation.amount
        );
    }
    rule();
    println!("  {:<24} {:>7.1}% ${:>13.2}", "Partners", plan.share_total, plan.partner_total());
    println!("  {:<36} ${:>14.2}", "Company pool", plan.company_pool_amount);

    if !plan.is_distributable() {
        println!(
            "\n⚠️  Active partner shares total {:.2}%; they must total 100% before distributing.",
            plan.share_total
        );
    }
    if !recorded.is_empty() {
        println!("\nRecorded {} distribution(s):", recorded.len());
        for distribution in recorded {
            println!(
                "  {:<12} {:<24} ${:>12.2}",
                distribution.id,
                truncate(&distribution.partner_name, 24),
                distribution.amount
            );
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

fn attention_label(kind: AttentionKind) -> &'static str {
    match kind {
        AttentionKind::OverdueTask => "Overdue task",
        AttentionKind::StaleReview => "Stale review",
        AttentionKind::UnstaffedRole => "Unstaffed role",
    }
}

pub fn print_pipeline(funnel: &FunnelMetrics, pipeline: &PipelineMetrics, attention: &[AttentionItem]) {
    banner("RECRUITMENT FUNNEL");
    println!("  {:<24} {:>8}", "Submissions", funnel.total);
    println!("  {:<24} {:>8}", "In review", funnel.in_review);
    println!("  {:<24} {:>8}", "Interviewing", funnel.interviewing);
    println!("  {:<24} {:>8}", "Offers", funnel.offers);
    println!("  {:<24} {:>8}", "Placements", funnel.placements);
    println!("  {:<24} {:>8}", "Rejected / withdrawn", funnel.rejected);
    for conversion in &funnel.conversions {
        println!(
            "  {:>14} -> {:<14} {:>6.1}%",
            conversion.from, conversion.to, conversion.rate
        );
    }

    banner("SALES PIPELINE");
    for stage in &pipeline.stages {
        println!(
            "  {:<14} {:>4} deal(s) ${:>14.2}",
            stage.stage.as_str(),
            stage.count,
            stage.value
        );
    }
    rule();
    println!("  {:<24} ${:>14.2}", "Open value", pipeline.open_value);
    println!("  {:<24} ${:>14.2}", "Won value", pipeline.won_value);
    println!("  {:<24} {:>14.1}%", "Win rate", pipeline.win_rate);

    if !attention.is_empty() {
        println!("\nNEEDS ATTENTION");
        for item in attention {
            println!(
                "  {:<15} {:<12} {:>4}d  {}",
                attention_label(item.kind),
                truncate(&item.id, 12),
                item.days,
                truncate(&item.description, 40)
            );
        }
    }
}

// =============================================================================
// Forecast
// =============================================================================

fn print_scenario(name: &str, scenario: &Scenario) {
    println!("\n{}", name);
    for point in &scenario.points {
        println!(
            "  {:<10} {:>14.2} {:>14.2} {:>14.2}",
            point.month.to_string(),
            point.revenue,
            point.expenses,
            point.profit
        );
    }
    println!(
        "  {:<10} {:>14.2} {:>14.2} {:>14.2}",
        "Total",
        scenario.total_revenue(),
        scenario.total_expenses(),
        scenario.total_profit()
    );
}

pub fn print_forecast(forecast: &Forecast) {
    let source = match forecast.source {
        ForecastSource::Local => "local",
        ForecastSource::Remote => "forecast service",
        ForecastSource::Fallback => "local fallback",
    };
    banner(&format!("FORECAST ({})", source));
    if let Some(error) = &forecast.service_error {
        println!("  Warning: {}", error);
    }
    println!(
        "  {:<10} {:>14} {:>14} {:>14}",
        "Month", "Revenue", "Expenses", "Profit"
    );
    print_scenario("BASE CASE", &forecast.base_case);
    print_scenario("OPTIMISTIC", &forecast.optimistic);
    print_scenario("CONSERVATIVE", &forecast.conservative);

    if !forecast.insights.is_empty() {
        println!("\nINSIGHTS");
        for insight in &forecast.insights {
            println!("  - {}", insight);
        }
    }
    if !forecast.recommendations.is_empty() {
        println!("\nRECOMMENDATIONS");
        for recommendation in &forecast.recommendations {
            println!("  - {}", recommendation);
        }
    }
}

/// One status line per change while watching
pub fn print_watch_line(changed: &[&str], statement: &CashFlowStatement, pnl: &ProfitAndLoss) {
    println!(
        "[{}] cash ${:.2} | burn ${:.2}/mo | runway {} | profit ${:.2} | AR ${:.2} | AP ${:.2}",
        changed.join(","),
        statement.metrics.cash_position,
        statement.metrics.monthly_burn_rate,
        runway_label(&statement.metrics.cash_runway),
        pnl.profit,
        statement.receivables.total,
        statement.payables.total
    );
}

pub fn print_stats(stats: &StoreStats) {
    banner("STORE");
    println!("{}", stats);
}
