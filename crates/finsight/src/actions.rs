//! Write paths: payments, timesheet generation and profit distribution
//!
//! Each action validates against a freshly loaded book, writes through the
//! store and returns what it wrote. Subscribers pick the change up from the
//! store's notifications.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use finsight_core::contractors::{
    ContractorPaymentStatus, ContractorTimesheet, InvoiceStatus, accrual_in_period,
    generate_monthly_timesheets,
};
use finsight_core::distribution::{
    DistributionLedger, DistributionPlan, DistributionStatus, ProfitDistribution,
    distribute_profit, period_net_profit, plan_distribution,
};
use finsight_core::ledger::{AggregateFilter, PaymentStatus, Transaction, aggregate};
use finsight_core::migrate::{
    TimesheetRecord, TransactionRecord, normalize_timesheet, normalize_transaction,
};
use finsight_core::{BookContext, BulkOutcome, FinsightError, Month, Period, RateTable};
use tracing::info;

use crate::book::Book;
use crate::constants;
use crate::store::Store;

// =============================================================================
// Payments
// =============================================================================

async fn load_transaction(store: &Store, id: &str) -> Result<Transaction> {
    let record: TransactionRecord = store
        .get(constants::TRANSACTIONS, id)
        .await?
        .ok_or_else(|| FinsightError::not_found("transaction", id))?;
    Ok(normalize_transaction(record))
}

async fn load_timesheet(store: &Store, id: &str) -> Result<ContractorTimesheet> {
    let record: TimesheetRecord = store
        .get(constants::TIMESHEETS, id)
        .await?
        .ok_or_else(|| FinsightError::not_found("timesheet", id))?;
    Ok(normalize_timesheet(record)?)
}

/// Record a payment against a transaction. Payments accumulate: without an
/// amount, or once the payments cover the full amount, the transaction
/// becomes paid; otherwise partial.
pub async fn mark_transaction_paid(
    store: &Store,
    id: &str,
    date: NaiveDate,
    amount: Option<f64>,
) -> Result<Transaction> {
    let mut transaction = load_transaction(store, id).await?;
    if transaction.payment_status == PaymentStatus::Paid {
        bail!("Transaction {} is already paid", id);
    }
    let already_paid = match transaction.payment_status {
        PaymentStatus::Partial => transaction.amount_paid.unwrap_or(0.0),
        _ => 0.0,
    };

    match amount.map(|paid| already_paid + paid) {
        Some(total) if total < transaction.amount => {
            transaction.payment_status = PaymentStatus::Partial;
            transaction.amount_paid = Some(total);
        }
        _ => {
            transaction.payment_status = PaymentStatus::Paid;
            transaction.amount_paid = None;
        }
    }
    transaction.payment_date = Some(date);
    transaction.validate()?;

    store
        .upsert(constants::TRANSACTIONS, &transaction.id, &transaction)
        .await
        .with_context(|| format!("Failed to save transaction {}", id))?;
    info!(%id, status = ?transaction.payment_status, %date, "payment recorded");
    Ok(transaction)
}

/// Customer paid the invoice for a timesheet
pub async fn mark_invoice_paid(
    store: &Store,
    id: &str,
    date: NaiveDate,
) -> Result<ContractorTimesheet> {
    let mut timesheet = load_timesheet(store, id).await?;
    timesheet.invoice_status = InvoiceStatus::Paid;
    timesheet.invoice_date.get_or_insert(date);
    timesheet.invoice_paid_date = Some(date);

    store
        .upsert(constants::TIMESHEETS, &timesheet.id, &timesheet)
        .await
        .with_context(|| format!("Failed to save timesheet {}", id))?;
    info!(%id, %date, "invoice marked paid");
    Ok(timesheet)
}

/// Contractor was paid for a timesheet
pub async fn mark_contractor_paid(
    store: &Store,
    id: &str,
    date: NaiveDate,
) -> Result<ContractorTimesheet> {
    let mut timesheet = load_timesheet(store, id).await?;
    timesheet.contractor_payment_status = ContractorPaymentStatus::Paid;
    timesheet.contractor_paid_date = Some(date);

    store
        .upsert(constants::TIMESHEETS, &timesheet.id, &timesheet)
        .await
        .with_context(|| format!("Failed to save timesheet {}", id))?;
    info!(%id, %date, "contractor marked paid");
    Ok(timesheet)
}

// =============================================================================
// Timesheets
// =============================================================================

/// Create standard-days timesheets for `month`; assignments that fail are
/// reported in the outcome
pub async fn generate_timesheets(
    store: &Store,
    month: Month,
    rates: &RateTable,
) -> Result<BulkOutcome<ContractorTimesheet>> {
    let book = Book::load(store).await?;
    let outcome = generate_monthly_timesheets(&book.assignments, &book.timesheets, month, rates);

    let documents: Vec<(String, &ContractorTimesheet)> =
        outcome.created.iter().map(|t| (t.id.clone(), t)).collect();
    let written = store
        .upsert_many(constants::TIMESHEETS, &documents)
        .await
        .context("Failed to save generated timesheets")?;
    info!(%month, written, failed = outcome.errors.len(), "timesheets generated");
    Ok(outcome)
}

// =============================================================================
// Distribution
// =============================================================================

/// Waterfall for `period` from ledger P&L plus contractor figures
pub fn distribution_plan(
    book: &Book,
    ctx: &BookContext,
    period: &Period,
) -> finsight_core::Result<DistributionPlan> {
    let pnl = aggregate(&book.transactions, &AggregateFilter::period(period));
    let (revenue, expenses) =
        period_net_profit(&pnl, accrual_in_period(&book.timesheets, period));
    plan_distribution(
        revenue,
        expenses,
        ctx.organization.retention_percentage,
        &book.partners,
    )
}

/// Plan and record one distribution per active partner. Nothing is written
/// unless active shares total 100%.
pub async fn record_distribution(
    store: &Store,
    ctx: &BookContext,
    period: &Period,
    status: DistributionStatus,
    distributed_at: DateTime<Utc>,
) -> Result<(DistributionPlan, Vec<ProfitDistribution>)> {
    let book = Book::load(store).await?;
    let plan = distribution_plan(&book, ctx, period)?;
    if plan.allocations.is_empty() {
        bail!("No active partners to distribute to");
    }

    let mut ledger = DistributionLedger::new(book.distributions);
    let created = distribute_profit(&plan, period, &mut ledger, distributed_at, status)?;

    let documents: Vec<(String, &ProfitDistribution)> =
        created.iter().map(|d| (d.id.clone(), d)).collect();
    store
        .upsert_many(constants::DISTRIBUTIONS, &documents)
        .await
        .context("Failed to save distributions")?;
    info!(
        period = %period,
        partners = created.len(),
        total = plan.partner_total(),
        "profit distributed"
    );
    Ok((plan, created))
}

// =============================================================================
// Deletes
// =============================================================================

/// Delete one record. The distribution ledger is append-only and refuses.
pub async fn delete_record(store: &Store, collection: &str, id: &str) -> Result<bool> {
    if !constants::COLLECTIONS.contains(&collection) {
        bail!(
            "Unknown collection '{}'. Use one of: {}",
            collection,
            constants::COLLECTIONS.join(", ")
        );
    }
    if collection == constants::DISTRIBUTIONS {
        bail!("Profit distributions are append-only and cannot be deleted");
    }
    let deleted = store.delete(collection, id).await?;
    info!(%collection, %id, deleted, "delete requested");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::Organization;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn seeded() -> Store {
        let store = Store::in_memory().await.unwrap();
        store
            .upsert(
                constants::TRANSACTIONS,
                "inv-1",
                &json!({"id": "inv-1", "date": "2026-09-01", "type": "revenue",
                        "category": "Consulting", "amount": 1000.0,
                        "status": "posted", "payment_status": "unpaid"}),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let store = seeded().await;

        let partial = mark_transaction_paid(&store, "inv-1", date("2026-09-10"), Some(400.0))
            .await
            .unwrap();
        assert_eq!(partial.payment_status, PaymentStatus::Partial);
        assert_eq!(partial.outstanding(), 600.0);

        mark_transaction_paid(&store, "inv-1", date("2026-09-20"), None)
            .await
            .unwrap();
        let book = Book::load(&store).await.unwrap();
        assert_eq!(book.transactions[0].payment_status, PaymentStatus::Paid);
        assert_eq!(book.transactions[0].payment_date, Some(date("2026-09-20")));

        assert!(
            mark_transaction_paid(&store, "inv-1", date("2026-09-21"), Some(1.0))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_partial_payments_accumulate() {
        let store = seeded().await;

        let first = mark_transaction_paid(&store, "inv-1", date("2026-09-10"), Some(400.0))
            .await
            .unwrap();
        assert_eq!(first.amount_paid, Some(400.0));

        let second = mark_transaction_paid(&store, "inv-1", date("2026-09-15"), Some(300.0))
            .await
            .unwrap();
        assert_eq!(second.payment_status, PaymentStatus::Partial);
        assert_eq!(second.amount_paid, Some(700.0));
        assert_eq!(second.outstanding(), 300.0);

        let last = mark_transaction_paid(&store, "inv-1", date("2026-09-30"), Some(300.0))
            .await
            .unwrap();
        assert_eq!(last.payment_status, PaymentStatus::Paid);
        assert_eq!(last.outstanding(), 0.0);
    }

    #[tokio::test]
    async fn test_missing_transaction_not_found() {
        let store = Store::in_memory().await.unwrap();
        let err = mark_transaction_paid(&store, "nope", date("2026-09-10"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FinsightError>(),
            Some(FinsightError::NotFound { kind: "transaction", .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_and_settle_timesheet() {
        let store = Store::in_memory().await.unwrap();
        store
            .upsert(
                constants::ASSIGNMENTS,
                "a1",
                &json!({"id": "a1", "contractor_id": "c1", "customer_id": "k1",
                        "status": "active", "start_date": "2026-01-01",
                        "standard_days_per_month": 20.0, "standard_hours_per_day": 8.0,
                        "internal_day_rate": 500.0, "external_day_rate": 800.0,
                        "internal_currency": "EUR", "external_currency": "USD"}),
            )
            .await
            .unwrap();
        let month: Month = "2026-09".parse().unwrap();
        let rates = RateTable::default();

        let outcome = generate_timesheets(&store, month, &rates).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
        let again = generate_timesheets(&store, month, &rates).await.unwrap();
        assert!(again.created.is_empty());

        let id = outcome.created[0].id.clone();
        mark_invoice_paid(&store, &id, date("2026-10-05")).await.unwrap();
        let paid = mark_contractor_paid(&store, &id, date("2026-10-06")).await.unwrap();
        assert_eq!(paid.invoice_status, InvoiceStatus::Paid);
        assert_eq!(paid.invoice_date, Some(date("2026-10-05")));
        assert_eq!(paid.receipt(), Some((date("2026-10-05"), 16_000.0)));
        assert!(paid.payout().is_some());
    }

    #[tokio::test]
    async fn test_record_distribution_requires_full_shares() {
        let store = seeded().await;
        mark_transaction_paid(&store, "inv-1", date("2026-09-05"), None)
            .await
            .unwrap();
        for (id, share) in [("p1", 60.0), ("p2", 30.0)] {
            store
                .upsert(
                    constants::PARTNERS,
                    id,
                    &json!({"id": id, "name": id, "share_percentage": share, "status": "active"}),
                )
                .await
                .unwrap();
        }
        let mut org = Organization::new("acme");
        org.retention_percentage = 20.0;
        let ctx = BookContext::new(org, date("2026-10-19"));
        let period = Period::month("2026-09".parse().unwrap());
        let at = Utc::now();

        let err = record_distribution(&store, &ctx, &period, DistributionStatus::Completed, at)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("90%"));
        assert!(Book::load(&store).await.unwrap().distributions.is_empty());

        store
            .upsert(
                constants::PARTNERS,
                "p2",
                &json!({"id": "p2", "name": "p2", "share_percentage": 40.0, "status": "active"}),
            )
            .await
            .unwrap();
        let (plan, created) =
            record_distribution(&store, &ctx, &period, DistributionStatus::Completed, at)
                .await
                .unwrap();
        assert_eq!(plan.net_profit, 1000.0);
        assert_eq!(created.len(), 2);
        assert!((created[0].amount - 480.0).abs() < 1e-9);
        assert_eq!(Book::load(&store).await.unwrap().distributions.len(), 2);
    }

    #[tokio::test]
    async fn test_distribution_ledger_is_append_only() {
        let store = seeded().await;
        mark_transaction_paid(&store, "inv-1", date("2026-09-05"), None)
            .await
            .unwrap();
        store
            .upsert(
                constants::PARTNERS,
                "p1",
                &json!({"id": "p1", "name": "p1", "share_percentage": 100.0, "status": "active"}),
            )
            .await
            .unwrap();
        let ctx = BookContext::new(Organization::new("acme"), date("2026-10-19"));
        let period = Period::month("2026-09".parse().unwrap());
        let at = Utc::now();

        for _ in 0..2 {
            record_distribution(&store, &ctx, &period, DistributionStatus::Completed, at)
                .await
                .unwrap();
        }
        assert!(
            delete_record(&store, constants::DISTRIBUTIONS, "dist-000001")
                .await
                .is_err()
        );
        assert!(delete_record(&store, "nope", "x").await.is_err());

        // A record removed behind the CLI's back still never has its id reused
        store.delete(constants::DISTRIBUTIONS, "dist-000001").await.unwrap();
        let (_, created) =
            record_distribution(&store, &ctx, &period, DistributionStatus::Completed, at)
                .await
                .unwrap();
        assert_eq!(created[0].id, "dist-000003");
        assert_eq!(Book::load(&store).await.unwrap().distributions.len(), 2);

        assert!(delete_record(&store, constants::PARTNERS, "p1").await.unwrap());
    }
}
