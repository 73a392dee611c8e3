//! Read-time normalisation of stored records
//!
//! Older timesheets predate multi-currency support and carry no currency or
//! USD figures; older transactions may lack a status or payment date. These
//! wire shapes are lifted into the current model once, at the boundary, so
//! calculators never see optional legacy fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::contractors::{
    ContractorPaymentStatus, ContractorTimesheet, InvoiceStatus, TimesheetBasis,
    TimesheetFigures,
};
use crate::error::{FinsightError, Result};
use crate::ledger::{PaymentStatus, Transaction, TransactionStatus, TransactionType};
use crate::period::Month;

/// Timesheet as stored, possibly in a legacy shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesheetRecord {
    pub id: String,
    pub assignment_id: String,
    pub month: String,
    pub standard_days_worked: f64,
    pub overtime_days: f64,
    pub overtime_hours: f64,
    pub internal_day_rate: f64,
    pub external_day_rate: f64,
    pub internal_currency: Option<String>,
    pub external_currency: Option<String>,
    pub total_days_worked: f64,
    pub internal_cost: f64,
    pub internal_cost_usd: Option<f64>,
    pub internal_day_rate_usd: Option<f64>,
    pub exchange_rate: Option<f64>,
    pub external_revenue: f64,
    pub profit: Option<f64>,
    pub invoice_status: InvoiceStatus,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_paid_date: Option<NaiveDate>,
    pub contractor_payment_status: ContractorPaymentStatus,
    pub contractor_paid_date: Option<NaiveDate>,
}

fn present(code: &Option<String>) -> Option<&str> {
    code.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

/// Lift a stored timesheet into the current shape
///
/// A record without an internal currency predates currencies and is USD, so
/// its original-currency figures are its USD figures. A record that names a
/// currency keeps it, known or not; a missing rate is recovered from the
/// stored USD figures. Paid sheets without a paid date are dated at invoice,
/// or at month end when never invoiced.
pub fn normalize_timesheet(record: TimesheetRecord) -> Result<ContractorTimesheet> {
    let month: Month = record.month.parse()?;
    let legacy = present(&record.internal_currency).is_none();

    let internal_currency = present(&record.internal_currency)
        .unwrap_or(constants::BASE_CURRENCY)
        .to_string();
    let external_currency = present(&record.external_currency)
        .unwrap_or(constants::BASE_CURRENCY)
        .to_string();

    let exchange_rate = match (record.exchange_rate, implied_rate(&record)) {
        (Some(rate), _) => rate,
        (None, _) if legacy => 1.0,
        (None, Some(rate)) => rate,
        (None, None) => {
            return Err(FinsightError::validation(format!(
                "timesheet {} names currency {} but has no exchange rate",
                record.id, internal_currency
            )));
        }
    };
    let internal_cost_usd = record
        .internal_cost_usd
        .unwrap_or(record.internal_cost * exchange_rate);
    let internal_day_rate_usd = record
        .internal_day_rate_usd
        .unwrap_or(record.internal_day_rate * exchange_rate);

    let invoice_paid_date = match record.invoice_status {
        InvoiceStatus::Paid => record
            .invoice_paid_date
            .or(record.invoice_date)
            .or(Some(month.last_day())),
        _ => record.invoice_paid_date,
    };
    let contractor_paid_date = match record.contractor_payment_status {
        ContractorPaymentStatus::Paid => record.contractor_paid_date.or(Some(month.last_day())),
        _ => record.contractor_paid_date,
    };

    Ok(ContractorTimesheet {
        id: record.id,
        assignment_id: record.assignment_id,
        month,
        basis: TimesheetBasis {
            standard_days_worked: record.standard_days_worked,
            overtime_days: record.overtime_days,
            overtime_hours: record.overtime_hours,
            internal_day_rate: record.internal_day_rate,
            external_day_rate: record.external_day_rate,
            internal_currency,
            external_currency,
        },
        figures: TimesheetFigures {
            total_days_worked: record.total_days_worked,
            internal_cost: record.internal_cost,
            internal_cost_usd,
            internal_day_rate_usd,
            exchange_rate,
            external_revenue: record.external_revenue,
            profit: record
                .profit
                .unwrap_or(record.external_revenue - internal_cost_usd),
        },
        invoice_status: record.invoice_status,
        invoice_date: record.invoice_date,
        invoice_paid_date,
        contractor_payment_status: record.contractor_payment_status,
        contractor_paid_date,
    })
}

/// Exchange rate implied by stored USD cost or day rate
fn implied_rate(record: &TimesheetRecord) -> Option<f64> {
    let ratio = |usd: Option<f64>, original: f64| usd.filter(|_| original > 0.0).map(|u| u / original);
    ratio(record.internal_cost_usd, record.internal_cost)
        .or_else(|| ratio(record.internal_day_rate_usd, record.internal_day_rate))
}

/// Transaction as stored, possibly in a legacy shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount_paid: Option<f64>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub payment_terms: Option<String>,
}

/// Lift a stored transaction into the current shape
pub fn normalize_transaction(record: TransactionRecord) -> Transaction {
    let payment_status = record.payment_status.unwrap_or(PaymentStatus::Unpaid);
    let payment_date = match payment_status {
        PaymentStatus::Paid => record.payment_date.or(Some(record.date)),
        _ => record.payment_date,
    };

    Transaction {
        id: record.id,
        date: record.date,
        kind: record.kind,
        category: record.category,
        description: record.description,
        amount: record.amount,
        status: record.status.unwrap_or(TransactionStatus::Posted),
        payment_status,
        payment_date,
        amount_paid: record.amount_paid,
        invoice_number: record.invoice_number,
        invoice_date: record.invoice_date,
        payment_terms: record.payment_terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::date;

    fn legacy_sheet() -> TimesheetRecord {
        TimesheetRecord {
            id: "t1".to_string(),
            assignment_id: "a1".to_string(),
            month: "2025-06".to_string(),
            standard_days_worked: 10.0,
            internal_day_rate: 400.0,
            external_day_rate: 600.0,
            total_days_worked: 10.0,
            internal_cost: 4_000.0,
            external_revenue: 6_000.0,
            ..TimesheetRecord::default()
        }
    }

    #[test]
    fn test_legacy_timesheet_is_usd() {
        let ts = normalize_timesheet(legacy_sheet()).unwrap();
        assert_eq!(ts.basis.internal_currency, "USD");
        assert_eq!(ts.figures.exchange_rate, 1.0);
        assert_eq!(ts.figures.internal_cost_usd, 4_000.0);
        assert_eq!(ts.figures.internal_day_rate_usd, 400.0);
        assert_eq!(ts.figures.profit, 2_000.0);
    }

    #[test]
    fn test_current_timesheet_kept_as_is() {
        let mut record = legacy_sheet();
        record.internal_currency = Some("EUR".to_string());
        record.exchange_rate = Some(1.1);
        record.internal_cost_usd = Some(4_400.0);
        record.profit = Some(1_600.0);
        let ts = normalize_timesheet(record).unwrap();
        assert_eq!(ts.basis.internal_currency, "EUR");
        assert_eq!(ts.figures.internal_cost_usd, 4_400.0);
        assert_eq!(ts.figures.profit, 1_600.0);
    }

    #[test]
    fn test_named_currency_without_rate_is_rejected() {
        let mut record = legacy_sheet();
        record.internal_currency = Some("XYZ".to_string());
        assert!(matches!(
            normalize_timesheet(record),
            Err(FinsightError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_rate_recovered_from_usd_cost() {
        let mut record = legacy_sheet();
        record.internal_currency = Some("EUR".to_string());
        record.internal_cost_usd = Some(4_400.0);
        let ts = normalize_timesheet(record).unwrap();
        assert!((ts.figures.exchange_rate - 1.1).abs() < 1e-9);
        assert_eq!(ts.figures.internal_cost_usd, 4_400.0);
        assert!((ts.figures.internal_day_rate_usd - 440.0).abs() < 1e-9);
        assert!((ts.figures.profit - 1_600.0).abs() < 1e-9);

        let mut by_day_rate = legacy_sheet();
        by_day_rate.internal_currency = Some("GBP".to_string());
        by_day_rate.internal_day_rate_usd = Some(500.0);
        let ts = normalize_timesheet(by_day_rate).unwrap();
        assert_eq!(ts.figures.exchange_rate, 1.25);
        assert_eq!(ts.figures.internal_cost_usd, 5_000.0);
    }

    #[test]
    fn test_paid_sheet_without_dates_gets_one() {
        let mut invoiced = legacy_sheet();
        invoiced.invoice_status = InvoiceStatus::Paid;
        invoiced.invoice_date = Some(date("2025-07-02"));
        invoiced.contractor_payment_status = ContractorPaymentStatus::Paid;
        let ts = normalize_timesheet(invoiced).unwrap();
        assert_eq!(ts.invoice_paid_date, Some(date("2025-07-02")));
        assert_eq!(ts.contractor_paid_date, Some(date("2025-06-30")));
        assert_eq!(ts.receipt(), Some((date("2025-07-02"), 6_000.0)));
        assert!(ts.payout().is_some());

        let mut never_invoiced = legacy_sheet();
        never_invoiced.invoice_status = InvoiceStatus::Paid;
        let ts = normalize_timesheet(never_invoiced).unwrap();
        assert_eq!(ts.invoice_paid_date, Some(date("2025-06-30")));
    }

    #[test]
    fn test_legacy_timesheet_from_json() {
        let json = r#"{"id":"t9","assignment_id":"a1","month":"2025-01","internal_cost":100.0,"external_revenue":150.0}"#;
        let record: TimesheetRecord = serde_json::from_str(json).unwrap();
        let ts = normalize_timesheet(record).unwrap();
        assert_eq!(ts.figures.profit, 50.0);
        assert_eq!(ts.invoice_status, InvoiceStatus::NotInvoiced);
    }

    #[test]
    fn test_transaction_defaults() {
        let json = r#"{"id":"x","date":"2026-02-03","type":"revenue","category":"A","amount":10.0,"payment_status":"paid"}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        let tx = normalize_transaction(record);
        assert_eq!(tx.status, TransactionStatus::Posted);
        assert_eq!(tx.payment_date, Some(date("2026-02-03")));

        let json = r#"{"id":"y","date":"2026-02-03","type":"expense","category":"A","amount":10.0}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        let tx = normalize_transaction(record);
        assert_eq!(tx.payment_status, PaymentStatus::Unpaid);
        assert_eq!(tx.payment_date, None);
    }
}
