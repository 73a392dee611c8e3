//! Typed, normalised snapshot of every collection

use anyhow::Result;
use finsight_core::cashflow::CashFlowInputs;
use finsight_core::contractors::{ContractorAssignment, ContractorTimesheet};
use finsight_core::distribution::{Partner, ProfitDistribution};
use finsight_core::ledger::Transaction;
use finsight_core::migrate::{
    TimesheetRecord, TransactionRecord, normalize_timesheet, normalize_transaction,
};
use finsight_core::pipeline::{Candidate, CandidateSubmission, Deal, JobRole, RecruiterTask};
use finsight_core::subscriptions::Subscription;
use finsight_core::{BulkOutcome, FinsightError, RecordError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::constants;
use crate::store::Store;

/// Everything the calculators read, decoded once per snapshot
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub transactions: Vec<Transaction>,
    pub assignments: Vec<ContractorAssignment>,
    pub timesheets: Vec<ContractorTimesheet>,
    pub subscriptions: Vec<Subscription>,
    pub partners: Vec<Partner>,
    pub distributions: Vec<ProfitDistribution>,
    pub candidates: Vec<Candidate>,
    pub submissions: Vec<CandidateSubmission>,
    pub roles: Vec<JobRole>,
    pub tasks: Vec<RecruiterTask>,
    pub deals: Vec<Deal>,
    /// Records that could not be decoded or normalised
    pub skipped: Vec<RecordError>,
}

fn record_key(collection: &str, value: &Value, index: usize) -> String {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index));
    format!("{}/{}", collection, id)
}

/// Decode a collection, collecting records that fail instead of aborting
fn decode_with<R, T>(
    collection: &str,
    values: &[Value],
    skipped: &mut Vec<RecordError>,
    lift: impl Fn(R) -> finsight_core::Result<T>,
) -> Vec<T>
where
    R: DeserializeOwned,
{
    let mut outcome = BulkOutcome::default();
    for (index, value) in values.iter().enumerate() {
        let result = serde_json::from_value::<R>(value.clone())
            .map_err(|e| FinsightError::validation(e.to_string()))
            .and_then(&lift);
        outcome.push(record_key(collection, value, index), result);
    }
    for error in &outcome.errors {
        warn!(record = %error.key, error = %error.error, "skipping unreadable record");
    }
    skipped.extend(outcome.errors);
    outcome.created
}

fn decode<T: DeserializeOwned>(
    collection: &str,
    values: &[Value],
    skipped: &mut Vec<RecordError>,
) -> Vec<T> {
    decode_with(collection, values, skipped, Ok)
}

impl Book {
    /// Build from raw collection contents; `raw(collection)` returns the
    /// records of that collection
    pub fn decode<'a>(raw: impl Fn(&str) -> &'a [Value]) -> Self {
        let mut skipped = Vec::new();
        let book = Self {
            transactions: decode_with(
                constants::TRANSACTIONS,
                raw(constants::TRANSACTIONS),
                &mut skipped,
                |record: TransactionRecord| Ok(normalize_transaction(record)),
            ),
            assignments: decode(constants::ASSIGNMENTS, raw(constants::ASSIGNMENTS), &mut skipped),
            timesheets: decode_with(
                constants::TIMESHEETS,
                raw(constants::TIMESHEETS),
                &mut skipped,
                |record: TimesheetRecord| normalize_timesheet(record),
            ),
            subscriptions: decode(
                constants::SUBSCRIPTIONS,
                raw(constants::SUBSCRIPTIONS),
                &mut skipped,
            ),
            partners: decode(constants::PARTNERS, raw(constants::PARTNERS), &mut skipped),
            distributions: decode(
                constants::DISTRIBUTIONS,
                raw(constants::DISTRIBUTIONS),
                &mut skipped,
            ),
            candidates: decode(constants::CANDIDATES, raw(constants::CANDIDATES), &mut skipped),
            submissions: decode(constants::SUBMISSIONS, raw(constants::SUBMISSIONS), &mut skipped),
            roles: decode(constants::JOB_ROLES, raw(constants::JOB_ROLES), &mut skipped),
            tasks: decode(constants::TASKS, raw(constants::TASKS), &mut skipped),
            deals: decode(constants::DEALS, raw(constants::DEALS), &mut skipped),
            skipped: Vec::new(),
        };
        Self { skipped, ..book }
    }

    /// Snapshots the cash-flow statement reads
    pub fn cash_flow_inputs(&self) -> CashFlowInputs<'_> {
        CashFlowInputs {
            transactions: &self.transactions,
            timesheets: &self.timesheets,
            subscriptions: &self.subscriptions,
            distributions: &self.distributions,
        }
    }

    /// Read every collection from the store
    pub async fn load(store: &Store) -> Result<Self> {
        let mut raw = Vec::with_capacity(constants::COLLECTIONS.len());
        for collection in constants::COLLECTIONS {
            raw.push((collection, store.list_raw(collection).await?));
        }
        Ok(Self::decode(|collection| {
            raw.iter()
                .find(|(name, _)| *name == collection)
                .map(|(_, values)| values.as_slice())
                .unwrap_or(&[])
        }))
    }
}
