//! CSV bulk import
//!
//! Every row is validated on its own; a bad row is reported by its 1-based
//! row number and the rest of the file is still imported.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use finsight_core::contractors::{TimesheetInput, derive_timesheet, timesheet_id};
use finsight_core::distribution::Partner;
use finsight_core::migrate::{TransactionRecord, normalize_transaction};
use finsight_core::pipeline::{CandidateInput, import_candidates};
use finsight_core::subscriptions::Subscription;
use finsight_core::{BulkOutcome, FinsightError, Month, RateTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::book::Book;
use crate::constants;
use crate::store::Store;

/// What a CSV file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    Transactions,
    Subscriptions,
    Partners,
    Candidates,
    Timesheets,
}

impl ImportKind {
    pub fn collection(&self) -> &'static str {
        match self {
            ImportKind::Transactions => constants::TRANSACTIONS,
            ImportKind::Subscriptions => constants::SUBSCRIPTIONS,
            ImportKind::Partners => constants::PARTNERS,
            ImportKind::Candidates => constants::CANDIDATES,
            ImportKind::Timesheets => constants::TIMESHEETS,
        }
    }
}

/// Documents ready to store, keyed by id
pub type Documents = BulkOutcome<(String, Value)>;

fn row_key(index: usize) -> String {
    format!("row {}", index + 1)
}

/// Deserialize every row, keeping per-row failures
fn read_rows<T: DeserializeOwned, R: Read>(reader: R) -> Vec<finsight_core::Result<T>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .map(|row| row.map_err(|e| FinsightError::validation(e.to_string())))
        .collect()
}

fn document<T: Serialize>(id: String, record: &T) -> finsight_core::Result<(String, Value)> {
    let value = serde_json::to_value(record).map_err(|e| FinsightError::validation(e.to_string()))?;
    Ok((id, value))
}

fn collect<T, R: Read>(
    reader: R,
    mut lift: impl FnMut(T) -> finsight_core::Result<(String, Value)>,
) -> Documents
where
    T: DeserializeOwned,
{
    let mut outcome = Documents::default();
    for (index, row) in read_rows::<T, R>(reader).into_iter().enumerate() {
        outcome.push(row_key(index), row.and_then(&mut lift));
    }
    outcome
}

/// Turn CSV rows into documents for `kind`, validated against the current book
pub fn parse<R: Read>(
    kind: ImportKind,
    reader: R,
    book: &Book,
    rates: &RateTable,
    today: NaiveDate,
) -> Documents {
    match kind {
        ImportKind::Transactions => collect(reader, |record: TransactionRecord| {
            let transaction = normalize_transaction(record);
            transaction.validate()?;
            document(transaction.id.clone(), &transaction)
        }),
        ImportKind::Subscriptions => collect(reader, |subscription: Subscription| {
            subscription.validate()?;
            document(subscription.id.clone(), &subscription)
        }),
        ImportKind::Partners => collect(reader, |partner: Partner| {
            partner.validate()?;
            document(partner.id.clone(), &partner)
        }),
        ImportKind::Timesheets => {
            let mut seen: HashSet<String> = book.timesheets.iter().map(|t| t.id.clone()).collect();
            collect(reader, move |input: TimesheetInput| {
                let month: Month = input.month.parse()?;
                let id = timesheet_id(&input.assignment_id, month);
                if seen.contains(&id) {
                    return Err(FinsightError::validation(format!(
                        "timesheet for {} in {} already exists",
                        input.assignment_id, month
                    )));
                }
                let timesheet = derive_timesheet(&id, &input, &book.assignments, rates)?;
                seen.insert(id.clone());
                document(id, &timesheet)
            })
        }
        ImportKind::Candidates => parse_candidates(reader, book, today),
    }
}

/// Candidate import dedupes across the whole file, so rows go through the
/// batch importer together and its keys are mapped back to file rows
fn parse_candidates<R: Read>(reader: R, book: &Book, today: NaiveDate) -> Documents {
    let mut outcome = Documents::default();
    let mut rows = Vec::new();
    let mut file_rows = HashMap::new();

    for (index, row) in read_rows::<CandidateInput, R>(reader).into_iter().enumerate() {
        match row {
            Ok(input) => {
                file_rows.insert(row_key(rows.len()), row_key(index));
                rows.push(input);
            }
            Err(e) => outcome.push(row_key(index), Err(e)),
        }
    }

    let imported = import_candidates(&rows, &book.candidates, today);
    for candidate in imported.created {
        outcome.push(candidate.id.clone(), document(candidate.id.clone(), &candidate));
    }
    for mut error in imported.errors {
        if let Some(key) = file_rows.get(&error.key) {
            error.key = key.clone();
        }
        outcome.errors.push(error);
    }
    outcome.errors.sort_by_key(|e| row_number(&e.key));
    outcome
}

fn row_number(key: &str) -> usize {
    key.strip_prefix("row ")
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}

/// Import a CSV file into the store; returns the documents written and the
/// rows that were rejected
pub async fn import_file(
    store: &Store,
    kind: ImportKind,
    path: &Path,
    rates: &RateTable,
    today: NaiveDate,
) -> Result<Documents> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let book = Book::load(store).await?;

    let outcome = parse(kind, file, &book, rates, today);
    let written = store
        .upsert_many(kind.collection(), &outcome.created)
        .await
        .with_context(|| format!("Failed to store imported {}", kind.collection()))?;
    info!(
        collection = kind.collection(),
        written,
        rejected = outcome.errors.len(),
        "import finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::contractors::{AssignmentStatus, ContractorAssignment};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn assignment() -> ContractorAssignment {
        ContractorAssignment {
            id: "a1".to_string(),
            contractor_id: "c1".to_string(),
            customer_id: "k1".to_string(),
            status: AssignmentStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: None,
            standard_days_per_month: 20.0,
            standard_hours_per_day: 8.0,
            internal_day_rate: 400.0,
            external_day_rate: 600.0,
            internal_currency: "USD".to_string(),
            external_currency: "USD".to_string(),
            internal_day_rate_usd: None,
        }
    }

    fn parse_str(kind: ImportKind, csv: &str, book: &Book) -> Documents {
        parse(kind, csv.as_bytes(), book, &RateTable::default(), today())
    }

    #[test]
    fn test_transactions_bad_rows_reported() {
        let csv = "\
id,date,type,category,description,amount,status,payment_status
t1,2026-09-01,revenue,Consulting,Invoice 1,1000,posted,paid
t2,2026-09-02,expense,Software,,-5,posted,unpaid
t3,not-a-date,expense,Software,,5,,
t4,2026-09-03,expense,Payroll,,200,,
";
        let outcome = parse_str(ImportKind::Transactions, csv, &Book::default());
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.created[0].0, "t1");
        assert_eq!(outcome.created[0].1["payment_date"], "2026-09-01");
        assert_eq!(outcome.created[1].1["status"], "posted");

        let keys: Vec<&str> = outcome.errors.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["row 2", "row 3"]);
    }

    #[test]
    fn test_candidates_keep_file_row_numbers() {
        let csv = "\
name,email,phone,skills
Ada,ada@example.com,,\"rust, sql\"
Bad,row,with,too,many
Grace,ADA@example.com,,
Linus,linus@example.com,555-0100,c
";
        let outcome = parse_str(ImportKind::Candidates, csv, &Book::default());
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.created[0].0, "cand-00001");
        assert_eq!(outcome.created[0].1["skills"][1], "sql");

        let keys: Vec<&str> = outcome.errors.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["row 2", "row 3"]);
    }

    #[test]
    fn test_timesheets_need_known_assignment() {
        let book = Book {
            assignments: vec![assignment()],
            ..Book::default()
        };
        let csv = "\
assignment_id,month,standard_days_worked
a1,2026-09,10
ghost,2026-09,10
";
        let outcome = parse_str(ImportKind::Timesheets, csv, &book);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].0, "a1-2026-09");
        assert_eq!(outcome.created[0].1["external_revenue"], 6000.0);
        assert!(matches!(
            outcome.errors[0].error,
            FinsightError::NotFound { kind: "assignment", .. }
        ));
    }

    #[test]
    fn test_timesheets_repeated_in_file_rejected() {
        let book = Book {
            assignments: vec![assignment()],
            ..Book::default()
        };
        let csv = "\
assignment_id,month,standard_days_worked
a1,2026-09,10
a1,2026-09,12
a1,2026-10,5
";
        let outcome = parse_str(ImportKind::Timesheets, csv, &book);
        let ids: Vec<&str> = outcome.created.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a1-2026-09", "a1-2026-10"]);
        assert_eq!(outcome.created[0].1["standard_days_worked"], 10.0);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "row 2");
    }

    #[tokio::test]
    async fn test_import_file_writes_store() {
        let dir = std::env::temp_dir().join(format!("finsight-import-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partners.csv");
        std::fs::write(
            &path,
            "id,name,share_percentage,status\np1,Alice,60,active\np2,Bob,140,active\n",
        )
        .unwrap();

        let store = Store::in_memory().await.unwrap();
        let outcome = import_file(&store, ImportKind::Partners, &path, &RateTable::default(), today())
            .await
            .unwrap();
        assert_eq!(outcome.errors.len(), 1);

        let partners = Book::load(&store).await.unwrap().partners;
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].name, "Alice");
        std::fs::remove_dir_all(&dir).ok();
    }
}
