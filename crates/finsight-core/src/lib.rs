//! FinSight calculation engine
//!
//! Pure functions over in-memory snapshots of the books: P&L aggregation,
//! contractor margins, subscription costs, the cash-flow statement with
//! aging and runway, profit distribution, recruitment and CRM metrics, and
//! the local forecast. Nothing here performs I/O; the organisation context
//! and exchange rates are passed in explicitly.

pub mod cashflow;
pub mod constants;
pub mod context;
pub mod contractors;
pub mod currency;
pub mod distribution;
pub mod error;
pub mod forecast;
pub mod ids;
pub mod ledger;
pub mod migrate;
pub mod period;
pub mod pipeline;
pub mod subscriptions;

pub use context::{BookContext, Organization, Settings};
pub use currency::{CurrencyPolicy, RateTable};
pub use error::{BulkOutcome, FinsightError, RecordError, Result};
pub use period::{Month, Period};
