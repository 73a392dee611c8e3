//! Constants for the FinSight command-line host
//!
//! Business defaults live in `finsight_core::constants`; these cover files,
//! collections and the forecast service.

// =============================================================================
// File Names
// =============================================================================

/// Default config file path
pub const CONFIG_FILE: &str = "finsight.toml";

/// SQLite document store inside the data directory
pub const STORE_FILENAME: &str = "finsight.sqlite";

// =============================================================================
// Collections
// =============================================================================

pub const TRANSACTIONS: &str = "transactions";
pub const ASSIGNMENTS: &str = "contractor_assignments";
pub const TIMESHEETS: &str = "contractor_timesheets";
pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const PARTNERS: &str = "partners";
pub const DISTRIBUTIONS: &str = "profit_distributions";
pub const CANDIDATES: &str = "candidates";
pub const SUBMISSIONS: &str = "candidate_submissions";
pub const JOB_ROLES: &str = "job_roles";
pub const TASKS: &str = "recruiter_tasks";
pub const DEALS: &str = "deals";

/// Every collection the live book follows
pub const COLLECTIONS: [&str; 11] = [
    TRANSACTIONS,
    ASSIGNMENTS,
    TIMESHEETS,
    SUBSCRIPTIONS,
    PARTNERS,
    DISTRIBUTIONS,
    CANDIDATES,
    SUBMISSIONS,
    JOB_ROLES,
    TASKS,
    DEALS,
];

// =============================================================================
// Forecast Service
// =============================================================================

/// Attempts before falling back to the local forecast
pub const FORECAST_MAX_RETRIES: u32 = 3;

/// Base of the exponential retry backoff in seconds
pub const FORECAST_BACKOFF_SECS: u64 = 1;

/// Per-request timeout in seconds
pub const FORECAST_TIMEOUT_SECS: u64 = 20;
