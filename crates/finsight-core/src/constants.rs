//! Centralized constants for the FinSight engine
//!
//! Business defaults live here; organisation-specific values come from
//! configuration.

// =============================================================================
// Currency
// =============================================================================

/// Reporting currency every figure is normalised to
pub const BASE_CURRENCY: &str = "USD";

/// Built-in exchange rates (USD per one unit of the listed currency)
pub const DEFAULT_USD_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 1.10),
    ("GBP", 1.27),
    ("CAD", 0.74),
    ("AUD", 0.66),
    ("CHF", 1.13),
    ("JPY", 0.0067),
    ("INR", 0.012),
    ("SGD", 0.74),
    ("AED", 0.27),
    ("ZAR", 0.055),
    ("NZD", 0.61),
];

// =============================================================================
// Contractors
// =============================================================================

/// Hours in a billable day when the assignment does not say otherwise
pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;

/// Standard billable days per month when the assignment does not say otherwise
pub const DEFAULT_DAYS_PER_MONTH: f64 = 20.0;

/// Days ahead an active contract counts as expiring
pub const EXPIRING_CONTRACT_DAYS: i64 = 30;

// =============================================================================
// Cash flow
// =============================================================================

/// Aging tier labels; presentation code keys on these exact strings
pub const AGING_LABELS: [&str; 5] = ["0-30", "31-60", "61-90", "91-120", "120+"];

/// Inclusive upper bound (days outstanding) of each bounded aging tier
pub const AGING_UPPER_BOUNDS: [i64; 4] = [30, 60, 90, 120];

/// Trailing calendar months averaged into the burn rate
pub const BURN_WINDOW_MONTHS: u32 = 3;

/// Days ahead a subscription bill counts as upcoming
pub const UPCOMING_BILL_DAYS: i64 = 7;

/// Expense categories paid out as payroll
pub const PAYROLL_CATEGORIES: &[&str] = &["payroll", "salaries", "wages"];

/// Expense categories paid out as subscriptions
pub const SUBSCRIPTION_CATEGORIES: &[&str] = &["subscriptions", "software", "saas"];

// =============================================================================
// Distribution
// =============================================================================

/// Tolerance when checking that partner shares total 100%
pub const SHARE_TOTAL_TOLERANCE: f64 = 1e-6;

// =============================================================================
// Recruitment
// =============================================================================

/// Days a submission may sit in client review before it needs attention
pub const REVIEW_STALE_DAYS: i64 = 7;

// =============================================================================
// Forecast
// =============================================================================

/// Complete months of history the local forecast learns from
pub const FORECAST_HISTORY_MONTHS: u32 = 6;

/// Default forecast horizon in months
pub const FORECAST_DEFAULT_MONTHS: u32 = 6;

/// Cap on the monthly revenue growth rate used for projection
pub const FORECAST_MAX_GROWTH: f64 = 0.5;

/// Scenario multipliers: (revenue, expenses)
pub const OPTIMISTIC_FACTORS: (f64, f64) = (1.15, 0.95);
pub const CONSERVATIVE_FACTORS: (f64, f64) = (0.85, 1.05);
