//! Deterministic cash forecast from recent ledger history
//!
//! Used directly when no forecast service is configured, and as the fallback
//! whenever the service fails. Same history in, same forecast out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::FinsightError;
use crate::ledger::{MonthlyPoint, Transaction, monthly_series};
use crate::period::Month;

/// Where a forecast came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastSource {
    #[default]
    Local,
    Remote,
    /// Local figures standing in for a service that failed
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: Month,
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub points: Vec<ForecastPoint>,
}

impl Scenario {
    pub fn total_revenue(&self) -> f64 {
        self.points.iter().map(|p| p.revenue).sum()
    }

    pub fn total_expenses(&self) -> f64 {
        self.points.iter().map(|p| p.expenses).sum()
    }

    pub fn total_profit(&self) -> f64 {
        self.points.iter().map(|p| p.profit).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub base_case: Scenario,
    pub optimistic: Scenario,
    pub conservative: Scenario,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub source: ForecastSource,
    #[serde(default)]
    pub history: Vec<MonthlyPoint>,
    /// Why the service could not be used, when `source` is `Fallback`
    #[serde(skip)]
    pub service_error: Option<FinsightError>,
}

/// Complete months the forecast learns from: the `count` months before the
/// month containing `today`
pub fn history_months(today: NaiveDate, count: u32) -> Vec<Month> {
    let current = Month::of(today);
    (1..=count as i32).rev().map(|back| current.offset(-back)).collect()
}

/// Mean month-over-month revenue growth, skipping months that follow a month
/// with no revenue, clamped to the configured maximum
pub fn revenue_growth(history: &[MonthlyPoint]) -> f64 {
    let rates: Vec<f64> = history
        .windows(2)
        .filter(|pair| pair[0].revenue > 0.0)
        .map(|pair| (pair[1].revenue - pair[0].revenue) / pair[0].revenue)
        .collect();
    if rates.is_empty() {
        return 0.0;
    }
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    mean.clamp(-constants::FORECAST_MAX_GROWTH, constants::FORECAST_MAX_GROWTH)
}

fn scenario(
    start: Month,
    months: u32,
    revenue: f64,
    expenses: f64,
    growth: f64,
    (revenue_factor, expense_factor): (f64, f64),
) -> Scenario {
    let points = (0..months as i32)
        .map(|i| {
            let revenue = revenue * (1.0 + growth).powi(i + 1) * revenue_factor;
            let expenses = expenses * expense_factor;
            ForecastPoint {
                month: start.offset(i),
                revenue,
                expenses,
                profit: revenue - expenses,
            }
        })
        .collect();
    Scenario { points }
}

fn usd(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Project `months` months starting the month after `today`
pub fn local_forecast(transactions: &[Transaction], months: u32, today: NaiveDate) -> Forecast {
    let history = monthly_series(
        transactions,
        &history_months(today, constants::FORECAST_HISTORY_MONTHS),
    );
    let observed = history.len().max(1) as f64;
    let avg_revenue = history.iter().map(|p| p.revenue).sum::<f64>() / observed;
    let avg_expenses = history.iter().map(|p| p.expenses).sum::<f64>() / observed;
    let growth = revenue_growth(&history);
    let start = Month::of(today).next();

    let base_case = scenario(start, months, avg_revenue, avg_expenses, growth, (1.0, 1.0));
    let optimistic = scenario(
        start,
        months,
        avg_revenue,
        avg_expenses,
        growth,
        constants::OPTIMISTIC_FACTORS,
    );
    let conservative = scenario(
        start,
        months,
        avg_revenue,
        avg_expenses,
        growth,
        constants::CONSERVATIVE_FACTORS,
    );

    let mut insights = Vec::new();
    let mut recommendations = Vec::new();
    let active = history.iter().any(|p| p.revenue > 0.0 || p.expenses > 0.0);

    if !active {
        insights.push(format!(
            "No posted activity in the last {} months; the forecast assumes none",
            history.len()
        ));
        recommendations.push("Post transactions to get a meaningful forecast".to_string());
    } else {
        insights.push(format!(
            "Average monthly revenue {} against expenses {} over the last {} months",
            usd(avg_revenue),
            usd(avg_expenses),
            history.len()
        ));
        let trend = if growth > 0.0 {
            format!("Revenue is growing {:.1}% per month", growth * 100.0)
        } else if growth < 0.0 {
            format!("Revenue is declining {:.1}% per month", -growth * 100.0)
        } else {
            "Revenue is flat month over month".to_string()
        };
        insights.push(trend);

        if avg_expenses > avg_revenue {
            insights.push(format!(
                "Expenses exceed revenue by {} per month on average",
                usd(avg_expenses - avg_revenue)
            ));
        }
        if base_case.total_profit() < 0.0 {
            recommendations
                .push("Cut operating expenses or raise rates to reach break-even".to_string());
        }
        if growth < 0.0 {
            recommendations.push("Review lost or shrinking accounts behind the decline".to_string());
        }
        if conservative.total_profit() < 0.0 && base_case.total_profit() >= 0.0 {
            recommendations.push(
                "Hold a cash buffer: a 15% revenue dip would turn the period loss-making"
                    .to_string(),
            );
        }
        if recommendations.is_empty() {
            recommendations
                .push("Keep the current trajectory and plan how to use the surplus".to_string());
        }
    }

    Forecast {
        base_case,
        optimistic,
        conservative,
        insights,
        recommendations,
        source: ForecastSource::Local,
        history,
        service_error: None,
    }
}
