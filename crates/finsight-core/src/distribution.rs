//! Profit distribution waterfall
//!
//! Net profit for a period flows through two stages:
//!
//! ```text
//! net_profit         = max(0, revenue - expenses)
//! retained           = net_profit * retention% / 100
//! distributable_pool = net_profit - retained
//! partner(p)         = distributable_pool * share(p)% / 100
//! company_pool       = net_profit - sum(partner(p))
//! ```
//!
//! Planning is always allowed so the split can be previewed. Recording a
//! distribution is refused unless active partner shares total exactly 100%.
//! Recorded entries are append-only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::context::validate_percentage;
use crate::error::{FinsightError, Result};
use crate::ids::next_sequence;
use crate::ledger::ProfitAndLoss;
use crate::period::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    Active,
    Inactive,
}

/// Profit-sharing partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub share_percentage: f64,
    pub status: PartnerStatus,
}

impl Partner {
    pub fn is_active(&self) -> bool {
        self.status == PartnerStatus::Active
    }

    pub fn validate(&self) -> Result<()> {
        validate_percentage(&format!("share for {}", self.name), self.share_percentage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Pending,
    Completed,
}

/// Recorded payout to one partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitDistribution {
    pub id: String,
    pub partner_id: String,
    pub partner_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount: f64,
    pub share_percentage: f64,
    pub distributed_at: DateTime<Utc>,
    pub status: DistributionStatus,
}

impl ProfitDistribution {
    /// Day the payout left the bank, if it has
    pub fn cash_date(&self) -> Option<NaiveDate> {
        (self.status == DistributionStatus::Completed).then(|| self.distributed_at.date_naive())
    }
}

/// One partner's slice of the distributable pool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerAllocation {
    pub partner_id: String,
    pub partner_name: String,
    pub share_percentage: f64,
    pub amount: f64,
}

/// Computed waterfall for a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionPlan {
    pub net_profit: f64,
    pub retention_percentage: f64,
    pub retained_amount: f64,
    pub distributable_pool: f64,
    pub allocations: Vec<PartnerAllocation>,
    pub company_pool_amount: f64,
    /// Sum of active partner shares
    pub share_total: f64,
}

impl DistributionPlan {
    pub fn is_distributable(&self) -> bool {
        (self.share_total - 100.0).abs() <= constants::SHARE_TOTAL_TOLERANCE
    }

    pub fn partner_total(&self) -> f64 {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// Revenue and expenses for a period: ledger P&L plus timesheet revenue and
/// USD cost
pub fn period_net_profit(pnl: &ProfitAndLoss, contractor_totals: (f64, f64)) -> (f64, f64) {
    let (contractor_revenue, contractor_cost) = contractor_totals;
    (
        pnl.revenue + contractor_revenue,
        pnl.expenses + contractor_cost,
    )
}

/// Compute the waterfall over active partners
pub fn plan_distribution(
    total_revenue: f64,
    total_expenses: f64,
    retention_percentage: f64,
    partners: &[Partner],
) -> Result<DistributionPlan> {
    validate_percentage("retention percentage", retention_percentage)?;

    let mut active: Vec<&Partner> = partners.iter().filter(|p| p.is_active()).collect();
    for partner in &active {
        partner.validate()?;
    }
    active.sort_by(|a, b| a.id.cmp(&b.id));

    let net_profit = (total_revenue - total_expenses).max(0.0);
    let retained_amount = net_profit * retention_percentage / 100.0;
    let distributable_pool = net_profit - retained_amount;

    let allocations: Vec<PartnerAllocation> = active
        .iter()
        .map(|p| PartnerAllocation {
            partner_id: p.id.clone(),
            partner_name: p.name.clone(),
            share_percentage: p.share_percentage,
            amount: distributable_pool * p.share_percentage / 100.0,
        })
        .collect();
    let partner_total: f64 = allocations.iter().map(|a| a.amount).sum();

    Ok(DistributionPlan {
        net_profit,
        retention_percentage,
        retained_amount,
        distributable_pool,
        company_pool_amount: net_profit - partner_total,
        share_total: active.iter().map(|p| p.share_percentage).sum(),
        allocations,
    })
}

/// Append-only record of distributions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionLedger {
    entries: Vec<ProfitDistribution>,
}

impl DistributionLedger {
    pub fn new(entries: Vec<ProfitDistribution>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ProfitDistribution] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Completed payouts whose cash left within `period`
    pub fn paid_in(&self, period: &Period) -> f64 {
        paid_in(&self.entries, period)
    }
}

/// Completed payouts in `distributions` whose cash left within `period`
pub fn paid_in(distributions: &[ProfitDistribution], period: &Period) -> f64 {
    distributions
        .iter()
        .filter_map(|d| d.cash_date().filter(|day| period.contains(*day)).map(|_| d.amount))
        .sum()
}

/// Record one entry per partner in `plan`, or nothing at all when the
/// active shares do not total 100%
pub fn distribute_profit(
    plan: &DistributionPlan,
    period: &Period,
    ledger: &mut DistributionLedger,
    distributed_at: DateTime<Utc>,
    status: DistributionStatus,
) -> Result<Vec<ProfitDistribution>> {
    if !plan.is_distributable() {
        return Err(FinsightError::validation(format!(
            "Partner shares must total 100% (currently {}%)",
            round_share(plan.share_total)
        )));
    }

    let start = next_sequence(ledger.entries.iter().map(|e| e.id.as_str()), "dist");
    let created: Vec<ProfitDistribution> = plan
        .allocations
        .iter()
        .zip(start..)
        .map(|(allocation, n)| ProfitDistribution {
            id: format!("dist-{:06}", n),
            partner_id: allocation.partner_id.clone(),
            partner_name: allocation.partner_name.clone(),
            period_start: period.start,
            period_end: period.end,
            amount: allocation.amount,
            share_percentage: allocation.share_percentage,
            distributed_at,
            status,
        })
        .collect();

    ledger.entries.extend(created.iter().cloned());
    Ok(created)
}

/// Trim float noise so messages read "90%" rather than "89.99999999%"
fn round_share(total: f64) -> f64 {
    (total * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::date;
    use proptest::prelude::*;

    fn partner(id: &str, share: f64) -> Partner {
        Partner {
            id: id.to_string(),
            name: format!("Partner {}", id),
            share_percentage: share,
            status: PartnerStatus::Active,
        }
    }

    fn period() -> Period {
        Period::new(date("2026-01-01"), date("2026-03-31")).unwrap()
    }

    fn now() -> DateTime<Utc> {
        date("2026-04-02").and_hms_opt(9, 0, 0).unwrap().and_utc()
    }

    #[test]
    fn test_waterfall_with_retention() {
        let partners = vec![partner("p1", 60.0), partner("p2", 40.0)];
        let plan = plan_distribution(150_000.0, 50_000.0, 20.0, &partners).unwrap();

        assert_eq!(plan.net_profit, 100_000.0);
        assert_eq!(plan.retained_amount, 20_000.0);
        assert_eq!(plan.distributable_pool, 80_000.0);
        assert_eq!(plan.allocations[0].amount, 48_000.0);
        assert_eq!(plan.allocations[1].amount, 32_000.0);
        assert_eq!(plan.company_pool_amount, 20_000.0);
        assert!(plan.is_distributable());
    }

    #[test]
    fn test_period_net_profit_includes_timesheets() {
        let pnl = ProfitAndLoss {
            revenue: 1000.0,
            expenses: 400.0,
            profit: 600.0,
            ..ProfitAndLoss::default()
        };
        let (revenue, expenses) = period_net_profit(&pnl, (16_000.0, 11_000.0));
        assert_eq!(revenue, 17_000.0);
        assert_eq!(expenses, 11_400.0);
    }

    #[test]
    fn test_loss_never_distributes() {
        let plan = plan_distribution(10.0, 50.0, 0.0, &[partner("p1", 100.0)]).unwrap();
        assert_eq!(plan.net_profit, 0.0);
        assert_eq!(plan.allocations[0].amount, 0.0);
    }

    #[test]
    fn test_inactive_partners_ignored() {
        let mut gone = partner("p3", 50.0);
        gone.status = PartnerStatus::Inactive;
        let plan =
            plan_distribution(100.0, 0.0, 0.0, &[partner("p1", 100.0), gone]).unwrap();
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.share_total, 100.0);
    }

    #[test]
    fn test_distribution_records_entries() {
        let partners = vec![partner("p1", 60.0), partner("p2", 40.0)];
        let plan = plan_distribution(100_000.0, 0.0, 20.0, &partners).unwrap();
        let mut ledger = DistributionLedger::default();

        let created = distribute_profit(
            &plan,
            &period(),
            &mut ledger,
            now(),
            DistributionStatus::Completed,
        )
        .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(ledger.len(), 2);
        assert_eq!(created[0].id, "dist-000001");
        assert_eq!(ledger.entries()[1].partner_id, "p2");
        assert_eq!(ledger.entries()[1].amount, 32_000.0);

        let april = Period::new(date("2026-04-01"), date("2026-04-30")).unwrap();
        assert_eq!(ledger.paid_in(&april), 80_000.0);
        assert_eq!(ledger.paid_in(&period()), 0.0);
    }

    #[test]
    fn test_ids_continue_past_removed_entries() {
        let plan = plan_distribution(1000.0, 0.0, 0.0, &[partner("p1", 100.0)]).unwrap();
        let mut first = DistributionLedger::default();
        for _ in 0..2 {
            distribute_profit(&plan, &period(), &mut first, now(), DistributionStatus::Completed)
                .unwrap();
        }
        let survivors: Vec<ProfitDistribution> = first.entries()[1..].to_vec();
        let mut ledger = DistributionLedger::new(survivors);

        let created =
            distribute_profit(&plan, &period(), &mut ledger, now(), DistributionStatus::Completed)
                .unwrap();
        assert_eq!(created[0].id, "dist-000003");
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_pending_distributions_are_not_cash() {
        let plan = plan_distribution(1000.0, 0.0, 0.0, &[partner("p1", 100.0)]).unwrap();
        let mut ledger = DistributionLedger::default();
        distribute_profit(&plan, &period(), &mut ledger, now(), DistributionStatus::Pending)
            .unwrap();
        let april = Period::new(date("2026-04-01"), date("2026-04-30")).unwrap();
        assert_eq!(ledger.paid_in(&april), 0.0);
    }

    #[test]
    fn test_shares_not_totalling_100_refused() {
        let partners = vec![partner("p1", 50.0), partner("p2", 40.0)];
        let plan = plan_distribution(100_000.0, 0.0, 0.0, &partners).unwrap();
        let mut ledger = DistributionLedger::default();

        let err = distribute_profit(
            &plan,
            &period(),
            &mut ledger,
            now(),
            DistributionStatus::Completed,
        )
        .unwrap_err();

        assert!(err.to_string().contains("90%"));
        assert!(matches!(err, FinsightError::Validation(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_invalid_percentages_rejected() {
        assert!(plan_distribution(1.0, 0.0, 120.0, &[partner("p1", 100.0)]).is_err());
        assert!(plan_distribution(1.0, 0.0, 0.0, &[partner("p1", 101.0)]).is_err());
        assert!(plan_distribution(1.0, 0.0, 0.0, &[partner("p1", -1.0)]).is_err());
    }

    fn arb_shares() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(1u32..100, 1..6).prop_map(|weights| {
            let total: u32 = weights.iter().sum();
            weights
                .iter()
                .map(|w| f64::from(*w) * 100.0 / f64::from(total))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_waterfall_conserves_profit(
            revenue in 0.0f64..1.0e9,
            expenses in 0.0f64..1.0e9,
            retention in 0.0f64..=100.0,
            shares in arb_shares(),
        ) {
            let partners: Vec<Partner> = shares
                .iter()
                .enumerate()
                .map(|(i, s)| partner(&format!("p{}", i), *s))
                .collect();
            let plan = plan_distribution(revenue, expenses, retention, &partners).unwrap();
            let tolerance = 1e-6 * plan.net_profit.max(1.0);
            prop_assert!((plan.partner_total() + plan.company_pool_amount - plan.net_profit).abs() <= tolerance);
            prop_assert!((plan.retained_amount + plan.distributable_pool - plan.net_profit).abs() <= tolerance);
        }

        #[test]
        fn prop_bad_share_total_leaves_ledger_untouched(
            shares in prop::collection::vec(0.0f64..40.0, 1..3),
        ) {
            let partners: Vec<Partner> = shares
                .iter()
                .enumerate()
                .map(|(i, s)| partner(&format!("p{}", i), *s))
                .collect();
            let plan = plan_distribution(1000.0, 0.0, 10.0, &partners).unwrap();
            let mut ledger = DistributionLedger::default();
            let result = distribute_profit(&plan, &period(), &mut ledger, now(), DistributionStatus::Completed);
            prop_assert!(result.is_err());
            prop_assert!(ledger.is_empty());
        }
    }
}
