//! Recruitment funnel, attention list and CRM pipeline metrics
//!
//! Funnel stages are overlapping groups of submission statuses, not a
//! partition: an accepted offer counts both as an offer and as a placement.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{BulkOutcome, FinsightError, Result};
use crate::ids::next_sequence;
use crate::ledger::ratio_percent;
use crate::period::days_between;

// =============================================================================
// Recruitment records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    SubmittedToClient,
    ClientReview,
    InterviewScheduled,
    Interviewed,
    OfferExtended,
    OfferAccepted,
    Placed,
    Rejected,
    Withdrawn,
}

impl SubmissionStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, SubmissionStatus::Rejected | SubmissionStatus::Withdrawn)
    }

    pub fn is_in_review(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::SubmittedToClient | SubmissionStatus::ClientReview
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub created_at: NaiveDate,
}

/// A candidate put forward for a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSubmission {
    pub id: String,
    pub candidate_id: String,
    pub job_role_id: String,
    pub status: SubmissionStatus,
    /// Day the current status was entered
    pub status_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    Open,
    OnHold,
    Filled,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRole {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub status: RoleStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruiterTask {
    pub id: String,
    pub title: String,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
}

// =============================================================================
// Funnel
// =============================================================================

/// Rate from one stage to the next, in percent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageConversion {
    pub from: String,
    pub to: String,
    pub rate: f64,
}

fn conversions(stages: &[(&str, usize)]) -> Vec<StageConversion> {
    stages
        .windows(2)
        .map(|pair| StageConversion {
            from: pair[0].0.to_string(),
            to: pair[1].0.to_string(),
            rate: ratio_percent(pair[1].1 as f64, pair[0].1 as f64),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunnelMetrics {
    pub total: usize,
    pub in_review: usize,
    pub interviewing: usize,
    pub offers: usize,
    pub placements: usize,
    pub rejected: usize,
    pub conversions: Vec<StageConversion>,
}

pub fn funnel_metrics(submissions: &[CandidateSubmission]) -> FunnelMetrics {
    use SubmissionStatus::*;

    let count = |statuses: &[SubmissionStatus]| {
        submissions
            .iter()
            .filter(|s| statuses.contains(&s.status))
            .count()
    };

    let total = submissions.len();
    let in_review = count(&[SubmittedToClient, ClientReview]);
    let interviewing = count(&[InterviewScheduled, Interviewed]);
    let offers = count(&[OfferExtended, OfferAccepted]);
    let placements = count(&[OfferAccepted, Placed]);

    FunnelMetrics {
        total,
        in_review,
        interviewing,
        offers,
        placements,
        rejected: count(&[Rejected, Withdrawn]),
        conversions: conversions(&[
            ("total", total),
            ("in_review", in_review),
            ("interviewing", interviewing),
            ("offers", offers),
            ("placements", placements),
        ]),
    }
}

// =============================================================================
// Attention
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionKind {
    OverdueTask,
    StaleReview,
    UnstaffedRole,
}

/// Something a recruiter should look at today
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttentionItem {
    pub kind: AttentionKind,
    pub id: String,
    pub description: String,
    /// Days overdue or waiting; zero for unstaffed roles
    pub days: i64,
}

/// Overdue tasks, submissions stuck in client review for more than
/// `stale_days`, and open roles nobody is being put forward for
pub fn attention_items(
    tasks: &[RecruiterTask],
    submissions: &[CandidateSubmission],
    roles: &[JobRole],
    today: NaiveDate,
    stale_days: i64,
) -> Vec<AttentionItem> {
    let mut items = Vec::new();

    for task in tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done && t.due_date < today)
    {
        items.push(AttentionItem {
            kind: AttentionKind::OverdueTask,
            id: task.id.clone(),
            description: task.title.clone(),
            days: days_between(task.due_date, today),
        });
    }

    for submission in submissions.iter().filter(|s| s.status.is_in_review()) {
        let waiting = days_between(submission.status_date, today);
        if waiting > stale_days {
            items.push(AttentionItem {
                kind: AttentionKind::StaleReview,
                id: submission.id.clone(),
                description: format!(
                    "candidate {} awaiting client feedback on {}",
                    submission.candidate_id, submission.job_role_id
                ),
                days: waiting,
            });
        }
    }

    let staffed: HashSet<&str> = submissions
        .iter()
        .filter(|s| !s.status.is_closed())
        .map(|s| s.job_role_id.as_str())
        .collect();
    for role in roles
        .iter()
        .filter(|r| r.status == RoleStatus::Open && !staffed.contains(r.id.as_str()))
    {
        items.push(AttentionItem {
            kind: AttentionKind::UnstaffedRole,
            id: role.id.clone(),
            description: role.title.clone(),
            days: 0,
        });
    }

    items.sort_by(|a, b| b.days.cmp(&a.days).then_with(|| a.id.cmp(&b.id)));
    items
}

// =============================================================================
// Candidates
// =============================================================================

/// Candidate as entered or imported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Comma-separated in imports
    #[serde(default)]
    pub skills: String,
}

impl CandidateInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FinsightError::validation("candidate name is required"));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(FinsightError::validation(format!(
                "email is required for {}",
                self.name.trim()
            )));
        }
        if !email.contains('@') {
            return Err(FinsightError::validation(format!(
                "invalid email '{}' for {}",
                email,
                self.name.trim()
            )));
        }
        Ok(())
    }
}

fn parse_skills(skills: &str) -> Vec<String> {
    skills
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate and create candidates, skipping rows that fail or whose email
/// is already known. Row keys are 1-based.
pub fn import_candidates(
    rows: &[CandidateInput],
    existing: &[Candidate],
    today: NaiveDate,
) -> BulkOutcome<Candidate> {
    let mut seen: HashSet<String> = existing
        .iter()
        .map(|c| c.email.trim().to_lowercase())
        .collect();
    let mut next_id = next_sequence(existing.iter().map(|c| c.id.as_str()), "cand");
    let mut outcome = BulkOutcome::default();

    for (index, row) in rows.iter().enumerate() {
        let result = row.validate().and_then(|()| {
            let email = row.email.trim().to_lowercase();
            if !seen.insert(email.clone()) {
                return Err(FinsightError::validation(format!(
                    "duplicate candidate email '{}'",
                    email
                )));
            }
            let candidate = Candidate {
                id: format!("cand-{:05}", next_id),
                name: row.name.trim().to_string(),
                email,
                phone: row
                    .phone
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
                skills: parse_skills(&row.skills),
                created_at: today,
            };
            next_id += 1;
            Ok(candidate)
        });
        outcome.push(format!("row {}", index + 1), result);
    }
    outcome
}

// =============================================================================
// CRM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub const ALL: [DealStage; 6] = [
        DealStage::Lead,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Lead => "lead",
            DealStage::Qualified => "qualified",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::ClosedWon => "closed_won",
            DealStage::ClosedLost => "closed_lost",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }

    /// Position on the progression toward a win; lost deals only count as leads
    fn progress(&self) -> usize {
        match self {
            DealStage::Lead | DealStage::ClosedLost => 0,
            DealStage::Qualified => 1,
            DealStage::Proposal => 2,
            DealStage::Negotiation => 3,
            DealStage::ClosedWon => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub stage: DealStage,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: DealStage,
    pub count: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub stages: Vec<StageSummary>,
    pub open_value: f64,
    pub won_value: f64,
    /// won / (won + lost) in percent
    pub win_rate: f64,
    /// Between successive stages, counting deals that reached at least each
    pub conversions: Vec<StageConversion>,
}

pub fn pipeline_metrics(deals: &[Deal]) -> PipelineMetrics {
    let stages: Vec<StageSummary> = DealStage::ALL
        .iter()
        .map(|stage| {
            let in_stage = deals.iter().filter(|d| d.stage == *stage);
            StageSummary {
                stage: *stage,
                count: in_stage.clone().count(),
                value: in_stage.map(|d| d.value).sum(),
            }
        })
        .collect();

    let count_of = |stage: DealStage| deals.iter().filter(|d| d.stage == stage).count();
    let won = count_of(DealStage::ClosedWon);
    let lost = count_of(DealStage::ClosedLost);

    let progression = [
        DealStage::Lead,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
    ];
    let reached: Vec<(&str, usize)> = progression
        .iter()
        .map(|stage| {
            let count = deals
                .iter()
                .filter(|d| d.stage.progress() >= stage.progress())
                .count();
            (stage.as_str(), count)
        })
        .collect();

    PipelineMetrics {
        open_value: deals
            .iter()
            .filter(|d| d.stage.is_open())
            .map(|d| d.value)
            .sum(),
        won_value: deals
            .iter()
            .filter(|d| d.stage == DealStage::ClosedWon)
            .map(|d| d.value)
            .sum(),
        win_rate: ratio_percent(won as f64, (won + lost) as f64),
        conversions: conversions(&reached),
        stages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::date;

    fn submission(id: &str, role: &str, status: SubmissionStatus, day: &str) -> CandidateSubmission {
        CandidateSubmission {
            id: id.to_string(),
            candidate_id: format!("c-{}", id),
            job_role_id: role.to_string(),
            status,
            status_date: date(day),
        }
    }

    fn deal(id: &str, stage: DealStage, value: f64) -> Deal {
        Deal {
            id: id.to_string(),
            name: id.to_string(),
            stage,
            value,
        }
    }

    #[test]
    fn test_funnel_overlapping_groups() {
        use SubmissionStatus::*;
        let subs = vec![
            submission("1", "r", Submitted, "2026-10-01"),
            submission("2", "r", ClientReview, "2026-10-01"),
            submission("3", "r", SubmittedToClient, "2026-10-01"),
            submission("4", "r", Interviewed, "2026-10-01"),
            submission("5", "r", OfferAccepted, "2026-10-01"),
            submission("6", "r", Placed, "2026-10-01"),
            submission("7", "r", Withdrawn, "2026-10-01"),
            submission("8", "r", Rejected, "2026-10-01"),
        ];
        let funnel = funnel_metrics(&subs);
        assert_eq!(funnel.total, 8);
        assert_eq!(funnel.in_review, 2);
        assert_eq!(funnel.interviewing, 1);
        assert_eq!(funnel.offers, 1);
        assert_eq!(funnel.placements, 2);
        assert_eq!(funnel.rejected, 2);
        assert_eq!(funnel.conversions[0].rate, 25.0);
        assert_eq!(funnel.conversions[3].rate, 200.0);
    }

    #[test]
    fn test_funnel_empty_rates_are_zero() {
        let funnel = funnel_metrics(&[]);
        assert!(funnel.conversions.iter().all(|c| c.rate == 0.0));
        assert_eq!(funnel.conversions.len(), 4);
    }

    #[test]
    fn test_attention_items() {
        let today = date("2026-10-19");
        let tasks = vec![
            RecruiterTask {
                id: "t1".to_string(),
                title: "Call back".to_string(),
                due_date: date("2026-10-15"),
                status: TaskStatus::Open,
            },
            RecruiterTask {
                id: "t2".to_string(),
                title: "Done already".to_string(),
                due_date: date("2026-10-01"),
                status: TaskStatus::Done,
            },
        ];
        let subs = vec![
            submission("s1", "r1", SubmissionStatus::ClientReview, "2026-10-01"),
            submission("s2", "r1", SubmissionStatus::ClientReview, "2026-10-12"),
            submission("s3", "r2", SubmissionStatus::Rejected, "2026-10-01"),
        ];
        let roles = vec![
            JobRole {
                id: "r1".to_string(),
                client_id: "k".to_string(),
                title: "Engineer".to_string(),
                status: RoleStatus::Open,
            },
            JobRole {
                id: "r2".to_string(),
                client_id: "k".to_string(),
                title: "Designer".to_string(),
                status: RoleStatus::Open,
            },
            JobRole {
                id: "r3".to_string(),
                client_id: "k".to_string(),
                title: "Filled".to_string(),
                status: RoleStatus::Filled,
            },
        ];

        let items = attention_items(&tasks, &subs, &roles, today, 7);
        let kinds: Vec<(AttentionKind, &str)> = items.iter().map(|i| (i.kind, i.id.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (AttentionKind::StaleReview, "s1"),
                (AttentionKind::OverdueTask, "t1"),
                (AttentionKind::UnstaffedRole, "r2"),
            ]
        );
        assert_eq!(items[0].days, 18);
    }

    #[test]
    fn test_import_candidates_continues_past_bad_rows() {
        let existing = vec![Candidate {
            id: "cand-00001".to_string(),
            name: "Known".to_string(),
            email: "known@example.com".to_string(),
            phone: None,
            skills: vec![],
            created_at: date("2026-01-01"),
        }];
        let rows = vec![
            CandidateInput {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                phone: Some(" ".to_string()),
                skills: "rust, sql,".to_string(),
            },
            CandidateInput {
                name: "".to_string(),
                email: "x@example.com".to_string(),
                ..CandidateInput::default()
            },
            CandidateInput {
                name: "No At".to_string(),
                email: "example.com".to_string(),
                ..CandidateInput::default()
            },
            CandidateInput {
                name: "Dup".to_string(),
                email: "KNOWN@example.com".to_string(),
                ..CandidateInput::default()
            },
            CandidateInput {
                name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                ..CandidateInput::default()
            },
        ];

        let outcome = import_candidates(&rows, &existing, date("2026-10-19"));
        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.created[0].id, "cand-00002");
        assert_eq!(outcome.created[0].skills, vec!["rust", "sql"]);
        assert_eq!(outcome.created[0].phone, None);
        assert_eq!(outcome.created[1].id, "cand-00003");
        let keys: Vec<&str> = outcome.errors.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["row 2", "row 3", "row 4"]);
    }

    #[test]
    fn test_import_candidates_never_reuses_deleted_ids() {
        let existing: Vec<Candidate> = ["cand-00001", "cand-00003"]
            .iter()
            .map(|id| Candidate {
                id: id.to_string(),
                name: id.to_string(),
                email: format!("{}@example.com", id),
                phone: None,
                skills: vec![],
                created_at: date("2026-01-01"),
            })
            .collect();
        let rows = vec![CandidateInput {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            ..CandidateInput::default()
        }];

        let outcome = import_candidates(&rows, &existing, date("2026-10-19"));
        assert_eq!(outcome.created[0].id, "cand-00004");
        assert!(existing.iter().all(|c| c.id != outcome.created[0].id));
    }

    #[test]
    fn test_pipeline_metrics() {
        let deals = vec![
            deal("a", DealStage::Lead, 100.0),
            deal("b", DealStage::Proposal, 200.0),
            deal("c", DealStage::ClosedWon, 300.0),
            deal("d", DealStage::ClosedLost, 400.0),
        ];
        let metrics = pipeline_metrics(&deals);
        assert_eq!(metrics.open_value, 300.0);
        assert_eq!(metrics.won_value, 300.0);
        assert_eq!(metrics.win_rate, 50.0);
        assert_eq!(metrics.stages.len(), 6);
        assert_eq!(metrics.stages[2].count, 1);
        // reached: lead 4, qualified 2, proposal 2, negotiation 1, won 1
        assert_eq!(metrics.conversions[0].rate, 50.0);
        assert_eq!(metrics.conversions[1].rate, 100.0);
        assert_eq!(metrics.conversions[2].rate, 50.0);
    }

    #[test]
    fn test_win_rate_without_closed_deals() {
        let metrics = pipeline_metrics(&[deal("a", DealStage::Lead, 1.0)]);
        assert_eq!(metrics.win_rate, 0.0);
    }
}
