use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{
    ApplicationId, ApplicationStatusView, ScholarshipApplication, StudentId, VerificationStatus,
};
use super::repository::sort_newest_first;

/// Number of merit recipients listed on the global dashboard.
pub const TOP_MERIT_RECIPIENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryScope {
    Student {
        student_id: StudentId,
        recent_limit: usize,
    },
    Global {
        recent_limit: usize,
    },
}

impl SummaryScope {
    pub fn label(&self) -> &'static str {
        match self {
            SummaryScope::Student { .. } => "student",
            SummaryScope::Global { .. } => "global",
        }
    }

    fn recent_limit(&self) -> usize {
        match self {
            SummaryScope::Student { recent_limit, .. } | SummaryScope::Global { recent_limit } => {
                *recent_limit
            }
        }
    }

    fn includes(&self, application: &ScholarshipApplication) -> bool {
        match self {
            SummaryScope::Student { student_id, .. } => &application.student_id == student_id,
            SummaryScope::Global { .. } => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: VerificationStatus,
    pub status_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodBreakdown {
    /// `"{academic_year} - {semester}"`.
    pub period: String,
    pub total: usize,
    pub statuses: Vec<StatusCount>,
    /// Sum of `total_allowance` over approved applications in the period.
    pub disbursed: Decimal,
    pub unique_students: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeritRecipient {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swa_grade: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpa: Option<Decimal>,
    pub units_enrolled: Option<i32>,
    pub merit_incentive: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatistics {
    pub scope: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
    pub total_applications: usize,
    pub statuses: Vec<StatusCount>,
    /// Applications still awaiting a decision (`pending` plus `under_review`).
    pub open_applications: usize,
    /// `approved / total`, or 0 for an empty collection.
    pub approval_rate: f64,
    /// Share of applications carrying a non-zero merit incentive.
    pub merit_rate: f64,
    pub total_disbursed: Decimal,
    pub total_base_allowance: Decimal,
    pub total_merit_incentive: Decimal,
    pub distinct_students: usize,
    pub recent_applications: Vec<ApplicationStatusView>,
    pub period_breakdown: Vec<PeriodBreakdown>,
    pub top_merit_recipients: Vec<MeritRecipient>,
}

impl ApplicationStatistics {
    pub fn count(&self, status: VerificationStatus) -> usize {
        self.statuses
            .iter()
            .find(|entry| entry.status == status)
            .map_or(0, |entry| entry.count)
    }
}

/// Reduce a collection of applications to dashboard statistics.
///
/// Pure function of its inputs: the collection order does not affect the result.
pub fn summarize(
    applications: &[ScholarshipApplication],
    scope: &SummaryScope,
) -> ApplicationStatistics {
    let mut selected: Vec<ScholarshipApplication> = applications
        .iter()
        .filter(|application| scope.includes(application))
        .cloned()
        .collect();
    sort_newest_first(&mut selected);

    let total = selected.len();
    let mut status_counts: HashMap<VerificationStatus, usize> = HashMap::new();
    let mut total_disbursed = Decimal::ZERO;
    let mut total_base_allowance = Decimal::ZERO;
    let mut total_merit_incentive = Decimal::ZERO;
    let mut with_merit = 0_usize;
    let mut students = BTreeSet::new();
    let mut periods: BTreeMap<String, PeriodAccumulator> = BTreeMap::new();

    for application in &selected {
        *status_counts
            .entry(application.verification_status)
            .or_default() += 1;
        students.insert(application.student_id.clone());
        if application.allowance.merit_incentive > Decimal::ZERO {
            with_merit += 1;
        }

        let period = periods.entry(application.period_label()).or_default();
        period.record(application);

        if let Some(allowance) = application.authoritative_allowance() {
            total_disbursed += allowance.total_allowance;
            total_base_allowance += allowance.base_allowance;
            total_merit_incentive += allowance.merit_incentive;
        }
    }

    let statuses = status_breakdown(&status_counts);
    let approved = status_counts
        .get(&VerificationStatus::Approved)
        .copied()
        .unwrap_or(0);
    let open_applications = VerificationStatus::ordered()
        .into_iter()
        .filter(|status| status.is_open())
        .map(|status| status_counts.get(&status).copied().unwrap_or(0))
        .sum();

    let recent_applications = selected
        .iter()
        .take(scope.recent_limit())
        .map(ScholarshipApplication::status_view)
        .collect();

    let period_breakdown = periods
        .into_iter()
        .map(|(period, accumulator)| accumulator.finish(period))
        .collect();

    let student_id = match scope {
        SummaryScope::Student { student_id, .. } => Some(student_id.clone()),
        SummaryScope::Global { .. } => None,
    };

    ApplicationStatistics {
        scope: scope.label(),
        student_id,
        total_applications: total,
        statuses,
        open_applications,
        approval_rate: rate(approved, total),
        merit_rate: rate(with_merit, total),
        total_disbursed,
        total_base_allowance,
        total_merit_incentive,
        distinct_students: students.len(),
        recent_applications,
        period_breakdown,
        top_merit_recipients: top_merit_recipients(&selected, TOP_MERIT_RECIPIENTS),
    }
}

/// Per-student standing on the reviewer roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentStanding {
    pub student_id: StudentId,
    pub total_applications: usize,
    pub approved_applications: usize,
    /// Sum of `total_allowance` over approved applications.
    pub allowance_received: Decimal,
    pub last_application_at: DateTime<Utc>,
}

/// One entry per student, most recently active first, ties by student id.
pub fn student_roster(applications: &[ScholarshipApplication]) -> Vec<StudentStanding> {
    let mut standings: BTreeMap<&StudentId, StudentStanding> = BTreeMap::new();

    for application in applications {
        let standing = standings
            .entry(&application.student_id)
            .or_insert_with(|| StudentStanding {
                student_id: application.student_id.clone(),
                total_applications: 0,
                approved_applications: 0,
                allowance_received: Decimal::ZERO,
                last_application_at: application.created_at,
            });
        standing.total_applications += 1;
        standing.last_application_at = standing.last_application_at.max(application.created_at);
        if let Some(allowance) = application.authoritative_allowance() {
            standing.approved_applications += 1;
            standing.allowance_received += allowance.total_allowance;
        }
    }

    let mut roster: Vec<StudentStanding> = standings.into_values().collect();
    roster.sort_by(|left, right| {
        right
            .last_application_at
            .cmp(&left.last_application_at)
            .then_with(|| left.student_id.cmp(&right.student_id))
    });
    roster
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

fn status_breakdown(counts: &HashMap<VerificationStatus, usize>) -> Vec<StatusCount> {
    VerificationStatus::ordered()
        .into_iter()
        .map(|status| StatusCount {
            status,
            status_label: status.label(),
            count: counts.get(&status).copied().unwrap_or(0),
        })
        .collect()
}

#[derive(Default)]
struct PeriodAccumulator {
    total: usize,
    counts: HashMap<VerificationStatus, usize>,
    disbursed: Decimal,
    students: BTreeSet<StudentId>,
}

impl PeriodAccumulator {
    fn record(&mut self, application: &ScholarshipApplication) {
        self.total += 1;
        *self
            .counts
            .entry(application.verification_status)
            .or_default() += 1;
        self.students.insert(application.student_id.clone());
        if let Some(allowance) = application.authoritative_allowance() {
            self.disbursed += allowance.total_allowance;
        }
    }

    fn finish(self, period: String) -> PeriodBreakdown {
        PeriodBreakdown {
            period,
            total: self.total,
            statuses: status_breakdown(&self.counts),
            disbursed: self.disbursed,
            unique_students: self.students.len(),
        }
    }
}

/// Applications with a merit incentive, strongest grade first. SWA-graded records rank
/// ahead of GPA-graded ones since the two scales are not comparable.
fn top_merit_recipients(
    newest_first: &[ScholarshipApplication],
    limit: usize,
) -> Vec<MeritRecipient> {
    let mut recipients: Vec<&ScholarshipApplication> = newest_first
        .iter()
        .filter(|application| application.allowance.merit_incentive > Decimal::ZERO)
        .collect();

    // Stable sort keeps newest-first order between equal grades.
    recipients.sort_by(|left, right| grade_rank(left, right));

    recipients
        .into_iter()
        .take(limit)
        .map(|application| MeritRecipient {
            application_id: application.id.clone(),
            student_id: application.student_id.clone(),
            period: application.period_label(),
            swa_grade: application.record.swa_grade,
            gpa: application.record.gpa,
            units_enrolled: application.record.units_enrolled,
            merit_incentive: application.allowance.merit_incentive,
        })
        .collect()
}

fn grade_rank(left: &ScholarshipApplication, right: &ScholarshipApplication) -> Ordering {
    let (l, r) = (&left.record, &right.record);
    match ((l.swa_grade, l.gpa), (r.swa_grade, r.gpa)) {
        ((Some(a), _), (Some(b), _)) => b.cmp(&a),
        ((Some(_), _), _) => Ordering::Less,
        (_, (Some(_), _)) => Ordering::Greater,
        ((None, Some(a)), (None, Some(b))) => a.cmp(&b),
        ((None, Some(_)), (None, None)) => Ordering::Less,
        ((None, None), (None, Some(_))) => Ordering::Greater,
        ((None, None), (None, None)) => Ordering::Equal,
    }
}
