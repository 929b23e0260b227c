use crate::infra::{
    FixtureVerificationClient, InMemoryApplicationRepository, InMemoryDocumentStore,
};
use clap::Args;
use rust_decimal::Decimal;
use scholarship_ai::config::ReviewConfig;
use scholarship_ai::error::AppError;
use scholarship_ai::workflows::scholarship::{
    parse_reports, parse_reports_from_path, AcademicRecord, AllowanceCalculator,
    AllowanceResult, ApplicationStatistics, ApplicationSubmission, Collaborators,
    DocumentUpload, ImportedReport, ReviewAction, ReviewOutcome, ScholarshipService, Semester,
    StaticTokenAuthorizer, StudentId, SummaryScope, VerificationAttempt, VerificationReport,
    VerificationStatus,
};
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_REVIEWER_TOKEN: &str = "demo-reviewer";

const DEMO_FACTS: &str = "\
document,units_enrolled,swa_grade,gpa,is_first_time_applicant,has_incomplete_or_withdrawn,has_failed_or_dropped,confidence,notes
ana-grades.pdf,18,92.50,,no,no,no,96,Registrar copy with dry seal
ben-grades.pdf,12,,1.50,no,no,no,91,Underloaded semester
";

#[derive(Args, Debug)]
pub(crate) struct ComputeArgs {
    /// Units enrolled for the semester
    #[arg(long)]
    pub(crate) units: i32,
    /// Semestral weighted average on the percentage scale
    #[arg(long, conflicts_with = "gpa", required_unless_present = "gpa")]
    pub(crate) swa: Option<Decimal>,
    /// Grade point average on the 1.00 (best) to 5.00 scale
    #[arg(long)]
    pub(crate) gpa: Option<Decimal>,
    /// The student has never received the allowance before
    #[arg(long)]
    pub(crate) first_time: bool,
    /// The grade report lists an incomplete or withdrawn subject
    #[arg(long)]
    pub(crate) incomplete: bool,
    /// The grade report lists a failed or dropped subject
    #[arg(long)]
    pub(crate) failed: bool,
}

impl ComputeArgs {
    fn record(&self) -> AcademicRecord {
        AcademicRecord {
            units_enrolled: Some(self.units),
            swa_grade: self.swa,
            gpa: self.gpa,
            is_first_time_applicant: Some(self.first_time),
            has_incomplete_or_withdrawn: Some(self.incomplete),
            has_failed_or_dropped: Some(self.failed),
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// Extracted-facts CSV (document, units_enrolled, swa_grade, gpa, flags, confidence)
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Academic year used for the demo submissions
    #[arg(long, default_value = "2024-2025")]
    pub(crate) academic_year: String,
    /// Semester used for the demo submissions (midterm or finals)
    #[arg(long, default_value = "midterm")]
    pub(crate) semester: Semester,
    /// Print the global dashboard as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_allowance_compute(args: ComputeArgs) -> Result<(), AppError> {
    let result = AllowanceCalculator::default().compute(&args.record())?;
    render_allowance("Allowance", &result);
    Ok(())
}

pub(crate) fn run_allowance_batch(args: BatchArgs) -> Result<(), AppError> {
    let imported = parse_reports_from_path(&args.csv)?;
    println!(
        "Allowance batch for {} ({} rows)",
        args.csv.display(),
        imported.len()
    );
    render_batch(&AllowanceCalculator::default(), &imported);
    Ok(())
}

fn render_batch(calculator: &AllowanceCalculator, imported: &[ImportedReport]) {
    let mut disbursable = Decimal::ZERO;
    let mut merit = 0;

    for entry in imported {
        match &entry.report {
            VerificationReport::Extracted(facts) => match calculator.compute(&facts.record) {
                Ok(result) => {
                    if result.eligible_for_merit() {
                        merit += 1;
                    }
                    disbursable += result.total_allowance;
                    println!(
                        "  line {:>3} {:<24} {}",
                        entry.line,
                        entry.document.0,
                        result.summary()
                    );
                }
                Err(err) => println!(
                    "  line {:>3} {:<24} invalid record: {}",
                    entry.line, entry.document.0, err
                ),
            },
            VerificationReport::ExtractionFailed { reason } => println!(
                "  line {:>3} {:<24} extraction failed: {}",
                entry.line, entry.document.0, reason
            ),
        }
    }

    println!("  Merit recipients: {merit}");
    println!("  Total if approved: {disbursable}");
}

fn render_allowance(title: &str, result: &AllowanceResult) {
    println!("{title}");
    println!("  Base allowance: {}", result.base_allowance);
    println!("  Merit incentive: {}", result.merit_incentive);
    println!("  Total allowance: {}", result.total_allowance);
    println!("  Verdict: {}", result.summary());
    for reason in &result.reasons {
        println!("    - {reason}");
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        academic_year,
        semester,
        json,
    } = args;

    let documents = InMemoryDocumentStore::default();
    let verifier = FixtureVerificationClient::from_imported(parse_reports(DEMO_FACTS.as_bytes())?);
    let service = ScholarshipService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Collaborators {
            documents: Arc::new(documents.clone()),
            verifier: Arc::new(verifier),
            authorizer: Arc::new(StaticTokenAuthorizer::new(vec![
                DEMO_REVIEWER_TOKEN.to_string()
            ])),
        },
        ReviewConfig::default(),
    );

    println!("Scholarship allowance review demo ({academic_year} {})", semester.label());
    println!();
    println!("Submissions");

    let students = [
        ("2021-00042", "ana-grades.pdf"),
        ("2021-00077", "ben-grades.pdf"),
        ("2022-00105", "cara-grades.pdf"),
    ];
    let mut submitted = Vec::with_capacity(students.len());
    for (student, file_name) in students {
        let upload = DocumentUpload::new(file_name, "application/pdf", demo_document(student))?;
        let document = service.upload_document(upload).await?;
        let receipt = service
            .submit(ApplicationSubmission {
                student_id: StudentId(student.to_string()),
                academic_year: academic_year.clone(),
                semester,
                document,
                is_first_time_applicant: Some(false),
            })
            .await?;

        let verification = match &receipt.verification {
            VerificationAttempt::Completed { status } => format!("verified -> {}", status.label()),
            VerificationAttempt::Deferred { reason } => format!("deferred ({reason})"),
        };
        println!(
            "  {student}: {} total {} [{verification}]",
            receipt.application.verification_status.label(),
            receipt.application.allowance.total_allowance
        );
        submitted.push(receipt.application);
    }
    println!("  Documents stored: {}", documents.len());

    println!();
    println!("Reviewer decisions");
    let decisions = [
        (VerificationStatus::Approved, "Grades match registrar copy"),
        (VerificationStatus::Approved, "Base allowance only"),
    ];
    for (application, (status, note)) in submitted.iter().zip(decisions) {
        let outcome = service
            .review(
                &application.id,
                Some(DEMO_REVIEWER_TOKEN),
                ReviewAction::Transition {
                    status,
                    note: Some(note.to_string()),
                },
            )
            .await?;
        if let ReviewOutcome::Transitioned(transition) = outcome {
            println!(
                "  {}: {} -> {}",
                transition.application.student_id,
                transition.previous.label(),
                transition.application.verification_status.label()
            );
        }
    }

    if let Some(deferred) = submitted.last() {
        let refused = service
            .review(&deferred.id, Some("student-token"), ReviewAction::Delete)
            .await;
        if let Err(err) = refused {
            println!("  Delete without reviewer authority refused: {err}");
        }
    }

    println!();
    let recent_limit = service.config().recent_applications;
    let statistics = service.summarize(
        SummaryScope::Global { recent_limit },
        Some(DEMO_REVIEWER_TOKEN),
    )?;
    if json {
        match serde_json::to_string_pretty(&statistics) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Dashboard payload unavailable: {err}"),
        }
    } else {
        render_statistics(&statistics);
    }

    let student = service.summarize(
        SummaryScope::Student {
            student_id: StudentId("2021-00042".to_string()),
            recent_limit,
        },
        None,
    )?;
    println!();
    println!(
        "Student 2021-00042: {} application(s), {} disbursed",
        student.total_applications, student.total_disbursed
    );

    println!();
    println!("Students:");
    for standing in service.roster(Some(DEMO_REVIEWER_TOKEN))? {
        println!(
            "  {}: {} application(s), {} approved, {} received",
            standing.student_id.0,
            standing.total_applications,
            standing.approved_applications,
            standing.allowance_received
        );
    }

    Ok(())
}

fn render_statistics(statistics: &ApplicationStatistics) {
    println!("Dashboard ({})", statistics.scope);
    println!("  Applications: {}", statistics.total_applications);
    for entry in &statistics.statuses {
        println!("    {:<13} {}", entry.status_label, entry.count);
    }
    println!("  Open for review: {}", statistics.open_applications);
    println!("  Approval rate: {:.0}%", statistics.approval_rate * 100.0);
    println!("  Merit rate: {:.0}%", statistics.merit_rate * 100.0);
    println!("  Disbursed: {}", statistics.total_disbursed);
    println!(
        "    base {} + merit {}",
        statistics.total_base_allowance, statistics.total_merit_incentive
    );

    if !statistics.period_breakdown.is_empty() {
        println!("  By period:");
        for period in &statistics.period_breakdown {
            println!(
                "    {}: {} application(s), {} student(s), {} disbursed",
                period.period, period.total, period.unique_students, period.disbursed
            );
        }
    }

    if statistics.top_merit_recipients.is_empty() {
        println!("  Merit recipients: none");
    } else {
        println!("  Merit recipients:");
        for recipient in &statistics.top_merit_recipients {
            let grade = match (recipient.swa_grade, recipient.gpa) {
                (Some(swa), _) => format!("SWA {swa}"),
                (None, Some(gpa)) => format!("GPA {gpa}"),
                (None, None) => "grade not on file".to_string(),
            };
            println!(
                "    - {} {} ({grade})",
                recipient.student_id, recipient.period
            );
        }
    }
}

/// Placeholder bytes standing in for a scanned grade report.
fn demo_document(student: &str) -> Vec<u8> {
    format!("%PDF-1.4\n% grade report for {student}\n").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_args_build_a_complete_record() {
        let args = ComputeArgs {
            units: 15,
            swa: Some(Decimal::new(90, 0)),
            gpa: None,
            first_time: false,
            incomplete: false,
            failed: true,
        };

        let result = AllowanceCalculator::default()
            .compute(&args.record())
            .expect("valid record");
        assert!(!result.eligible_for_merit());
        assert_eq!(result.total_allowance, Decimal::new(500_000, 2));
    }

    #[test]
    fn demo_fixtures_cover_both_grading_scales() {
        let imported = parse_reports(DEMO_FACTS.as_bytes()).expect("fixtures parse");
        assert_eq!(imported.len(), 2);

        let calculator = AllowanceCalculator::default();
        let eligible: Vec<_> = imported
            .iter()
            .filter_map(|entry| match &entry.report {
                VerificationReport::Extracted(facts) => calculator.compute(&facts.record).ok(),
                VerificationReport::ExtractionFailed { .. } => None,
            })
            .map(|result| result.eligible_for_merit())
            .collect();
        assert_eq!(eligible, vec![true, false]);
    }

    #[tokio::test]
    async fn demo_runs_end_to_end() {
        run_demo(DemoArgs {
            academic_year: "2024-2025".to_string(),
            semester: Semester::Midterm,
            json: true,
        })
        .await
        .expect("demo completes");
    }
}
