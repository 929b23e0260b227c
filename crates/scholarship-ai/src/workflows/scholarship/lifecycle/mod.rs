//! Status transitions and the side effects they carry.
//!
//! Every operation here works on a copy of the application and hands the updated copy
//! back, so a caller persists either the whole change or nothing.

mod routing;

pub use routing::{ConfidenceRouting, ManualReviewRouting, RoutingPolicy};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::allowance::{AllowanceCalculator, AllowanceResult};
use super::collaborators::{ReviewerCapability, VerificationReport};
use super::domain::{
    AcademicRecord, AllowanceBreakdown, ApplicationId, ApplicationSubmission,
    ScholarshipApplication, StatusActor, StatusChange, ValidationError, VerificationLogEntry,
    VerificationOutcome, VerificationStatus,
};

/// Result of a reviewer transition. `changed` is false for idempotent repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub application: ScholarshipApplication,
    pub previous: VerificationStatus,
    pub changed: bool,
}

pub struct ApplicationLifecycle {
    calculator: AllowanceCalculator,
    routing: Arc<dyn RoutingPolicy>,
}

impl ApplicationLifecycle {
    pub fn new(calculator: AllowanceCalculator, routing: Arc<dyn RoutingPolicy>) -> Self {
        Self {
            calculator,
            routing,
        }
    }

    /// Build a `pending` application with allowances computed from whatever facts the
    /// submission already carries.
    pub fn create(
        &self,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Result<ScholarshipApplication, ValidationError> {
        submission.validate()?;

        let record = AcademicRecord {
            is_first_time_applicant: submission.is_first_time_applicant,
            ..AcademicRecord::default()
        };
        let result = self.calculator.compute(&record)?;

        Ok(ScholarshipApplication {
            id: ApplicationId::generate(),
            student_id: submission.student_id,
            academic_year: submission.academic_year.trim().to_string(),
            semester: submission.semester,
            record,
            allowance: AllowanceBreakdown::from(&result),
            merit_eligible: result.eligible_for_merit(),
            verification_status: VerificationStatus::Pending,
            document: submission.document,
            ai_confidence_score: None,
            ai_verification_notes: String::new(),
            admin_notes: None,
            history: Vec::new(),
            verification_log: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Move an application to `status` on a reviewer's authority.
    ///
    /// Allowances are left as automated verification last computed them. Repeating the
    /// current status is accepted: nothing is recorded unless the note differs. Every
    /// recorded note is also appended to the notes trail, so later edits never lose it.
    pub fn transition(
        &self,
        application: &ScholarshipApplication,
        capability: &ReviewerCapability,
        status: VerificationStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Transition {
        let previous = application.verification_status;
        let note = note
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let note_changed = note.is_some() && note != application.admin_notes;
        if previous == status && !note_changed {
            return Transition {
                application: application.clone(),
                previous,
                changed: false,
            };
        }

        let mut updated = application.clone();
        updated.verification_status = status;
        if let Some(text) = &note {
            updated.append_note(&format!("Reviewer note ({}): {text}", capability.reviewer()));
            updated.admin_notes = Some(text.clone());
        }
        updated.updated_at = now;

        if previous != status {
            updated.history.push(StatusChange {
                from: previous,
                to: status,
                actor: StatusActor::Reviewer(capability.reviewer().to_string()),
                note,
                at: now,
            });
        }

        Transition {
            application: updated,
            previous,
            changed: true,
        }
    }

    /// Attach the outcome of automated verification, recompute allowances from the
    /// extracted facts and route the status through the configured policy.
    pub fn apply_verification(
        &self,
        application: &ScholarshipApplication,
        report: &VerificationReport,
        now: DateTime<Utc>,
    ) -> Result<ScholarshipApplication, ValidationError> {
        let mut updated = application.clone();

        let (status, outcome, detail) = match report {
            VerificationReport::Extracted(facts) => {
                if let Some(confidence) = facts.confidence {
                    if confidence < Decimal::ZERO || confidence > Decimal::ONE_HUNDRED {
                        return Err(ValidationError::ConfidenceOutOfRange(confidence));
                    }
                }

                let record = application.record.merged_with(&facts.record);
                let result = self.calculator.compute(&record)?;
                let status = self.routing.route(report, Some(&result));

                updated.record = record;
                updated.allowance = AllowanceBreakdown::from(&result);
                updated.merit_eligible = result.eligible_for_merit();
                updated.ai_confidence_score = facts.confidence;
                updated.append_note(&verification_note(&facts.notes, facts.confidence, &result));
                (status, VerificationOutcome::Extracted, result.summary())
            }
            VerificationReport::ExtractionFailed { reason } => {
                updated.append_note(&format!("Document analysis failed: {reason}"));
                let status = self.routing.route(report, None);
                (status, VerificationOutcome::ExtractionFailed, reason.clone())
            }
        };

        if status != updated.verification_status {
            updated.history.push(StatusChange {
                from: updated.verification_status,
                to: status,
                actor: StatusActor::Verification,
                note: None,
                at: now,
            });
            updated.verification_status = status;
        }
        updated.verification_log.push(VerificationLogEntry {
            outcome,
            confidence: report.confidence(),
            status,
            detail,
            at: now,
        });
        updated.updated_at = now;

        Ok(updated)
    }

    /// Log a verification attempt that produced no report. Status, facts and allowances
    /// stay as they were.
    pub fn record_unavailable(
        &self,
        application: &ScholarshipApplication,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ScholarshipApplication {
        let mut updated = application.clone();
        updated.verification_log.push(VerificationLogEntry {
            outcome: VerificationOutcome::Unavailable,
            confidence: None,
            status: updated.verification_status,
            detail: reason.to_string(),
            at: now,
        });
        updated.updated_at = now;
        updated
    }
}

fn verification_note(
    analysis: &str,
    confidence: Option<Decimal>,
    result: &AllowanceResult,
) -> String {
    let mut lines = Vec::with_capacity(result.reasons.len() + 3);
    if !analysis.trim().is_empty() {
        lines.push(analysis.trim().to_string());
    }
    if let Some(confidence) = confidence {
        lines.push(format!("Extraction confidence: {confidence}%"));
    }
    lines.extend(result.reasons.iter().map(|reason| format!("- {reason}")));
    lines.push(result.summary());
    lines.join("\n")
}
