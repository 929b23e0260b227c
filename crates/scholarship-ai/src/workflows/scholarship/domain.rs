use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::allowance::AllowanceResult;

/// Malformed or missing input. Raised before any state is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("units enrolled cannot be negative (got {0})")]
    NegativeUnits(i32),
    #[error("SWA grade {0} is outside the 0-100 percentage scale")]
    SwaOutOfRange(Decimal),
    #[error("GPA {0} is outside the 1.00-5.00 scale")]
    GpaOutOfRange(Decimal),
    #[error("record carries both an SWA grade and a GPA; exactly one grading scale is allowed")]
    AmbiguousGradeScale,
    #[error("{field} value '{value}' is not numeric")]
    NonNumeric { field: &'static str, value: String },
    #[error("{field} value '{value}' is not a yes/no flag")]
    InvalidFlag { field: &'static str, value: String },
    #[error("confidence score {0} is outside 0-100")]
    ConfidenceOutOfRange(Decimal),
    #[error("unknown semester '{0}'")]
    UnknownSemester(String),
    #[error("unknown verification status '{0}'")]
    UnknownStatus(String),
    #[error("application is {0}; only pending applications can be re-verified")]
    NotAwaitingVerification(&'static str),
    #[error("document is {size} bytes; the limit is {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },
    #[error("document is empty")]
    EmptyDocument,
    #[error("content type '{0}' is not accepted; upload a PDF, JPEG or PNG")]
    UnsupportedContentType(String),
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of an application. Reviewers never own records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semester {
    Midterm,
    Finals,
}

impl Semester {
    pub const fn label(self) -> &'static str {
        match self {
            Semester::Midterm => "midterm",
            Semester::Finals => "finals",
        }
    }
}

impl FromStr for Semester {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "midterm" => Ok(Semester::Midterm),
            "finals" | "final" => Ok(Semester::Finals),
            other => Err(ValidationError::UnknownSemester(other.to_string())),
        }
    }
}

/// Position of an application in the review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::UnderReview => "under_review",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub const fn ordered() -> [VerificationStatus; 4] {
        [
            VerificationStatus::Pending,
            VerificationStatus::UnderReview,
            VerificationStatus::Approved,
            VerificationStatus::Rejected,
        ]
    }

    /// `pending` and `under_review` are the only statuses still awaiting a decision.
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            VerificationStatus::Pending | VerificationStatus::UnderReview
        )
    }
}

impl FromStr for VerificationStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "under_review" => Ok(VerificationStatus::UnderReview),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Academic facts extracted from a grade document. Every field stays `None` until
/// verification supplies it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub units_enrolled: Option<i32>,
    /// Semestral weighted average on the percentage scale.
    pub swa_grade: Option<Decimal>,
    /// Grade point average on the inverted 1.00 (best) to 5.00 scale.
    pub gpa: Option<Decimal>,
    pub is_first_time_applicant: Option<bool>,
    pub has_incomplete_or_withdrawn: Option<bool>,
    pub has_failed_or_dropped: Option<bool>,
}

impl AcademicRecord {
    /// Overlay freshly extracted facts, keeping values the extraction did not report.
    pub fn merged_with(&self, extracted: &AcademicRecord) -> AcademicRecord {
        let (swa_grade, gpa) = if extracted.swa_grade.is_some() || extracted.gpa.is_some() {
            (extracted.swa_grade, extracted.gpa)
        } else {
            (self.swa_grade, self.gpa)
        };

        AcademicRecord {
            units_enrolled: extracted.units_enrolled.or(self.units_enrolled),
            swa_grade,
            gpa,
            is_first_time_applicant: extracted
                .is_first_time_applicant
                .or(self.is_first_time_applicant),
            has_incomplete_or_withdrawn: extracted
                .has_incomplete_or_withdrawn
                .or(self.has_incomplete_or_withdrawn),
            has_failed_or_dropped: extracted
                .has_failed_or_dropped
                .or(self.has_failed_or_dropped),
        }
    }
}

/// Opaque handle returned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentReference(pub String);

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload accepted by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub student_id: StudentId,
    pub academic_year: String,
    pub semester: Semester,
    pub document: DocumentReference,
    #[serde(default)]
    pub is_first_time_applicant: Option<bool>,
}

impl ApplicationSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.student_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField("student_id"));
        }
        if self.academic_year.trim().is_empty() {
            return Err(ValidationError::MissingField("academic_year"));
        }
        if self.document.0.trim().is_empty() {
            return Err(ValidationError::MissingField("document"));
        }
        Ok(())
    }
}

/// Monetary breakdown persisted on the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceBreakdown {
    pub base_allowance: Decimal,
    pub merit_incentive: Decimal,
    pub total_allowance: Decimal,
}

impl From<&AllowanceResult> for AllowanceBreakdown {
    fn from(result: &AllowanceResult) -> Self {
        Self {
            base_allowance: result.base_allowance,
            merit_incentive: result.merit_incentive,
            total_allowance: result.total_allowance,
        }
    }
}

/// Who caused a status change recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum StatusActor {
    Verification,
    Reviewer(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: VerificationStatus,
    pub to: VerificationStatus,
    pub actor: StatusActor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Extracted,
    ExtractionFailed,
    /// The collaborator timed out or could not be reached; nothing was applied.
    Unavailable,
}

/// One automated verification attempt, kept whether or not it moved the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLogEntry {
    pub outcome: VerificationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Decimal>,
    /// Status after the attempt.
    pub status: VerificationStatus,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// One submission for a student, academic year and semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarshipApplication {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub academic_year: String,
    pub semester: Semester,
    pub record: AcademicRecord,
    pub allowance: AllowanceBreakdown,
    pub merit_eligible: bool,
    pub verification_status: VerificationStatus,
    pub document: DocumentReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_confidence_score: Option<Decimal>,
    pub ai_verification_notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub history: Vec<StatusChange>,
    #[serde(default)]
    pub verification_log: Vec<VerificationLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScholarshipApplication {
    /// Financial fields only count once a reviewer or policy approved the application.
    pub fn authoritative_allowance(&self) -> Option<AllowanceBreakdown> {
        (self.verification_status == VerificationStatus::Approved).then_some(self.allowance)
    }

    pub fn period_label(&self) -> String {
        format!("{} - {}", self.academic_year, self.semester.label())
    }

    pub(crate) fn append_note(&mut self, note: &str) {
        if note.trim().is_empty() {
            return;
        }
        if !self.ai_verification_notes.is_empty() {
            self.ai_verification_notes.push_str("\n\n");
        }
        self.ai_verification_notes.push_str(note.trim());
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            student_id: self.student_id.clone(),
            period: self.period_label(),
            status: self.verification_status.label(),
            base_allowance: self.allowance.base_allowance,
            merit_incentive: self.allowance.merit_incentive,
            total_allowance: self.allowance.total_allowance,
            merit_eligible: self.merit_eligible,
            admin_notes: self.admin_notes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized representation of an application for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub period: String,
    pub status: &'static str,
    pub base_allowance: Decimal,
    pub merit_incentive: Decimal,
    pub total_allowance: Decimal,
    pub merit_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional filters for listing applications, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<VerificationStatus>,
    #[serde(default)]
    pub semester: Option<Semester>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub student_id: Option<StudentId>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &ScholarshipApplication) -> bool {
        self.status
            .map_or(true, |status| application.verification_status == status)
            && self
                .semester
                .map_or(true, |semester| application.semester == semester)
            && self
                .academic_year
                .as_deref()
                .map_or(true, |year| application.academic_year == year)
            && self
                .student_id
                .as_ref()
                .map_or(true, |student| &application.student_id == student)
    }
}
