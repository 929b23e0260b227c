//! Scholarship allowance review: eligibility and allowance computation, the application
//! lifecycle, per-application review coordination and dashboard aggregation.

pub mod allowance;
pub mod collaborators;
pub mod coordinator;
pub mod domain;
pub mod import;
pub mod lifecycle;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use allowance::{
    AcademicFact, AllowanceCalculator, AllowancePolicy, AllowanceResult, MeritCriterion,
    MeritEligibility,
};
pub use collaborators::{
    AuthorizationError, CollaboratorError, DocumentStore, DocumentUpload, ExtractedFacts,
    ReviewerAuthorizer, ReviewerCapability, StaticTokenAuthorizer, VerificationClient,
    VerificationReport, MAX_DOCUMENT_BYTES,
};
pub use coordinator::{BusyGate, BusyGuard, ReviewAction, ReviewCoordinator, ReviewOutcome};
pub use domain::{
    AcademicRecord, AllowanceBreakdown, ApplicationFilter, ApplicationId, ApplicationStatusView,
    ApplicationSubmission, DocumentReference, ScholarshipApplication, Semester, StatusActor,
    StatusChange, StudentId, ValidationError, VerificationLogEntry, VerificationOutcome,
    VerificationStatus,
};
pub use import::{parse_reports, parse_reports_from_path, ImportError, ImportedReport};
pub use lifecycle::{
    ApplicationLifecycle, ConfidenceRouting, ManualReviewRouting, RoutingPolicy, Transition,
};
pub use report::{
    student_roster, summarize, ApplicationStatistics, MeritRecipient, PeriodBreakdown,
    StatusCount, StudentStanding, SummaryScope,
};
pub use repository::{sort_newest_first, ApplicationRepository, RepositoryError};
pub use router::application_router;
pub use service::{
    ApplicationServiceError, Collaborators, ScholarshipService, SubmissionReceipt,
    VerificationAttempt,
};
