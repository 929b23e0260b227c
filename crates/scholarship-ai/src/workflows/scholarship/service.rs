use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::allowance::AllowanceCalculator;
use super::collaborators::{
    AuthorizationError, CollaboratorError, DocumentStore, DocumentUpload, ReviewerAuthorizer,
    VerificationClient,
};
use super::coordinator::{ReviewAction, ReviewCoordinator, ReviewOutcome};
use super::domain::{
    ApplicationFilter, ApplicationId, ApplicationSubmission, DocumentReference,
    ScholarshipApplication, ValidationError, VerificationStatus,
};
use super::lifecycle::{
    ApplicationLifecycle, ConfidenceRouting, ManualReviewRouting, RoutingPolicy,
};
use super::report::{
    student_roster, summarize, ApplicationStatistics, StudentStanding, SummaryScope,
};
use super::repository::{sort_newest_first, ApplicationRepository, RepositoryError};
use crate::config::ReviewConfig;

/// External systems the service talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub verifier: Arc<dyn VerificationClient>,
    pub authorizer: Arc<dyn ReviewerAuthorizer>,
}

/// Outcome of the verification attempt made during submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerificationAttempt {
    Completed { status: VerificationStatus },
    /// The application stays `pending` and can be retried with `reverify`.
    Deferred { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub application: ScholarshipApplication,
    pub verification: VerificationAttempt,
}

/// Service composing the lifecycle, review coordinator, repository and collaborators.
pub struct ScholarshipService<R> {
    repository: Arc<R>,
    lifecycle: Arc<ApplicationLifecycle>,
    coordinator: ReviewCoordinator<R>,
    collaborators: Collaborators,
    config: ReviewConfig,
}

impl<R> ScholarshipService<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, collaborators: Collaborators, config: ReviewConfig) -> Self {
        let routing: Arc<dyn RoutingPolicy> = match config.auto_approve_confidence {
            Some(auto_approve_at) => Arc::new(ConfidenceRouting { auto_approve_at }),
            None => Arc::new(ManualReviewRouting),
        };
        let lifecycle = ApplicationLifecycle::new(AllowanceCalculator::default(), routing);
        Self::with_lifecycle(repository, collaborators, lifecycle, config)
    }

    pub fn with_lifecycle(
        repository: Arc<R>,
        collaborators: Collaborators,
        lifecycle: ApplicationLifecycle,
        config: ReviewConfig,
    ) -> Self {
        let lifecycle = Arc::new(lifecycle);
        let coordinator = ReviewCoordinator::new(repository.clone(), lifecycle.clone());

        Self {
            repository,
            lifecycle,
            coordinator,
            collaborators,
            config,
        }
    }

    pub fn coordinator(&self) -> &ReviewCoordinator<R> {
        &self.coordinator
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Hand a validated upload to the document store.
    pub async fn upload_document(
        &self,
        upload: DocumentUpload,
    ) -> Result<DocumentReference, ApplicationServiceError> {
        let file_name = upload.file_name().to_string();
        let size = upload.size();
        let reference = self.collaborators.documents.store(upload).await?;
        info!(%reference, file_name = %file_name, size, "grade document stored");
        Ok(reference)
    }

    /// Create a `pending` application, then run automated verification once.
    ///
    /// A verification that times out or returns unusable data does not fail the
    /// submission; the receipt reports it as deferred.
    pub async fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<SubmissionReceipt, ApplicationServiceError> {
        let application = self.lifecycle.create(submission, Utc::now())?;
        let stored = self.repository.insert(application)?;
        info!(
            application_id = %stored.id,
            student_id = %stored.student_id,
            period = %stored.period_label(),
            "application submitted"
        );

        let id = stored.id.clone();
        match self.verify_guarded(&id).await {
            Ok(verified) => Ok(SubmissionReceipt {
                verification: VerificationAttempt::Completed {
                    status: verified.verification_status,
                },
                application: verified,
            }),
            Err(
                err @ (ApplicationServiceError::ExternalUnavailable(_)
                | ApplicationServiceError::Validation(_)
                | ApplicationServiceError::Busy(_)),
            ) => {
                warn!(application_id = %id, error = %err, "verification deferred");
                let application = self.repository.fetch(&id)?.unwrap_or(stored);
                Ok(SubmissionReceipt {
                    application,
                    verification: VerificationAttempt::Deferred {
                        reason: err.to_string(),
                    },
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Retry automated verification for an application still awaiting it.
    pub async fn reverify(
        &self,
        id: &ApplicationId,
    ) -> Result<ScholarshipApplication, ApplicationServiceError> {
        self.verify_guarded(id).await
    }

    /// Authorize the caller as a reviewer and apply `action` through the coordinator.
    pub async fn review(
        &self,
        id: &ApplicationId,
        credential: Option<&str>,
        action: ReviewAction,
    ) -> Result<ReviewOutcome, ApplicationServiceError> {
        let capability = self.collaborators.authorizer.authorize(credential)?;
        self.coordinator.request(id, &capability, action).await
    }

    pub fn get(
        &self,
        id: &ApplicationId,
    ) -> Result<ScholarshipApplication, ApplicationServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(id.clone()))
    }

    /// Applications matching `filter`, newest first.
    pub fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ScholarshipApplication>, ApplicationServiceError> {
        let mut applications = self.repository.list(filter)?;
        sort_newest_first(&mut applications);
        Ok(applications)
    }

    /// Dashboard statistics. The global scope is reviewer-only.
    pub fn summarize(
        &self,
        scope: SummaryScope,
        credential: Option<&str>,
    ) -> Result<ApplicationStatistics, ApplicationServiceError> {
        let applications = match &scope {
            SummaryScope::Student { student_id, .. } => self.repository.for_student(student_id)?,
            SummaryScope::Global { .. } => {
                self.collaborators.authorizer.authorize(credential)?;
                self.repository.list(&ApplicationFilter::default())?
            }
        };
        Ok(summarize(&applications, &scope))
    }

    /// Reviewer roster: one standing per student across all applications.
    pub fn roster(
        &self,
        credential: Option<&str>,
    ) -> Result<Vec<StudentStanding>, ApplicationServiceError> {
        self.collaborators.authorizer.authorize(credential)?;
        let applications = self.repository.list(&ApplicationFilter::default())?;
        Ok(student_roster(&applications))
    }

    async fn verify_guarded(
        &self,
        id: &ApplicationId,
    ) -> Result<ScholarshipApplication, ApplicationServiceError> {
        let runner = VerificationRunner {
            repository: self.repository.clone(),
            lifecycle: self.lifecycle.clone(),
            verifier: self.collaborators.verifier.clone(),
            timeout: self.config.verification_timeout,
        };
        let target = id.clone();

        self.coordinator
            .detached(id, move || async move { runner.run(&target).await })
            .await
    }
}

struct VerificationRunner<R> {
    repository: Arc<R>,
    lifecycle: Arc<ApplicationLifecycle>,
    verifier: Arc<dyn VerificationClient>,
    timeout: Duration,
}

impl<R> VerificationRunner<R>
where
    R: ApplicationRepository,
{
    async fn run(
        &self,
        id: &ApplicationId,
    ) -> Result<ScholarshipApplication, ApplicationServiceError> {
        let current = self
            .repository
            .fetch(id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(id.clone()))?;
        if current.verification_status != VerificationStatus::Pending {
            return Err(ValidationError::NotAwaitingVerification(
                current.verification_status.label(),
            )
            .into());
        }

        let attempt = tokio::time::timeout(self.timeout, self.verifier.verify(&current.document))
            .await
            .map_err(|_| CollaboratorError::TimedOut(self.timeout))
            .and_then(|result| result);
        let report = match attempt {
            Ok(report) => report,
            Err(error) => {
                let logged = self
                    .lifecycle
                    .record_unavailable(&current, &error.to_string(), Utc::now());
                if let Err(log_error) = self.repository.update(logged) {
                    warn!(
                        application_id = %id,
                        error = %log_error,
                        "verification attempt not logged"
                    );
                }
                return Err(error.into());
            }
        };

        let verified = self
            .lifecycle
            .apply_verification(&current, &report, Utc::now())?;
        self.repository.update(verified.clone())?;

        info!(
            application_id = %id,
            status = verified.verification_status.label(),
            total_allowance = %verified.allowance.total_allowance,
            merit_eligible = verified.merit_eligible,
            "verification applied"
        );
        Ok(verified)
    }
}

/// Error raised by the scholarship service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("application {0} has another operation in progress")]
    Busy(ApplicationId),
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("external collaborator unavailable: {0}")]
    ExternalUnavailable(String),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<CollaboratorError> for ApplicationServiceError {
    fn from(error: CollaboratorError) -> Self {
        ApplicationServiceError::ExternalUnavailable(error.to_string())
    }
}
