use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::ReviewConfig;
use crate::workflows::scholarship::allowance::AllowanceCalculator;
use crate::workflows::scholarship::collaborators::{
    CollaboratorError, DocumentStore, DocumentUpload, ExtractedFacts, StaticTokenAuthorizer,
    VerificationClient, VerificationReport,
};
use crate::workflows::scholarship::domain::{
    AcademicRecord, AllowanceBreakdown, ApplicationFilter, ApplicationId, ApplicationSubmission,
    DocumentReference, ScholarshipApplication, Semester, StudentId, VerificationStatus,
};
use crate::workflows::scholarship::lifecycle::{ApplicationLifecycle, ManualReviewRouting};
use crate::workflows::scholarship::repository::{ApplicationRepository, RepositoryError};
use crate::workflows::scholarship::service::{Collaborators, ScholarshipService};

pub(super) const REVIEWER_TOKEN: &str = "registrar-secret";

pub(super) fn lifecycle() -> ApplicationLifecycle {
    ApplicationLifecycle::new(AllowanceCalculator::default(), Arc::new(ManualReviewRouting))
}

pub(super) fn submission(student: &str, document: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        student_id: StudentId(student.to_string()),
        academic_year: "2024-2025".to_string(),
        semester: Semester::Midterm,
        document: DocumentReference(document.to_string()),
        is_first_time_applicant: Some(false),
    }
}

pub(super) fn record(units: i32, swa: Decimal) -> AcademicRecord {
    AcademicRecord {
        units_enrolled: Some(units),
        swa_grade: Some(swa),
        gpa: None,
        is_first_time_applicant: Some(false),
        has_incomplete_or_withdrawn: Some(false),
        has_failed_or_dropped: Some(false),
    }
}

pub(super) fn extracted(units: i32, swa: Decimal) -> VerificationReport {
    VerificationReport::Extracted(ExtractedFacts {
        record: AcademicRecord {
            is_first_time_applicant: None,
            ..record(units, swa)
        },
        confidence: Some(Decimal::new(95, 0)),
        notes: "Grade report parsed".to_string(),
    })
}

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// A stored application built directly, bypassing the lifecycle.
pub(super) fn application(
    id: &str,
    student: &str,
    status: VerificationStatus,
    merit: bool,
    created_at: DateTime<Utc>,
) -> ScholarshipApplication {
    let base = Decimal::new(5000, 0);
    let merit_incentive = if merit { Decimal::new(5000, 0) } else { Decimal::ZERO };
    ScholarshipApplication {
        id: ApplicationId(id.to_string()),
        student_id: StudentId(student.to_string()),
        academic_year: "2024-2025".to_string(),
        semester: Semester::Midterm,
        record: record(if merit { 18 } else { 12 }, Decimal::new(90, 0)),
        allowance: AllowanceBreakdown {
            base_allowance: base,
            merit_incentive,
            total_allowance: base + merit_incentive,
        },
        merit_eligible: merit,
        verification_status: status,
        document: DocumentReference(format!("doc-{id}")),
        ai_confidence_score: None,
        ai_verification_notes: String::new(),
        admin_notes: None,
        history: Vec::new(),
        verification_log: Vec::new(),
        created_at,
        updated_at: created_at,
    }
}

pub(super) fn review_config() -> ReviewConfig {
    ReviewConfig {
        verification_timeout: Duration::from_millis(200),
        recent_applications: 5,
        auto_approve_confidence: None,
        reviewer_tokens: vec![REVIEWER_TOKEN.to_string()],
    }
}

pub(super) fn collaborators(verifier: Arc<dyn VerificationClient>) -> Collaborators {
    Collaborators {
        documents: Arc::new(MemoryDocuments::default()),
        verifier,
        authorizer: Arc::new(StaticTokenAuthorizer::new(vec![REVIEWER_TOKEN.to_string()])),
    }
}

pub(super) fn build_service(
    verifier: Arc<dyn VerificationClient>,
) -> (Arc<ScholarshipService<MemoryRepository>>, Arc<MemoryRepository>) {
    build_service_with(verifier, review_config())
}

pub(super) fn build_service_with(
    verifier: Arc<dyn VerificationClient>,
    config: ReviewConfig,
) -> (Arc<ScholarshipService<MemoryRepository>>, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ScholarshipService::new(repository.clone(), collaborators(verifier), config);
    (Arc::new(service), repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ApplicationId, ScholarshipApplication>>>,
}

impl MemoryRepository {
    pub(super) fn seeded(applications: Vec<ScholarshipApplication>) -> Self {
        let repository = Self::default();
        for application in applications {
            repository.insert(application).expect("seed application");
        }
        repository
    }

    pub(super) fn only(&self) -> ScholarshipApplication {
        let guard = self.records.lock().expect("repository mutex poisoned");
        assert_eq!(guard.len(), 1, "expected exactly one stored application");
        guard.values().next().cloned().expect("one application")
    }
}

impl ApplicationRepository for MemoryRepository {
    fn insert(
        &self,
        application: ScholarshipApplication,
    ) -> Result<ScholarshipApplication, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update(&self, application: ScholarshipApplication) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(&application.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(application.id.clone(), application);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ScholarshipApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ScholarshipApplication>, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.remove(id))
    }

    fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ScholarshipApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(
        &self,
        _application: ScholarshipApplication,
    ) -> Result<ScholarshipApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _application: ScholarshipApplication) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ScholarshipApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ScholarshipApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(
        &self,
        _filter: &ApplicationFilter,
    ) -> Result<Vec<ScholarshipApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryDocuments {
    stored: AtomicUsize,
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn store(&self, upload: DocumentUpload) -> Result<DocumentReference, CollaboratorError> {
        let sequence = self.stored.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(DocumentReference(format!(
            "doc-{sequence:04}-{}",
            upload.file_name()
        )))
    }
}

pub(super) struct OfflineDocuments;

#[async_trait]
impl DocumentStore for OfflineDocuments {
    async fn store(&self, _upload: DocumentUpload) -> Result<DocumentReference, CollaboratorError> {
        Err(CollaboratorError::Unavailable("document store".to_string()))
    }
}

/// Answers every document with the same report.
pub(super) struct ScriptedVerifier {
    report: VerificationReport,
}

impl ScriptedVerifier {
    pub(super) fn new(report: VerificationReport) -> Arc<Self> {
        Arc::new(Self { report })
    }
}

#[async_trait]
impl VerificationClient for ScriptedVerifier {
    async fn verify(
        &self,
        _document: &DocumentReference,
    ) -> Result<VerificationReport, CollaboratorError> {
        Ok(self.report.clone())
    }
}

pub(super) struct OfflineVerifier;

#[async_trait]
impl VerificationClient for OfflineVerifier {
    async fn verify(
        &self,
        _document: &DocumentReference,
    ) -> Result<VerificationReport, CollaboratorError> {
        Err(CollaboratorError::Unavailable("document analysis".to_string()))
    }
}

/// Never answers within any reasonable timeout.
pub(super) struct StalledVerifier;

#[async_trait]
impl VerificationClient for StalledVerifier {
    async fn verify(
        &self,
        _document: &DocumentReference,
    ) -> Result<VerificationReport, CollaboratorError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(CollaboratorError::Unavailable("document analysis".to_string()))
    }
}

/// Holds each verification open until the test releases it.
pub(super) struct GatedVerifier {
    pub(super) entered: Notify,
    pub(super) release: Notify,
    report: VerificationReport,
}

impl GatedVerifier {
    pub(super) fn new(report: VerificationReport) -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            report,
        })
    }
}

#[async_trait]
impl VerificationClient for GatedVerifier {
    async fn verify(
        &self,
        _document: &DocumentReference,
    ) -> Result<VerificationReport, CollaboratorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.report.clone())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
