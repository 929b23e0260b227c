use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use scholarship_ai::workflows::scholarship::{
    sort_newest_first, ApplicationFilter, ApplicationId, ApplicationRepository,
    CollaboratorError, DocumentReference, DocumentStore, DocumentUpload, ImportedReport,
    RepositoryError, ScholarshipApplication, VerificationClient, VerificationReport,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ScholarshipApplication>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
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
        if guard.contains_key(&application.id) {
            guard.insert(application.id.clone(), application);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
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
        let mut applications: Vec<_> = guard
            .values()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect();
        sort_newest_first(&mut applications);
        Ok(applications)
    }
}

/// Keeps uploaded documents in memory under `grades/<uuid>/<file name>`.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDocumentStore {
    documents: Arc<Mutex<HashMap<DocumentReference, DocumentUpload>>>,
}

impl InMemoryDocumentStore {
    pub(crate) fn len(&self) -> usize {
        self.documents.lock().expect("document mutex poisoned").len()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn store(&self, upload: DocumentUpload) -> Result<DocumentReference, CollaboratorError> {
        let file_name = stored_file_name(&upload);
        let reference = DocumentReference(format!("grades/{}/{}", Uuid::new_v4(), file_name));
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .insert(reference.clone(), upload);
        Ok(reference)
    }
}

/// Uploads without a usable name get one derived from their content type.
fn stored_file_name(upload: &DocumentUpload) -> String {
    let name = upload.file_name().trim();
    let has_extension = std::path::Path::new(name).extension().is_some();
    if !name.is_empty() && has_extension {
        return name.to_string();
    }

    let stem = if name.is_empty() { "document" } else { name };
    match mime_guess::get_mime_extensions(upload.content_type()).and_then(|exts| exts.first()) {
        Some(extension) => format!("{stem}.{extension}"),
        None => stem.to_string(),
    }
}

/// Answers verification requests from a table of pre-extracted facts.
///
/// Lookups try the full document reference first, then its final path segment, so
/// fixtures can be keyed by the uploaded file name.
#[derive(Default, Clone)]
pub(crate) struct FixtureVerificationClient {
    reports: Arc<HashMap<String, VerificationReport>>,
}

impl FixtureVerificationClient {
    pub(crate) fn from_imported(imported: Vec<ImportedReport>) -> Self {
        let reports = imported
            .into_iter()
            .map(|entry| (entry.document.0, entry.report))
            .collect();
        Self {
            reports: Arc::new(reports),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.reports.len()
    }

    fn lookup(&self, document: &DocumentReference) -> Option<&VerificationReport> {
        self.reports.get(&document.0).or_else(|| {
            document
                .0
                .rsplit('/')
                .next()
                .and_then(|file_name| self.reports.get(file_name))
        })
    }
}

#[async_trait]
impl VerificationClient for FixtureVerificationClient {
    async fn verify(
        &self,
        document: &DocumentReference,
    ) -> Result<VerificationReport, CollaboratorError> {
        self.lookup(document).cloned().ok_or_else(|| {
            CollaboratorError::Unavailable(format!("document analysis for {document}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholarship_ai::workflows::scholarship::parse_reports;

    const FACTS: &str = "document,units_enrolled,swa_grade,gpa,is_first_time_applicant,has_incomplete_or_withdrawn,has_failed_or_dropped,confidence\n\
grades.pdf,15,90,,no,no,no,95\n";

    #[tokio::test]
    async fn fixture_client_matches_uploaded_file_names() {
        let imported = parse_reports(FACTS.as_bytes()).expect("fixtures parse");
        let client = FixtureVerificationClient::from_imported(imported);
        let store = InMemoryDocumentStore::default();

        let upload = DocumentUpload::new("grades.pdf", "application/pdf", vec![1, 2, 3])
            .expect("valid upload");
        let reference = store.store(upload).await.expect("stored");
        assert!(reference.0.starts_with("grades/"));
        assert_eq!(store.len(), 1);

        let report = client.verify(&reference).await.expect("fixture found");
        assert!(matches!(report, VerificationReport::Extracted(_)));

        let unknown = client
            .verify(&DocumentReference("grades/other.pdf".to_string()))
            .await;
        assert!(matches!(unknown, Err(CollaboratorError::Unavailable(_))));
    }

    #[test]
    fn nameless_uploads_take_an_extension_from_their_content_type() {
        let upload =
            DocumentUpload::new("", "application/pdf", vec![1]).expect("valid upload");
        assert_eq!(stored_file_name(&upload), "document.pdf");

        let named = DocumentUpload::new("scan.png", "image/png", vec![1]).expect("valid upload");
        assert_eq!(stored_file_name(&named), "scan.png");
    }
}
