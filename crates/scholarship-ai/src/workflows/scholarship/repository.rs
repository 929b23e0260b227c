use super::domain::{ApplicationFilter, ApplicationId, ScholarshipApplication, StudentId};

/// Storage abstraction so the service and coordinator can be exercised in isolation.
///
/// Implementations only need per-call atomicity; exclusivity across a read-modify-write
/// cycle is the review coordinator's job.
pub trait ApplicationRepository: Send + Sync {
    fn insert(
        &self,
        application: ScholarshipApplication,
    ) -> Result<ScholarshipApplication, RepositoryError>;
    fn update(&self, application: ScholarshipApplication) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ScholarshipApplication>, RepositoryError>;
    fn remove(&self, id: &ApplicationId) -> Result<Option<ScholarshipApplication>, RepositoryError>;
    fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ScholarshipApplication>, RepositoryError>;

    fn for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<ScholarshipApplication>, RepositoryError> {
        self.list(&ApplicationFilter {
            student_id: Some(student_id.clone()),
            ..ApplicationFilter::default()
        })
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Newest first, ties broken by id so listings are stable.
pub fn sort_newest_first(applications: &mut [ScholarshipApplication]) {
    applications.sort_by(|left, right| {
        right
            .created_at
            .cmp(&left.created_at)
            .then_with(|| left.id.cmp(&right.id))
    });
}
