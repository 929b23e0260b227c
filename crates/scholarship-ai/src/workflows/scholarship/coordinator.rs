use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::collaborators::ReviewerCapability;
use super::domain::{ApplicationId, ScholarshipApplication, VerificationStatus};
use super::lifecycle::{ApplicationLifecycle, Transition};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::ApplicationServiceError;

/// Per-application busy markers. At most one mutation per id may hold the gate.
#[derive(Debug, Clone, Default)]
pub struct BusyGate {
    in_flight: Arc<Mutex<HashSet<ApplicationId>>>,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` busy. Returns `None` without waiting when another operation holds it.
    pub fn try_acquire(&self, id: &ApplicationId) -> Option<BusyGuard> {
        if self.markers().insert(id.clone()) {
            debug!(application_id = %id, "busy marker set");
            Some(BusyGuard {
                gate: self.clone(),
                id: id.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_busy(&self, id: &ApplicationId) -> bool {
        self.markers().contains(id)
    }

    pub fn in_flight(&self) -> usize {
        self.markers().len()
    }

    fn release(&self, id: &ApplicationId) {
        self.markers().remove(id);
        debug!(application_id = %id, "busy marker cleared");
    }

    // A panic while the map is locked must not wedge every id behind a poisoned mutex.
    fn markers(&self) -> MutexGuard<'_, HashSet<ApplicationId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the busy marker when dropped, whether the operation finished, failed or panicked.
#[derive(Debug)]
pub struct BusyGuard {
    gate: BusyGate,
    id: ApplicationId,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.gate.release(&self.id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    Transition {
        status: VerificationStatus,
        note: Option<String>,
    },
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Transitioned(Transition),
    Deleted(ScholarshipApplication),
}

/// Concurrency control for reviewer mutations. Holds no business rules: transitions are
/// delegated to the lifecycle and errors pass through untouched, except `Busy`.
pub struct ReviewCoordinator<R> {
    repository: Arc<R>,
    lifecycle: Arc<ApplicationLifecycle>,
    gate: BusyGate,
}

impl<R> Clone for ReviewCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            lifecycle: self.lifecycle.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<R> ReviewCoordinator<R>
where
    R: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, lifecycle: Arc<ApplicationLifecycle>) -> Self {
        Self {
            repository,
            lifecycle,
            gate: BusyGate::new(),
        }
    }

    pub fn gate(&self) -> &BusyGate {
        &self.gate
    }

    /// Run `operation` while holding the busy marker for `id`.
    pub async fn exclusive<F, T>(
        &self,
        id: &ApplicationId,
        operation: F,
    ) -> Result<T, ApplicationServiceError>
    where
        F: Future<Output = Result<T, ApplicationServiceError>>,
    {
        let _guard = match self.gate.try_acquire(id) {
            Some(guard) => guard,
            None => {
                warn!(application_id = %id, "rejected overlapping mutation");
                return Err(ApplicationServiceError::Busy(id.clone()));
            }
        };

        operation.await
    }

    /// Like [`exclusive`](Self::exclusive), but the operation runs on its own task so a
    /// caller that goes away mid-request does not abandon a half-finished mutation.
    pub async fn detached<F, Fut, T>(
        &self,
        id: &ApplicationId,
        operation: F,
    ) -> Result<T, ApplicationServiceError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApplicationServiceError>> + Send + 'static,
        T: Send + 'static,
    {
        let coordinator = self.clone();
        let id = id.clone();
        let task = tokio::spawn(async move { coordinator.exclusive(&id, operation()).await });

        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(ApplicationServiceError::Repository(
                RepositoryError::Unavailable(format!("mutation task cancelled: {err}")),
            )),
        }
    }

    /// Apply a reviewer action under the busy gate.
    pub async fn request(
        &self,
        id: &ApplicationId,
        capability: &ReviewerCapability,
        action: ReviewAction,
    ) -> Result<ReviewOutcome, ApplicationServiceError> {
        let coordinator = self.clone();
        let target = id.clone();
        let capability = capability.clone();

        self.detached(id, move || async move {
            coordinator.apply(&target, &capability, action)
        })
        .await
    }

    fn apply(
        &self,
        id: &ApplicationId,
        capability: &ReviewerCapability,
        action: ReviewAction,
    ) -> Result<ReviewOutcome, ApplicationServiceError> {
        match action {
            ReviewAction::Transition { status, note } => {
                let current = self
                    .repository
                    .fetch(id)?
                    .ok_or_else(|| ApplicationServiceError::NotFound(id.clone()))?;

                let transition =
                    self.lifecycle
                        .transition(&current, capability, status, note, Utc::now());

                if transition.changed {
                    self.repository.update(transition.application.clone())?;
                    info!(
                        application_id = %id,
                        reviewer = capability.reviewer(),
                        from = transition.previous.label(),
                        to = status.label(),
                        "application status changed"
                    );
                } else {
                    debug!(application_id = %id, status = status.label(), "transition was a no-op");
                }

                Ok(ReviewOutcome::Transitioned(transition))
            }
            ReviewAction::Delete => {
                let removed = self
                    .repository
                    .remove(id)?
                    .ok_or_else(|| ApplicationServiceError::NotFound(id.clone()))?;
                info!(
                    application_id = %id,
                    reviewer = capability.reviewer(),
                    "application deleted"
                );
                Ok(ReviewOutcome::Deleted(removed))
            }
        }
    }
}
