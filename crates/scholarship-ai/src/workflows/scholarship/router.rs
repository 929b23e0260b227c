use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::collaborators::{DocumentUpload, MAX_DOCUMENT_BYTES};
use super::coordinator::{ReviewAction, ReviewOutcome};
use super::domain::{
    ApplicationFilter, ApplicationId, ApplicationSubmission, ScholarshipApplication, StudentId,
    ValidationError, VerificationStatus,
};
use super::report::SummaryScope;
use super::repository::ApplicationRepository;
use super::service::{ApplicationServiceError, ScholarshipService};

/// Header carrying the original file name of an uploaded document.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Router builder exposing submission, review and dashboard endpoints.
pub fn application_router<R>(service: Arc<ScholarshipService<R>>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/scholarship/documents",
            post(upload_handler::<R>).layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES * 2)),
        )
        .route(
            "/api/v1/scholarship/applications",
            post(submit_handler::<R>).get(list_handler::<R>),
        )
        .route(
            "/api/v1/scholarship/applications/:application_id",
            get(status_handler::<R>)
                .patch(review_handler::<R>)
                .delete(delete_handler::<R>),
        )
        .route(
            "/api/v1/scholarship/applications/:application_id/reverify",
            post(reverify_handler::<R>),
        )
        .route("/api/v1/scholarship/summary", get(summary_handler::<R>))
        .route("/api/v1/scholarship/students", get(roster_handler::<R>))
        .with_state(service)
}

pub(crate) async fn upload_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("grades");

    let upload = match DocumentUpload::new(file_name, content_type, body.to_vec()) {
        Ok(upload) => upload,
        Err(error) => return error_response(error.into()),
    };

    match service.upload_document(upload).await {
        Ok(reference) => (
            StatusCode::CREATED,
            axum::Json(json!({ "document": reference })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    axum::Json(submission): axum::Json<ApplicationSubmission>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.submit(submission).await {
        Ok(receipt) => {
            let payload = json!({
                "application": receipt.application.status_view(),
                "verification": receipt.verification,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    Query(filter): Query<ApplicationFilter>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.list(&filter) {
        Ok(applications) => {
            let views: Vec<_> = applications
                .iter()
                .map(ScholarshipApplication::status_view)
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    status: VerificationStatus,
    #[serde(default)]
    note: Option<String>,
}

pub(crate) async fn review_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let action = ReviewAction::Transition {
        status: request.status,
        note: request.note,
    };
    match service
        .review(&ApplicationId(application_id), bearer_token(&headers), action)
        .await
    {
        Ok(ReviewOutcome::Transitioned(transition)) => {
            let payload = json!({
                "application": transition.application.status_view(),
                "previous_status": transition.previous.label(),
                "changed": transition.changed,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(ReviewOutcome::Deleted(_)) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service
        .review(
            &ApplicationId(application_id),
            bearer_token(&headers),
            ReviewAction::Delete,
        )
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reverify_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.reverify(&ApplicationId(application_id)).await {
        Ok(application) => (StatusCode::OK, axum::Json(application.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SummaryQuery {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    student_id: Option<String>,
}

pub(crate) async fn summary_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    headers: HeaderMap,
    Query(query): Query<SummaryQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let recent_limit = service.config().recent_applications;
    let scope = match (query.scope.as_deref(), query.student_id) {
        (Some("global"), _) => SummaryScope::Global { recent_limit },
        (None | Some("student"), Some(student_id)) if !student_id.trim().is_empty() => {
            SummaryScope::Student {
                student_id: StudentId(student_id),
                recent_limit,
            }
        }
        (None | Some("student"), _) => {
            return error_response(ValidationError::MissingField("student_id").into())
        }
        (Some(other), _) => {
            let payload = json!({ "error": format!("unknown summary scope '{other}'") });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match service.summarize(scope, bearer_token(&headers)) {
        Ok(statistics) => (StatusCode::OK, axum::Json(statistics)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn roster_handler<R>(
    State(service): State<Arc<ScholarshipService<R>>>,
    headers: HeaderMap,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.roster(bearer_token(&headers)) {
        Ok(roster) => (StatusCode::OK, axum::Json(roster)).into_response(),
        Err(error) => error_response(error),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

pub(crate) fn status_for(error: &ApplicationServiceError) -> StatusCode {
    match error {
        ApplicationServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::Busy(_) => StatusCode::CONFLICT,
        ApplicationServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ApplicationServiceError::ExternalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ApplicationServiceError::Authorization(_) => StatusCode::FORBIDDEN,
        ApplicationServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: ApplicationServiceError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}
