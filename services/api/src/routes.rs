use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use scholarship_ai::error::AppError;
use scholarship_ai::workflows::scholarship::{
    application_router, AcademicRecord, AllowanceCalculator, AllowanceResult,
    ApplicationRepository, ScholarshipService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_application_routes<R>(service: Arc<ScholarshipService<R>>) -> axum::Router
where
    R: ApplicationRepository + 'static,
{
    application_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/scholarship/allowance/preview",
            axum::routing::post(allowance_preview_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Runs the calculator on a record without creating an application.
pub(crate) async fn allowance_preview_endpoint(
    Json(record): Json<AcademicRecord>,
) -> Result<Json<AllowanceResult>, AppError> {
    let result = AllowanceCalculator::default().compute(&record)?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        FixtureVerificationClient, InMemoryApplicationRepository, InMemoryDocumentStore,
    };
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal::Decimal;
    use scholarship_ai::config::ReviewConfig;
    use scholarship_ai::workflows::scholarship::{Collaborators, StaticTokenAuthorizer};
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn record(units: i32, swa: i64) -> AcademicRecord {
        AcademicRecord {
            units_enrolled: Some(units),
            swa_grade: Some(Decimal::new(swa, 0)),
            gpa: None,
            is_first_time_applicant: Some(false),
            has_incomplete_or_withdrawn: Some(false),
            has_failed_or_dropped: Some(false),
        }
    }

    fn router(ready: bool) -> axum::Router {
        let service = Arc::new(ScholarshipService::new(
            Arc::new(InMemoryApplicationRepository::default()),
            Collaborators {
                documents: Arc::new(InMemoryDocumentStore::default()),
                verifier: Arc::new(FixtureVerificationClient::default()),
                authorizer: Arc::new(StaticTokenAuthorizer::default()),
            },
            ReviewConfig::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_application_routes(service).layer(Extension(state))
    }

    #[tokio::test]
    async fn allowance_preview_grants_merit_for_qualifying_records() {
        let Json(result) = allowance_preview_endpoint(Json(record(15, 90)))
            .await
            .expect("record is valid");

        assert!(result.eligible_for_merit());
        assert_eq!(result.total_allowance, Decimal::new(1_000_000, 2));
    }

    #[tokio::test]
    async fn allowance_preview_withholds_merit_below_unit_load() {
        let Json(result) = allowance_preview_endpoint(Json(record(12, 95)))
            .await
            .expect("record is valid");

        assert!(!result.eligible_for_merit());
        assert_eq!(result.total_allowance, Decimal::new(500_000, 2));
    }

    #[tokio::test]
    async fn allowance_preview_rejects_dual_grade_scales() {
        let mut dual = record(15, 90);
        dual.gpa = Some(Decimal::new(150, 2));

        let error = allowance_preview_endpoint(Json(dual))
            .await
            .expect_err("ambiguous record");
        assert_eq!(
            error.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn readiness_tracks_the_flag() {
        let initializing = router(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(initializing.status(), StatusCode::SERVICE_UNAVAILABLE);

        let ready = router(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_scholarship_routes_share_one_router() {
        let app = router(true);

        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(health.status(), StatusCode::OK);

        let listing = app
            .oneshot(
                Request::get("/api/v1/scholarship/applications")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(listing.status(), StatusCode::OK);
    }
}
