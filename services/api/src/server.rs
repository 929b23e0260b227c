use crate::cli::ServeArgs;
use crate::infra::{
    AppState, FixtureVerificationClient, InMemoryApplicationRepository, InMemoryDocumentStore,
};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scholarship_ai::config::AppConfig;
use scholarship_ai::error::AppError;
use scholarship_ai::telemetry;
use scholarship_ai::workflows::scholarship::{
    parse_reports_from_path, Collaborators, ScholarshipService, StaticTokenAuthorizer,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let verifier = match args.verification_csv.take() {
        Some(path) => {
            let client = FixtureVerificationClient::from_imported(parse_reports_from_path(&path)?);
            info!(path = %path.display(), documents = client.len(), "verification fixtures loaded");
            client
        }
        None => {
            warn!("no verification fixtures configured; submissions will stay pending");
            FixtureVerificationClient::default()
        }
    };
    if config.review.reviewer_tokens.is_empty() {
        warn!("APP_REVIEWER_TOKENS is empty; review endpoints will reject every caller");
    }

    let collaborators = Collaborators {
        documents: Arc::new(InMemoryDocumentStore::default()),
        verifier: Arc::new(verifier),
        authorizer: Arc::new(StaticTokenAuthorizer::new(
            config.review.reviewer_tokens.clone(),
        )),
    };
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let scholarship_service = Arc::new(ScholarshipService::new(
        repository,
        collaborators,
        config.review.clone(),
    ));

    let app = with_application_routes(scholarship_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "scholarship review service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
