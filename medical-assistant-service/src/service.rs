use axum::{
    Form, Router,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, info};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    consultation::Consultant,
    error::AppResult,
    models::{ConsultationOutcome, ConsultationRequest, FailureKind},
    page::IndexTemplate,
};

#[derive(Clone)]
pub struct AppState {
    pub consultant: Arc<Consultant>,
}

impl AppState {
    pub fn new(consultant: Consultant) -> Self {
        Self {
            consultant: Arc::new(consultant),
        }
    }
}

pub fn create_app(config: &ServiceConfig) -> Router {
    build_router(AppState::new(Consultant::from_config(config)))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/consult", post(consult_form))
        .route("/api", get(describe))
        .route("/api/consultations", post(consult_json))
        .route("/health", get(health_check))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn index() -> IndexTemplate {
    IndexTemplate::blank()
}

async fn describe() -> Json<Value> {
    Json(json!({
        "service": "AI Medical Assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Two-stage diagnosis and treatment pipeline with a downloadable report",
        "endpoints": {
            "GET /": "Patient form",
            "POST /consult": "Submit the form and render the result",
            "POST /api/consultations": "Run a consultation and return the outcome as JSON",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn consult_form(
    State(state): State<AppState>,
    Form(request): Form<ConsultationRequest>,
) -> IndexTemplate {
    let page = IndexTemplate::from_request(&request);

    let (credential, profile) = match request.into_parts() {
        Ok(parts) => parts,
        Err(e) => {
            info!("Consultation rejected: {}", e);
            return page.with_error(e.to_string());
        }
    };

    info!(provider = ?credential.provider(), "Starting consultation from form");
    let outcome = state.consultant.consult(credential, profile).await;
    page.with_outcome(outcome)
}

async fn consult_json(
    State(state): State<AppState>,
    Json(request): Json<ConsultationRequest>,
) -> AppResult<(StatusCode, Json<ConsultationOutcome>)> {
    let (credential, profile) = request.into_parts()?;

    info!(provider = ?credential.provider(), "Starting consultation from API");
    let outcome = state.consultant.consult(credential, profile).await;

    let status = match &outcome {
        ConsultationOutcome::Completed { .. } => StatusCode::OK,
        ConsultationOutcome::Failed { kind, .. } => match kind {
            FailureKind::Authentication => StatusCode::UNAUTHORIZED,
            FailureKind::Upstream => StatusCode::BAD_GATEWAY,
            FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    };
    Ok((status, Json(outcome)))
}
