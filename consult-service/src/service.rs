use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
};
use consult_core::{
    AiProvider, ConsultError, ConsultationRequest, ConsultationService, ConsultationStore,
    ConsultationTurn, HealthReport, InMemoryConsultationStore, PostgresConsultationStore,
    ProviderRegistry, RateLimiter, SessionHistory, gemini_doctor, grok_doctor,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{config::ServiceConfig, telemetry::correlation_id_middleware};

pub const GENERIC_FAILURE: &str = "Sorry, the consultation could not be completed right now. Please try again, or visit the nearest healthcare facility if your symptoms are severe.";

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, error: &str, detail: &str) -> ApiError {
    (
        status,
        Json(json!({
            "error": error,
            "detail": detail
        })),
    )
}

fn consult_error(err: ConsultError) -> ApiError {
    match err {
        ConsultError::Validation(detail) => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "Invalid request", &detail)
        }
        ConsultError::RateLimited(_) => api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
            "Too many requests. Please wait a minute before trying again.",
        ),
        ConsultError::ProviderRateLimited(_) => api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded",
            "Rate limit exceeded. Please try again in a few minutes.",
        ),
        ConsultError::ProviderNotConfigured(_) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Medical AI service not configured",
            GENERIC_FAILURE,
        ),
        ConsultError::Provider(_) | ConsultError::Timeout(_) | ConsultError::Storage(_) => {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Medical consultation failed",
                GENERIC_FAILURE,
            )
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub consultations: ConsultationService,
}

pub async fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config)?;
    Ok(build_router(app_state))
}

fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let store = create_store(config)?;
    let providers = create_providers(config);
    let limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window);

    Ok(AppState {
        consultations: ConsultationService::new(
            store,
            providers,
            limiter,
            config.consult_settings(),
        ),
    })
}

fn create_store(config: &ServiceConfig) -> anyhow::Result<Arc<dyn ConsultationStore>> {
    match &config.database_url {
        Some(database_url) => {
            info!("Using PostgreSQL consultation storage");
            let store = PostgresConsultationStore::connect_lazy(
                database_url,
                config.database_name.as_deref(),
            )?;
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory consultation storage (set DATABASE_URL to use PostgreSQL)");
            Ok(Arc::new(InMemoryConsultationStore::new()))
        }
    }
}

fn create_providers(config: &ServiceConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new(config.default_provider);

    match &config.gemini_api_key {
        Some(key) => {
            let doctor = gemini_doctor(key, &config.gemini_model);
            registry = registry.with_model(AiProvider::Gemini, doctor);
        }
        None => warn!("GEMINI_API_KEY not set"),
    }
    match &config.grok_api_key {
        Some(key) => {
            let doctor = grok_doctor(key, &config.grok_model);
            registry = registry.with_model(AiProvider::Grok, doctor);
        }
        None => warn!("GROK_API_KEY not set"),
    }

    if !registry.is_configured(config.default_provider) {
        warn!(
            "Default AI provider {} has no API key; consultations will fail",
            config.default_provider
        );
    }
    registry
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api", get(root))
        .route("/api/", get(root))
        .route("/api/health", get(health_check))
        .route("/api/consult", post(consult))
        .route("/api/consultations/{session_id}", get(get_consultation_history))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Ghana AI Doctor Agent - Ready to help with medical consultations",
        "version": env!("CARGO_PKG_VERSION"),
        "doctor": "Dr. Kwame Asante - Korle Bu Teaching Hospital",
        "disclaimer": "This service provides general health information only, not medical advice.",
        "emergency": "For emergencies, call 193 (Ghana)",
        "endpoints": {
            "POST /api/consult": "Send a message to the doctor",
            "GET /api/consultations/{session_id}": "Consultation history of a session",
            "GET /api/health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.consultations.health().await)
}

async fn consult(
    State(state): State<AppState>,
    payload: Result<Json<ConsultationRequest>, JsonRejection>,
) -> ApiResult<ConsultationTurn> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "Rejected consultation body"
        );
        api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid request",
            &rejection.body_text(),
        )
    })?;

    info!(
        session_id = %request.session_id,
        message_length = request.message.len(),
        has_patient_info = request.patient_info.is_some(),
        "Processing consultation request"
    );

    let session_id = request.session_id.clone();
    match state.consultations.consult(request).await {
        Ok(turn) => Ok(Json(turn)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Medical consultation failed");
            Err(consult_error(e))
        }
    }
}

async fn get_consultation_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionHistory> {
    info!(session_id = %session_id, "Getting consultation history");

    state
        .consultations
        .history(&session_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!(session_id = %session_id, error = %e, "Failed to fetch consultation history");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch consultation history",
                "Please try again later.",
            )
        })
}
