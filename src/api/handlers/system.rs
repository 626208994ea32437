//! System endpoints: health check and service info.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::aggregator::ConnectionState;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    scheduler_running: bool,
    connection: ConnectionState,
}

/// Service description returned at the root path.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceInfo {
    name: String,
    version: String,
    description: String,
    endpoints: Vec<String>,
}

/// `GET /health` — Service health status.
///
/// The service reports `degraded` while the scheduler is stopped or the
/// chain session is down.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, scheduler state and chain connection state.",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connection = state.scheduler.connection_state();
    let scheduler_running = state.scheduler.is_running();
    let healthy = scheduler_running && connection == ConnectionState::Connected;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            scheduler_running,
            connection,
        }),
    )
}

/// `GET /` — Service name, version and entry points.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    summary = "Service info",
    responses(
        (status = 200, description = "Service description", body = ServiceInfo),
    )
)]
pub async fn info_handler() -> impl IntoResponse {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        endpoints: [
            "/health",
            "/api/v1/alerts",
            "/api/v1/parachains",
            "/api/v1/scheduler/status",
            "/ws",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(info_handler))
        .route("/health", get(health_handler))
}
