//! Alert handlers: list, stats, get, acknowledge, resolve.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{ActorRequest, AlertListQuery, AlertListResponse, PaginationMeta};
use crate::app_state::AppState;
use crate::domain::{Alert, AlertStats};
use crate::error::{ErrorResponse, MonitorError};

/// `GET /alerts` — List alerts with optional filters.
///
/// # Errors
///
/// Returns [`MonitorError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    tag = "Alerts",
    summary = "List alerts",
    description = "Returns a page of alerts, newest first, filtered by status, severity, type and parachain.",
    params(AlertListQuery),
    responses(
        (status = 200, description = "Paginated alert list", body = AlertListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertListQuery>,
) -> Result<impl IntoResponse, MonitorError> {
    let filter = query.into_filter();
    let (limit, offset) = (filter.limit, filter.offset);
    let (data, total) = state.alert_service.list(filter).await?;

    Ok(Json(AlertListResponse {
        data,
        pagination: PaginationMeta {
            limit,
            offset,
            total,
        },
    }))
}

/// `GET /alerts/stats` — Counts by status, severity and type.
///
/// # Errors
///
/// Returns [`MonitorError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/alerts/stats",
    tag = "Alerts",
    summary = "Alert statistics",
    responses(
        (status = 200, description = "Alert counts", body = AlertStats),
    )
)]
pub async fn alert_stats(State(state): State<AppState>) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.alert_service.stats().await?))
}

/// `GET /alerts/:id` — Get one alert.
///
/// # Errors
///
/// Returns [`MonitorError::AlertNotFound`] if the alert does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/alerts/{id}",
    tag = "Alerts",
    summary = "Get alert",
    params(
        ("id" = Uuid, Path, description = "Alert UUID"),
    ),
    responses(
        (status = 200, description = "Alert details", body = Alert),
        (status = 404, description = "Alert not found", body = ErrorResponse),
    )
)]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.alert_service.get(id).await?))
}

/// `PUT /alerts/:id/acknowledge` — Acknowledge an alert.
///
/// # Errors
///
/// Returns [`MonitorError::AlertNotFound`] for an unknown ID or
/// [`MonitorError::InvalidRequest`] if the alert is resolved.
#[utoipa::path(
    put,
    path = "/api/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    summary = "Acknowledge alert",
    params(
        ("id" = Uuid, Path, description = "Alert UUID"),
    ),
    request_body(content = ActorRequest, description = "Optional operator name"),
    responses(
        (status = 200, description = "Alert acknowledged", body = Alert),
        (status = 400, description = "Alert already resolved", body = ErrorResponse),
        (status = 404, description = "Alert not found", body = ErrorResponse),
    )
)]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ActorRequest>>,
) -> Result<impl IntoResponse, MonitorError> {
    let by = body.and_then(|Json(req)| req.by);
    Ok(Json(state.alert_service.acknowledge(id, by).await?))
}

/// `PUT /alerts/:id/resolve` — Resolve an alert, ending its cooldown.
///
/// # Errors
///
/// Returns [`MonitorError::AlertNotFound`] for an unknown ID or
/// [`MonitorError::InvalidRequest`] if the alert is already resolved.
#[utoipa::path(
    put,
    path = "/api/v1/alerts/{id}/resolve",
    tag = "Alerts",
    summary = "Resolve alert",
    params(
        ("id" = Uuid, Path, description = "Alert UUID"),
    ),
    request_body(content = ActorRequest, description = "Optional operator name"),
    responses(
        (status = 200, description = "Alert resolved", body = Alert),
        (status = 400, description = "Alert already resolved", body = ErrorResponse),
        (status = 404, description = "Alert not found", body = ErrorResponse),
    )
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ActorRequest>>,
) -> Result<impl IntoResponse, MonitorError> {
    let by = body.and_then(|Json(req)| req.by);
    Ok(Json(state.alert_service.resolve(id, by).await?))
}

/// Alert routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/stats", get(alert_stats))
        .route("/alerts/{id}", get(get_alert))
        .route("/alerts/{id}/acknowledge", put(acknowledge_alert))
        .route("/alerts/{id}/resolve", put(resolve_alert))
}
