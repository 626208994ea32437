//! Parachain handlers: registry listing, detail and metric history.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    AccountActivityQuery, AccountActivityResponse, HistoryQuery, MetricHistoryResponse,
    ParachainDetailResponse,
};
use crate::app_state::AppState;
use crate::domain::{MetricKind, Parachain, ParachainId};
use crate::error::{ErrorResponse, MonitorError};
use crate::service::parachain_service::MAX_HISTORY_HOURS;

/// `GET /parachains` — List registered parachains.
///
/// # Errors
///
/// Returns [`MonitorError`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/parachains",
    tag = "Parachains",
    summary = "List parachains",
    responses(
        (status = 200, description = "Registered parachains", body = Vec<Parachain>),
    )
)]
pub async fn list_parachains(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, MonitorError> {
    Ok(Json(state.parachain_service.list().await?))
}

/// `GET /parachains/:id` — Parachain with its latest snapshots.
///
/// # Errors
///
/// Returns [`MonitorError::ParachainNotFound`] if it is not registered.
#[utoipa::path(
    get,
    path = "/api/v1/parachains/{id}",
    tag = "Parachains",
    summary = "Get parachain",
    description = "Returns the registry record with the latest TVL and activity snapshots.",
    params(
        ("id" = u32, Path, description = "Para id"),
    ),
    responses(
        (status = 200, description = "Parachain overview", body = ParachainDetailResponse),
        (status = 404, description = "Parachain not found", body = ErrorResponse),
    )
)]
pub async fn get_parachain(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, MonitorError> {
    let overview = state.parachain_service.overview(ParachainId::new(id)).await?;
    Ok(Json(ParachainDetailResponse::from(overview)))
}

/// `GET /parachains/:id/metrics/:kind` — Snapshot history.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for an unknown metric kind or
/// [`MonitorError::ParachainNotFound`] if the parachain is not registered.
#[utoipa::path(
    get,
    path = "/api/v1/parachains/{id}/metrics/{kind}",
    tag = "Parachains",
    summary = "Metric history",
    description = "Returns hourly snapshots of `tvl` or `activity` from the trailing window, oldest first.",
    params(
        ("id" = u32, Path, description = "Para id"),
        ("kind" = String, Path, description = "`tvl` or `activity`"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "Snapshot history", body = MetricHistoryResponse),
        (status = 400, description = "Unknown metric kind", body = ErrorResponse),
        (status = 404, description = "Parachain not found", body = ErrorResponse),
    )
)]
pub async fn metric_history(
    State(state): State<AppState>,
    Path((id, kind)): Path<(u32, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, MonitorError> {
    let kind: MetricKind = kind.parse().map_err(MonitorError::InvalidRequest)?;
    let parachain_id = ParachainId::new(id);
    let hours = query.hours.clamp(1, MAX_HISTORY_HOURS);
    let data = state
        .parachain_service
        .history(parachain_id, kind, hours)
        .await?;

    Ok(Json(MetricHistoryResponse {
        parachain_id,
        kind,
        hours,
        count: data.len(),
        data,
    }))
}

/// `GET /parachains/:id/accounts/:address/activity` — Recent events that
/// mention an account, read live from the chain.
///
/// # Errors
///
/// Returns [`MonitorError::ParachainNotFound`] if the parachain is not
/// registered, [`MonitorError::NotConnected`] while the chain session is
/// down, or [`MonitorError::Upstream`] if a block cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/parachains/{id}/accounts/{address}/activity",
    tag = "Parachains",
    summary = "Account activity",
    description = "Scans the trailing blocks for balances, staking, democracy and council events mentioning the address.",
    params(
        ("id" = u32, Path, description = "Para id"),
        ("address" = String, Path, description = "SS58 account address"),
        AccountActivityQuery,
    ),
    responses(
        (status = 200, description = "Matching events", body = AccountActivityResponse),
        (status = 404, description = "Parachain not found", body = ErrorResponse),
        (status = 502, description = "Block read failed", body = ErrorResponse),
        (status = 503, description = "Chain session down", body = ErrorResponse),
    )
)]
pub async fn account_activity(
    State(state): State<AppState>,
    Path((id, address)): Path<(u32, String)>,
    Query(query): Query<AccountActivityQuery>,
) -> Result<impl IntoResponse, MonitorError> {
    if address.trim().is_empty() {
        return Err(MonitorError::InvalidRequest("address must not be empty".to_string()));
    }
    let activity = state
        .parachain_service
        .account_activity(ParachainId::new(id), address.trim(), query.blocks)
        .await?;
    Ok(Json(AccountActivityResponse::from(activity)))
}

/// Parachain routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/parachains", get(list_parachains))
        .route("/parachains/{id}", get(get_parachain))
        .route("/parachains/{id}/metrics/{kind}", get(metric_history))
        .route(
            "/parachains/{id}/accounts/{address}/activity",
            get(account_activity),
        )
}
