//! Scheduler handlers: status and manual job runs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::RunJobResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, MonitorError};
use crate::scheduler::{JobName, RunTrigger, SchedulerStatus};

/// `GET /scheduler/status` — Scheduler and per-job state.
#[utoipa::path(
    get,
    path = "/api/v1/scheduler/status",
    tag = "Scheduler",
    summary = "Scheduler status",
    description = "Returns whether the job loops run, the aggregator connection state and the last outcome of every job.",
    responses(
        (status = 200, description = "Scheduler status", body = SchedulerStatus),
    )
)]
pub async fn scheduler_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.status().await)
}

/// `POST /scheduler/jobs/:name/run` — Run one tick of a job now.
///
/// Responds `202 Accepted` when a tick body was started and `409
/// Conflict` when the previous tick is still running.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidRequest`] for an unknown job name.
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/jobs/{name}/run",
    tag = "Scheduler",
    summary = "Run job now",
    params(
        ("name" = String, Path, description = "`parachain-collection`, `tvl-calculation`, `activity-monitoring` or `alert-checking`"),
    ),
    responses(
        (status = 202, description = "Tick started", body = RunJobResponse),
        (status = 409, description = "Previous tick still running", body = RunJobResponse),
        (status = 400, description = "Unknown job", body = ErrorResponse),
    )
)]
pub async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, MonitorError> {
    let job: JobName = name.parse().map_err(MonitorError::InvalidRequest)?;
    let trigger = state.scheduler.run_job_now(job).await;
    let status = match trigger {
        RunTrigger::Started => StatusCode::ACCEPTED,
        RunTrigger::Skipped => StatusCode::CONFLICT,
    };
    tracing::info!(job = %job, ?trigger, "manual job run requested");
    Ok((status, Json(RunJobResponse { job, trigger })))
}

/// Scheduler routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/scheduler/status", get(scheduler_status))
        .route("/scheduler/jobs/{name}/run", post(run_job))
}
