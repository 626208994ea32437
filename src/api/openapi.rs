//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    AccountActivityResponse, ActorRequest, AlertListResponse, MetricHistoryResponse,
    PaginationMeta, ParachainDetailResponse, RunJobResponse,
};
use super::handlers::{alerts, parachains, scheduler, system};
use crate::aggregator::{AccountEvent, ConnectionState};
use crate::domain::{
    ActivitySnapshot, Alert, AlertSource, AlertStats, AlertStatus, AlertType, DeliveryStatus,
    MetricKind, MetricSnapshot, NotificationAttempt, NotificationMethod, NotificationPrefs,
    Parachain, ParachainId, ParachainStatus, Severity, TvlSnapshot,
};
use crate::engine::PassReport;
use crate::error::{ErrorBody, ErrorResponse};
use crate::scheduler::{
    JobName, JobOutcome, JobPhase, JobState, RunTrigger, SchedulerStatus, TickReport,
};

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "parachain-sentinel",
        description = "Parachain metrics collection and threshold alerting."
    ),
    paths(
        system::health_handler,
        system::info_handler,
        alerts::list_alerts,
        alerts::alert_stats,
        alerts::get_alert,
        alerts::acknowledge_alert,
        alerts::resolve_alert,
        parachains::list_parachains,
        parachains::get_parachain,
        parachains::metric_history,
        parachains::account_activity,
        scheduler::scheduler_status,
        scheduler::run_job,
    ),
    components(schemas(
        system::HealthResponse,
        system::ServiceInfo,
        ActorRequest,
        AlertListResponse,
        PaginationMeta,
        ParachainDetailResponse,
        MetricHistoryResponse,
        AccountActivityResponse,
        AccountEvent,
        RunJobResponse,
        Alert,
        AlertType,
        AlertStatus,
        AlertSource,
        AlertStats,
        Severity,
        NotificationAttempt,
        NotificationMethod,
        NotificationPrefs,
        DeliveryStatus,
        Parachain,
        ParachainId,
        ParachainStatus,
        MetricKind,
        MetricSnapshot,
        TvlSnapshot,
        ActivitySnapshot,
        ConnectionState,
        SchedulerStatus,
        JobName,
        JobPhase,
        JobState,
        JobOutcome,
        TickReport,
        PassReport,
        RunTrigger,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Health and service info"),
        (name = "Alerts", description = "Alert queries and operator actions"),
        (name = "Parachains", description = "Registry and metric history"),
        (name = "Scheduler", description = "Job status and manual runs"),
    )
)]
pub struct ApiDoc;
