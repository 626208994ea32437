//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::scheduler::Scheduler;
use crate::service::{AlertService, ParachainService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Alert queries and operator actions.
    pub alert_service: Arc<AlertService>,
    /// Parachain registry and metric history.
    pub parachain_service: Arc<ParachainService>,
    /// Job scheduler for status and manual runs.
    pub scheduler: Scheduler,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}
