//! REST endpoint handlers organized by resource.

pub mod alerts;
pub mod parachains;
pub mod scheduler;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(alerts::routes())
        .merge(parachains::routes())
        .merge(scheduler::routes())
}
