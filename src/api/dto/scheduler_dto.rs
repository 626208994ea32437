//! Scheduler DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::scheduler::{JobName, RunTrigger};

/// Response body for `POST /scheduler/jobs/{name}/run`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RunJobResponse {
    /// Job that was triggered.
    pub job: JobName,
    /// Whether a tick body was started.
    pub trigger: RunTrigger,
}
