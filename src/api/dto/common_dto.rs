//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Page size applied.
    pub limit: usize,
    /// Items skipped.
    pub offset: usize,
    /// Total number of matching items.
    pub total: u64,
}

/// Optional body for operator actions.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ActorRequest {
    /// Who performed the action.
    #[serde(default)]
    pub by: Option<String>,
}
