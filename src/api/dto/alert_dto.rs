//! Alert DTOs for list, filter and stats operations.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::PaginationMeta;
use crate::domain::{Alert, AlertFilter, AlertStatus, AlertType, ParachainId, Severity};
use crate::service::alert_service::MAX_PAGE_SIZE;

/// Query parameters for `GET /alerts`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertListQuery {
    /// Derived status: `active`, `acknowledged` or `resolved`.
    pub status: Option<AlertStatus>,
    /// Severity.
    pub severity: Option<Severity>,
    /// Alert type, e.g. `tvl_drop`.
    #[serde(rename = "type")]
    pub alert_type: Option<AlertType>,
    /// Parachain id.
    pub parachain_id: Option<u32>,
    /// Items per page (1..=100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
}

const fn default_limit() -> usize {
    20
}

impl AlertListQuery {
    /// Converts the query into a store filter with the page size clamped.
    #[must_use]
    pub fn into_filter(self) -> AlertFilter {
        AlertFilter {
            status: self.status,
            severity: self.severity,
            alert_type: self.alert_type,
            parachain_id: self.parachain_id.map(ParachainId::new),
            limit: self.limit.clamp(1, MAX_PAGE_SIZE),
            offset: self.offset,
        }
    }
}

/// Paginated list response for `GET /alerts`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertListResponse {
    /// Alerts, newest first.
    pub data: Vec<Alert>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn query_string_maps_to_filter() {
        let Ok(query) = serde_json::from_value::<AlertListQuery>(serde_json::json!({
            "status": "active",
            "type": "tvl_drop",
            "parachain_id": 2004,
            "limit": 1000,
        })) else {
            panic!("query should parse");
        };
        let filter = query.into_filter();
        assert_eq!(filter.status, Some(AlertStatus::Active));
        assert_eq!(filter.alert_type, Some(AlertType::TvlDrop));
        assert_eq!(filter.parachain_id, Some(ParachainId::new(2004)));
        assert_eq!(filter.limit, MAX_PAGE_SIZE);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn defaults_apply() {
        let Ok(query) = serde_json::from_value::<AlertListQuery>(serde_json::json!({})) else {
            panic!("empty query should parse");
        };
        let filter = query.into_filter();
        assert_eq!(filter.limit, 20);
        assert!(filter.severity.is_none());
    }
}
