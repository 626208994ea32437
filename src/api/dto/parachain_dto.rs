//! Parachain DTOs for registry and metric history endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::aggregator::AccountEvent;
use crate::domain::{
    ActivitySnapshot, MetricKind, MetricSnapshot, Parachain, ParachainId, TvlSnapshot,
};
use crate::service::{AccountActivity, ParachainOverview};

/// Query parameters for the metric history endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Trailing window in hours (1..=720). Defaults to 24.
    #[serde(default = "default_hours")]
    pub hours: u32,
}

const fn default_hours() -> u32 {
    24
}

/// Query parameters for the account activity endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountActivityQuery {
    /// Trailing blocks to scan (1..=100). Defaults to 20.
    #[serde(default = "default_blocks")]
    pub blocks: u64,
}

const fn default_blocks() -> u64 {
    20
}

/// Response body for `GET /parachains/{id}/accounts/{address}/activity`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountActivityResponse {
    /// Parachain the lookup was made for.
    pub parachain_id: ParachainId,
    /// Account searched for.
    pub address: String,
    /// First block scanned.
    pub from_block: u64,
    /// Last block scanned.
    pub to_block: u64,
    /// Number of matching events.
    pub count: usize,
    /// Matching events in block order.
    pub events: Vec<AccountEvent>,
}

impl From<AccountActivity> for AccountActivityResponse {
    fn from(activity: AccountActivity) -> Self {
        Self {
            parachain_id: activity.parachain_id,
            address: activity.address,
            from_block: activity.range.start,
            to_block: activity.range.end,
            count: activity.events.len(),
            events: activity.events,
        }
    }
}

/// Response body for `GET /parachains/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParachainDetailResponse {
    /// Registry record.
    pub parachain: Parachain,
    /// Latest TVL snapshot.
    pub latest_tvl: Option<TvlSnapshot>,
    /// Latest activity snapshot.
    pub latest_activity: Option<ActivitySnapshot>,
}

impl From<ParachainOverview> for ParachainDetailResponse {
    fn from(overview: ParachainOverview) -> Self {
        let latest_tvl = match overview.latest_tvl {
            Some(MetricSnapshot::Tvl(s)) => Some(s),
            _ => None,
        };
        let latest_activity = match overview.latest_activity {
            Some(MetricSnapshot::Activity(s)) => Some(s),
            _ => None,
        };
        Self {
            parachain: overview.parachain,
            latest_tvl,
            latest_activity,
        }
    }
}

/// Response body for `GET /parachains/{id}/metrics/{kind}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricHistoryResponse {
    /// Parachain the rows belong to.
    pub parachain_id: ParachainId,
    /// Time series.
    pub kind: MetricKind,
    /// Window applied, in hours.
    pub hours: u32,
    /// Number of rows.
    pub count: usize,
    /// Snapshots, oldest first.
    pub data: Vec<MetricSnapshot>,
}
