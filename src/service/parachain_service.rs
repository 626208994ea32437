//! Parachain service: registry lookups and stored metric history.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde::Serialize;

use crate::aggregator::{AccountEvent, DataAggregator};
use crate::domain::{BlockRange, MetricKind, MetricSnapshot, Parachain, ParachainId};
use crate::error::MonitorError;
use crate::store::{MetricRepository, ParachainRepository};

/// Longest history window served, in hours (30 days).
pub const MAX_HISTORY_HOURS: u32 = 720;

/// Most blocks an account activity lookup scans.
pub const MAX_ACCOUNT_SCAN_BLOCKS: u64 = 100;

/// A parachain with its most recent snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct ParachainOverview {
    /// Registry record.
    pub parachain: Parachain,
    /// Latest TVL snapshot, if any.
    pub latest_tvl: Option<MetricSnapshot>,
    /// Latest activity snapshot, if any.
    pub latest_activity: Option<MetricSnapshot>,
}

/// Events mentioning one account in the blocks leading up to the head.
#[derive(Debug, Clone, Serialize)]
pub struct AccountActivity {
    /// Parachain the lookup was made for.
    pub parachain_id: ParachainId,
    /// Account address searched for.
    pub address: String,
    /// Blocks scanned, inclusive.
    pub range: BlockRange,
    /// Matching events in block order.
    pub events: Vec<AccountEvent>,
}

/// Read-only access to parachains, their metrics and live account activity.
#[derive(Debug, Clone)]
pub struct ParachainService {
    parachains: Arc<dyn ParachainRepository>,
    metrics: Arc<dyn MetricRepository>,
    aggregator: Arc<DataAggregator>,
}

impl ParachainService {
    /// Creates a new `ParachainService`.
    #[must_use]
    pub fn new(
        parachains: Arc<dyn ParachainRepository>,
        metrics: Arc<dyn MetricRepository>,
        aggregator: Arc<DataAggregator>,
    ) -> Self {
        Self {
            parachains,
            metrics,
            aggregator,
        }
    }

    /// All registered parachains in id order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn list(&self) -> Result<Vec<Parachain>, MonitorError> {
        self.parachains.list_all().await
    }

    /// Loads one parachain.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ParachainNotFound`] if it is not registered.
    pub async fn get(&self, id: ParachainId) -> Result<Parachain, MonitorError> {
        self.parachains
            .get(id)
            .await?
            .ok_or(MonitorError::ParachainNotFound(id))
    }

    /// The parachain with its latest TVL and activity snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ParachainNotFound`] if it is not registered.
    pub async fn overview(&self, id: ParachainId) -> Result<ParachainOverview, MonitorError> {
        let parachain = self.get(id).await?;
        let (latest_tvl, latest_activity) = tokio::try_join!(
            self.metrics.find_latest(id, MetricKind::Tvl),
            self.metrics.find_latest(id, MetricKind::Activity),
        )?;
        Ok(ParachainOverview {
            parachain,
            latest_tvl,
            latest_activity,
        })
    }

    /// Snapshots of `kind` from the last `hours` hours (clamped to
    /// `1..=720`), oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ParachainNotFound`] if it is not registered.
    pub async fn history(
        &self,
        id: ParachainId,
        kind: MetricKind,
        hours: u32,
    ) -> Result<Vec<MetricSnapshot>, MonitorError> {
        self.get(id).await?;
        let end = Utc::now();
        let start = end - TimeDelta::hours(i64::from(hours.clamp(1, MAX_HISTORY_HOURS)));
        self.metrics.find_in_range(id, kind, start, end).await
    }

    /// Scans the last `blocks` blocks (clamped to `1..=100`) for events
    /// mentioning `address`. Uses the scheduler's chain session and never
    /// reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ParachainNotFound`] if it is not registered,
    /// [`MonitorError::NotConnected`] without a chain session, or
    /// [`MonitorError::Upstream`] if a block cannot be read.
    pub async fn account_activity(
        &self,
        id: ParachainId,
        address: &str,
        blocks: u64,
    ) -> Result<AccountActivity, MonitorError> {
        self.get(id).await?;
        let head = self.aggregator.current_block_number().await?;
        let range = BlockRange::trailing(head, blocks.clamp(1, MAX_ACCOUNT_SCAN_BLOCKS));
        let events = self
            .aggregator
            .get_account_activity(id, address, range)
            .await?;
        tracing::debug!(parachain_id = %id, address, matches = events.len(), "account activity scanned");
        Ok(AccountActivity {
            parachain_id: id,
            address: address.to_string(),
            range,
            events,
        })
    }
}
