//! Storage layer: repository traits and their backends.
//!
//! The collection pipeline and the alert engine only talk to the
//! [`MetricRepository`], [`AlertRepository`] and [`ParachainRepository`]
//! traits. [`postgres::PostgresStore`] implements them on top of
//! `sqlx::PgPool`; [`memory::InMemoryStore`] keeps everything in process
//! and backs tests and database-less deployments.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ActivityUpdate, Alert, AlertFilter, AlertStats, AlertType, MetricKind, MetricSnapshot,
    Parachain, ParachainId, SnapshotKey, TvlSnapshot,
};
use crate::error::MonitorError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Time-series storage for hourly metric snapshots.
#[async_trait]
pub trait MetricRepository: Send + Sync + fmt::Debug {
    /// Inserts or replaces the TVL row for the snapshot's hour bucket.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn upsert_tvl(&self, snapshot: TvlSnapshot) -> Result<(), MonitorError>;

    /// Merges `update` into the activity row for `key`, creating the row on
    /// the first write of the hour.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn upsert_activity(
        &self,
        key: SnapshotKey,
        parachain_name: &str,
        update: ActivityUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), MonitorError>;

    /// Most recent snapshot of `kind` for a parachain.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn find_latest(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
    ) -> Result<Option<MetricSnapshot>, MonitorError>;

    /// Most recent snapshot whose timestamp is at or before `before`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn find_latest_before(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        before: DateTime<Utc>,
    ) -> Result<Option<MetricSnapshot>, MonitorError>;

    /// Snapshots with `start <= timestamp <= end`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn find_in_range(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSnapshot>, MonitorError>;

    /// Returns `true` if any parachain has a snapshot of `kind` written at
    /// or after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn has_any_since(
        &self,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<bool, MonitorError>;
}

/// Alert records. Alerts are never deleted.
#[async_trait]
pub trait AlertRepository: Send + Sync + fmt::Debug {
    /// An active alert of `alert_type` and scope whose cooldown has not
    /// expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn find_active_in_cooldown(
        &self,
        alert_type: AlertType,
        parachain_id: Option<ParachainId>,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, MonitorError>;

    /// Stores a new alert.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn create(&self, alert: Alert) -> Result<Alert, MonitorError>;

    /// Replaces the stored alert with the same ID.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlertNotFound`] if no such alert exists, or
    /// [`MonitorError::Persistence`] on storage failure.
    async fn update(&self, alert: &Alert) -> Result<(), MonitorError>;

    /// Loads one alert.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn get(&self, id: Uuid) -> Result<Option<Alert>, MonitorError>;

    /// One page of alerts matching `filter`, newest first, plus the total
    /// number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn list(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, u64), MonitorError>;

    /// Counts over all alerts.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn stats(&self) -> Result<AlertStats, MonitorError>;
}

/// Registry of monitored parachains.
#[async_trait]
pub trait ParachainRepository: Send + Sync + fmt::Debug {
    /// Active parachains in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn list_active(&self) -> Result<Vec<Parachain>, MonitorError>;

    /// All registered parachains in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn list_all(&self) -> Result<Vec<Parachain>, MonitorError>;

    /// Loads one parachain.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn get(&self, id: ParachainId) -> Result<Option<Parachain>, MonitorError>;

    /// Inserts the parachain or updates its name, symbol and status.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    async fn register(&self, parachain: &Parachain) -> Result<(), MonitorError>;
}
