//! In-process implementation of the repository traits.
//!
//! Every table is a map behind a [`tokio::sync::RwLock`]. Snapshot maps
//! are keyed by `(parachain, hour bucket)` so an upsert inside the same
//! hour replaces the existing row.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AlertRepository, MetricRepository, ParachainRepository};
use crate::domain::{
    ActivitySnapshot, ActivityUpdate, Alert, AlertFilter, AlertStats, AlertType, MetricKind,
    MetricSnapshot, Parachain, ParachainId, SnapshotKey, TvlSnapshot,
};
use crate::error::MonitorError;

type BucketKey = (ParachainId, DateTime<Utc>);

/// Memory-backed store for parachains, snapshots and alerts.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    parachains: RwLock<BTreeMap<ParachainId, Parachain>>,
    tvl: RwLock<BTreeMap<BucketKey, TvlSnapshot>>,
    activity: RwLock<BTreeMap<BucketKey, ActivitySnapshot>>,
    alerts: RwLock<Vec<Alert>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with `parachains` already registered.
    #[must_use]
    pub fn with_parachains(parachains: impl IntoIterator<Item = Parachain>) -> Self {
        let map = parachains.into_iter().map(|p| (p.id, p)).collect();
        Self {
            parachains: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Number of stored snapshots of `kind` across all parachains.
    pub async fn snapshot_count(&self, kind: MetricKind) -> usize {
        match kind {
            MetricKind::Tvl => self.tvl.read().await.len(),
            MetricKind::Activity => self.activity.read().await.len(),
        }
    }

    async fn snapshots(&self, parachain_id: ParachainId, kind: MetricKind) -> Vec<MetricSnapshot> {
        let range = (parachain_id, DateTime::<Utc>::MIN_UTC)..=(parachain_id, DateTime::<Utc>::MAX_UTC);
        match kind {
            MetricKind::Tvl => self
                .tvl
                .read()
                .await
                .range(range)
                .map(|(_, s)| MetricSnapshot::Tvl(s.clone()))
                .collect(),
            MetricKind::Activity => self
                .activity
                .read()
                .await
                .range(range)
                .map(|(_, s)| MetricSnapshot::Activity(s.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl MetricRepository for InMemoryStore {
    async fn upsert_tvl(&self, snapshot: TvlSnapshot) -> Result<(), MonitorError> {
        let key = (snapshot.parachain_id, snapshot.bucket);
        self.tvl.write().await.insert(key, snapshot);
        Ok(())
    }

    async fn upsert_activity(
        &self,
        key: SnapshotKey,
        parachain_name: &str,
        update: ActivityUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let mut map = self.activity.write().await;
        let row = map
            .entry((key.parachain_id, key.bucket))
            .or_insert_with(|| ActivitySnapshot::empty(&key, parachain_name, at));
        row.parachain_name = parachain_name.to_string();
        row.apply(&update, at);
        Ok(())
    }

    async fn find_latest(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
    ) -> Result<Option<MetricSnapshot>, MonitorError> {
        Ok(self
            .snapshots(parachain_id, kind)
            .await
            .into_iter()
            .max_by_key(MetricSnapshot::timestamp))
    }

    async fn find_latest_before(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        before: DateTime<Utc>,
    ) -> Result<Option<MetricSnapshot>, MonitorError> {
        Ok(self
            .snapshots(parachain_id, kind)
            .await
            .into_iter()
            .filter(|s| s.timestamp() <= before)
            .max_by_key(MetricSnapshot::timestamp))
    }

    async fn find_in_range(
        &self,
        parachain_id: ParachainId,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSnapshot>, MonitorError> {
        let mut rows: Vec<MetricSnapshot> = self
            .snapshots(parachain_id, kind)
            .await
            .into_iter()
            .filter(|s| (start..=end).contains(&s.timestamp()))
            .collect();
        rows.sort_by_key(MetricSnapshot::timestamp);
        Ok(rows)
    }

    async fn has_any_since(
        &self,
        kind: MetricKind,
        since: DateTime<Utc>,
    ) -> Result<bool, MonitorError> {
        let found = match kind {
            MetricKind::Tvl => self.tvl.read().await.values().any(|s| s.timestamp >= since),
            MetricKind::Activity => self
                .activity
                .read()
                .await
                .values()
                .any(|s| s.timestamp >= since),
        };
        Ok(found)
    }
}

#[async_trait]
impl AlertRepository for InMemoryStore {
    async fn find_active_in_cooldown(
        &self,
        alert_type: AlertType,
        parachain_id: Option<ParachainId>,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, MonitorError> {
        Ok(self
            .alerts
            .read()
            .await
            .iter()
            .rev()
            .find(|a| a.suppresses(alert_type, parachain_id, now))
            .cloned())
    }

    async fn create(&self, alert: Alert) -> Result<Alert, MonitorError> {
        self.alerts.write().await.push(alert.clone());
        Ok(alert)
    }

    async fn update(&self, alert: &Alert) -> Result<(), MonitorError> {
        let mut alerts = self.alerts.write().await;
        let stored = alerts
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or(MonitorError::AlertNotFound(alert.id))?;
        *stored = alert.clone();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, MonitorError> {
        Ok(self.alerts.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn list(&self, filter: &AlertFilter) -> Result<(Vec<Alert>, u64), MonitorError> {
        let alerts = self.alerts.read().await;
        let mut matching: Vec<&Alert> = alerts.iter().filter(|a| filter.matches(a)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn stats(&self) -> Result<AlertStats, MonitorError> {
        let mut stats = AlertStats::default();
        for alert in self.alerts.read().await.iter() {
            stats.tally(alert.alert_type, alert.severity, alert.status(), 1);
        }
        Ok(stats)
    }
}

#[async_trait]
impl ParachainRepository for InMemoryStore {
    async fn list_active(&self) -> Result<Vec<Parachain>, MonitorError> {
        Ok(self
            .parachains
            .read()
            .await
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Parachain>, MonitorError> {
        Ok(self.parachains.read().await.values().cloned().collect())
    }

    async fn get(&self, id: ParachainId) -> Result<Option<Parachain>, MonitorError> {
        Ok(self.parachains.read().await.get(&id).cloned())
    }

    async fn register(&self, parachain: &Parachain) -> Result<(), MonitorError> {
        self.parachains
            .write()
            .await
            .insert(parachain.id, parachain.clone());
        Ok(())
    }
}
