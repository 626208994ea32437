//! Alert service: queries and operator actions on stored alerts.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Alert, AlertEvent, AlertFilter, AlertStats, EventBus};
use crate::error::MonitorError;
use crate::store::AlertRepository;

/// Largest page the listing returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Operator-facing alert operations.
///
/// Acknowledge and resolve follow the same pattern: load → apply the
/// domain transition → persist → emit an event → return the alert.
#[derive(Debug, Clone)]
pub struct AlertService {
    alerts: Arc<dyn AlertRepository>,
    event_bus: EventBus,
}

impl AlertService {
    /// Creates a new `AlertService`.
    #[must_use]
    pub fn new(alerts: Arc<dyn AlertRepository>, event_bus: EventBus) -> Self {
        Self { alerts, event_bus }
    }

    /// One page of alerts matching `filter`, newest first, and the total
    /// number of matches. The page size is clamped to `1..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn list(&self, mut filter: AlertFilter) -> Result<(Vec<Alert>, u64), MonitorError> {
        filter.limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        self.alerts.list(&filter).await
    }

    /// Loads one alert.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlertNotFound`] if no alert has this ID.
    pub async fn get(&self, id: Uuid) -> Result<Alert, MonitorError> {
        self.alerts
            .get(id)
            .await?
            .ok_or(MonitorError::AlertNotFound(id))
    }

    /// Acknowledges an alert.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlertNotFound`] for an unknown ID, or
    /// [`MonitorError::InvalidRequest`] if the alert is resolved.
    pub async fn acknowledge(&self, id: Uuid, by: Option<String>) -> Result<Alert, MonitorError> {
        let mut alert = self.get(id).await?;
        let now = Utc::now();
        alert.acknowledge(by.clone(), now)?;
        self.alerts.update(&alert).await?;

        let _ = self.event_bus.publish(AlertEvent::AlertAcknowledged {
            alert_id: alert.id,
            alert_type: alert.alert_type,
            parachain_id: alert.parachain_id,
            by,
            timestamp: now,
        });
        tracing::info!(alert_id = %id, "alert acknowledged");
        Ok(alert)
    }

    /// Resolves an alert, ending its cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlertNotFound`] for an unknown ID, or
    /// [`MonitorError::InvalidRequest`] if it is already resolved.
    pub async fn resolve(&self, id: Uuid, by: Option<String>) -> Result<Alert, MonitorError> {
        let mut alert = self.get(id).await?;
        let now = Utc::now();
        alert.resolve(by.clone(), now)?;
        self.alerts.update(&alert).await?;

        let _ = self.event_bus.publish(AlertEvent::AlertResolved {
            alert_id: alert.id,
            alert_type: alert.alert_type,
            parachain_id: alert.parachain_id,
            severity: alert.severity,
            by,
            timestamp: now,
        });
        tracing::info!(alert_id = %id, "alert resolved");
        Ok(alert)
    }

    /// Counts by status, severity and type.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] on storage failure.
    pub async fn stats(&self) -> Result<AlertStats, MonitorError> {
        self.alerts.stats().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AlertStatus, AlertType, NewAlert, ParachainId, Severity};
    use crate::store::InMemoryStore;
    use chrono::TimeDelta;

    async fn seeded() -> (AlertService, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let draft = NewAlert::system(AlertType::TvlDrop, Severity::High, "t", "m")
            .for_parachain(ParachainId::new(2000), "Acala");
        let Ok(alert) = store
            .create(Alert::from_new(draft, Utc::now(), TimeDelta::minutes(60)))
            .await
        else {
            panic!("create should succeed");
        };
        (
            AlertService::new(store as Arc<dyn AlertRepository>, EventBus::new(16)),
            alert.id,
        )
    }

    #[tokio::test]
    async fn acknowledge_publishes_and_persists() {
        let (service, id) = seeded().await;
        let mut rx = service.event_bus.subscribe();
        let Ok(alert) = service.acknowledge(id, Some("ops".to_string())).await else {
            panic!("acknowledge should succeed");
        };
        assert_eq!(alert.status(), AlertStatus::Acknowledged);
        assert!(alert.acknowledged_at.is_some());
        let Ok(event) = rx.recv().await else {
            panic!("event expected");
        };
        assert_eq!(event.event_type_str(), "alert_acknowledged");
        let Ok(stored) = service.get(id).await else {
            panic!("alert should load");
        };
        assert_eq!(stored.acknowledged_by.as_deref(), Some("ops"));
    }

    #[tokio::test]
    async fn resolve_twice_is_rejected() {
        let (service, id) = seeded().await;
        let Ok(alert) = service.resolve(id, None).await else {
            panic!("resolve should succeed");
        };
        assert!(!alert.is_active);
        assert!(matches!(
            service.resolve(id, None).await,
            Err(MonitorError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.acknowledge(id, None).await,
            Err(MonitorError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn unknown_alert_is_not_found() {
        let (service, _) = seeded().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            service.get(missing).await,
            Err(MonitorError::AlertNotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let (service, _) = seeded().await;
        let Ok((page, total)) = service.list(AlertFilter::default()).await else {
            panic!("list should succeed");
        };
        assert_eq!(page.len(), 1);
        assert_eq!(total, 1);
    }
}
