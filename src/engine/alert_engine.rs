//! Cooldown-gated alert creation.
//!
//! [`AlertEngine::raise`] is the only way alerts are created. The cooldown
//! lookup and the insert run under one async mutex, so two concurrent
//! raises for the same `(type, parachain)` cannot both pass the gate.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Alert, AlertEvent, EventBus, NewAlert};
use crate::error::MonitorError;
use crate::notify::NotificationDispatcher;
use crate::store::AlertRepository;

/// What happened to a raise request.
#[derive(Debug, Clone, PartialEq)]
pub enum RaiseOutcome {
    /// A new alert was stored.
    Created(Box<Alert>),
    /// An active alert of the same type and scope is still in cooldown.
    Suppressed {
        /// The alert holding the cooldown.
        existing: Uuid,
    },
}

impl RaiseOutcome {
    /// Returns `true` if a new alert was stored.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Creates alerts, dispatches their notifications and publishes events.
#[derive(Debug)]
pub struct AlertEngine {
    alerts: Arc<dyn AlertRepository>,
    dispatcher: NotificationDispatcher,
    event_bus: EventBus,
    cooldown: TimeDelta,
    gate: Mutex<()>,
}

impl AlertEngine {
    /// Creates an engine with the given cooldown length.
    #[must_use]
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        dispatcher: NotificationDispatcher,
        event_bus: EventBus,
        cooldown: TimeDelta,
    ) -> Self {
        Self {
            alerts,
            dispatcher,
            event_bus,
            cooldown,
            gate: Mutex::new(()),
        }
    }

    /// Cooldown applied to new alerts.
    #[must_use]
    pub const fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    /// Stores `draft` as a new alert unless an active alert of the same
    /// type and scope is still in cooldown at `now`.
    ///
    /// After creation, notifications are dispatched and every attempt is
    /// appended to the alert's history. A failure to record the attempts
    /// is logged; the alert stays created.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if the cooldown lookup or the
    /// insert fails.
    pub async fn raise(
        &self,
        draft: NewAlert,
        now: DateTime<Utc>,
    ) -> Result<RaiseOutcome, MonitorError> {
        let mut alert = {
            let _gate = self.gate.lock().await;
            if let Some(existing) = self
                .alerts
                .find_active_in_cooldown(draft.alert_type, draft.parachain_id, now)
                .await?
            {
                tracing::debug!(
                    alert_type = %draft.alert_type,
                    parachain_id = ?draft.parachain_id.map(|p| p.get()),
                    existing = %existing.id,
                    "alert in cooldown, skipping creation"
                );
                return Ok(RaiseOutcome::Suppressed {
                    existing: existing.id,
                });
            }
            self.alerts
                .create(Alert::from_new(draft, now, self.cooldown))
                .await?
        };

        tracing::info!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            title = %alert.title,
            "created alert"
        );

        let attempts = self.dispatcher.dispatch(&alert).await;
        if !attempts.is_empty() {
            for attempt in attempts {
                alert.record_notification(attempt);
            }
            if let Err(e) = self.alerts.update(&alert).await {
                tracing::error!(alert_id = %alert.id, error = %e, "failed to record notification attempts");
            }
        }

        let _ = self.event_bus.publish(AlertEvent::AlertRaised {
            alert: Box::new(alert.clone()),
        });

        Ok(RaiseOutcome::Created(Box::new(alert)))
    }
}
