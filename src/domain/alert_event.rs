//! Domain events reflecting alert lifecycle changes.
//!
//! Every alert mutation emits an [`AlertEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::ParachainId;
use super::alert::{Alert, AlertType, Severity};

/// Domain event emitted after every alert mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AlertEvent {
    /// Emitted when the engine creates a new alert.
    AlertRaised {
        /// The created alert, including its notification history.
        alert: Box<Alert>,
    },

    /// Emitted when an operator acknowledges an alert.
    AlertAcknowledged {
        /// Alert identifier.
        alert_id: Uuid,
        /// Alert type.
        alert_type: AlertType,
        /// Scoped parachain, if any.
        parachain_id: Option<ParachainId>,
        /// Operator, if given.
        by: Option<String>,
        /// Acknowledgement time.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an alert is resolved.
    AlertResolved {
        /// Alert identifier.
        alert_id: Uuid,
        /// Alert type.
        alert_type: AlertType,
        /// Scoped parachain, if any.
        parachain_id: Option<ParachainId>,
        /// Severity the alert had.
        severity: Severity,
        /// Operator, if given.
        by: Option<String>,
        /// Resolution time.
        timestamp: DateTime<Utc>,
    },
}

impl AlertEvent {
    /// Returns the parachain the event is scoped to; `None` for system
    /// alerts.
    #[must_use]
    pub fn parachain_id(&self) -> Option<ParachainId> {
        match self {
            Self::AlertRaised { alert } => alert.parachain_id,
            Self::AlertAcknowledged { parachain_id, .. }
            | Self::AlertResolved { parachain_id, .. } => *parachain_id,
        }
    }

    /// Returns the alert ID the event refers to.
    #[must_use]
    pub fn alert_id(&self) -> Uuid {
        match self {
            Self::AlertRaised { alert } => alert.id,
            Self::AlertAcknowledged { alert_id, .. } | Self::AlertResolved { alert_id, .. } => {
                *alert_id
            }
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::AlertRaised { .. } => "alert_raised",
            Self::AlertAcknowledged { .. } => "alert_acknowledged",
            Self::AlertResolved { .. } => "alert_resolved",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::NewAlert;
    use chrono::TimeDelta;

    fn raised(parachain: Option<ParachainId>) -> AlertEvent {
        let mut draft = NewAlert::system(
            AlertType::ParachainIssue,
            Severity::Critical,
            "System Alert",
            "lost connection",
        );
        draft.parachain_id = parachain;
        AlertEvent::AlertRaised {
            alert: Box::new(Alert::from_new(draft, Utc::now(), TimeDelta::minutes(60))),
        }
    }

    #[test]
    fn raised_event_type() {
        assert_eq!(raised(None).event_type_str(), "alert_raised");
    }

    #[test]
    fn raised_event_serializes_with_tag() {
        let json = serde_json::to_string(&raised(Some(ParachainId::new(2000))));
        assert!(json.is_ok());
        let json_str = json.unwrap_or_default();
        assert!(json_str.contains("\"event_type\":\"alert_raised\""));
        assert!(json_str.contains("parachain_issue"));
    }

    #[test]
    fn parachain_accessor() {
        let id = ParachainId::new(2004);
        assert_eq!(raised(Some(id)).parachain_id(), Some(id));
        let event = AlertEvent::AlertResolved {
            alert_id: Uuid::new_v4(),
            alert_type: AlertType::TvlDrop,
            parachain_id: None,
            severity: Severity::High,
            by: None,
            timestamp: Utc::now(),
        };
        assert_eq!(event.parachain_id(), None);
    }
}
