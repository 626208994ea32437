//! Fan-out of alert lifecycle events to WebSocket clients.

use tokio::sync::broadcast;

use super::AlertEvent;

/// Cloneable handle to the alert event channel.
///
/// The alert engine publishes `alert_raised`; the alert service publishes
/// `alert_acknowledged` and `alert_resolved`. Receivers that fall more than
/// `capacity` events behind lose the oldest ones and see
/// [`broadcast::error::RecvError::Lagged`].
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AlertEvent>,
}

impl EventBus {
    /// Creates a bus holding up to `capacity` undelivered events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends `event` to every connected client and returns how many
    /// received it. With nobody listening the event is dropped.
    pub fn publish(&self, event: AlertEvent) -> usize {
        let event_type = event.event_type_str();
        let alert_id = event.alert_id();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(event_type, %alert_id, delivered, "alert event published");
        delivered
    }

    /// A receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }
}
