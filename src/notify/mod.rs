//! Alert notification delivery.
//!
//! A [`NotificationDispatcher`] owns the configured
//! [`NotificationChannel`]s and sends an alert over every channel the
//! alert's preferences enable. Each send produces one
//! [`NotificationAttempt`]; failures are recorded, never propagated.

pub mod email;
pub mod webhook;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{Alert, DeliveryStatus, NotificationAttempt, NotificationMethod};
use crate::error::MonitorError;

pub use email::EmailChannel;
pub use webhook::WebhookChannel;

/// One delivery mechanism for alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Which preference flag enables this channel.
    fn method(&self) -> NotificationMethod;

    /// Delivers `alert`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Notification`] describing the failure.
    async fn send(&self, alert: &Alert) -> Result<(), MonitorError>;
}

/// Fans an alert out to the configured channels.
#[derive(Debug, Clone, Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over `channels`.
    #[must_use]
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// A dispatcher with no channels; every dispatch is a no-op.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Number of configured channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sends `alert` over each channel its preferences enable, in
    /// configuration order, and returns one attempt per send.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<NotificationAttempt> {
        let mut attempts = Vec::new();
        for channel in &self.channels {
            let method = channel.method();
            if !alert.notifications.wants(method) {
                continue;
            }
            let attempt = match channel.send(alert).await {
                Ok(()) => {
                    tracing::info!(alert_id = %alert.id, method = method.as_str(), "notification sent");
                    NotificationAttempt {
                        method,
                        status: DeliveryStatus::Sent,
                        sent_at: Utc::now(),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        alert_id = %alert.id,
                        method = method.as_str(),
                        error = %e,
                        "notification failed"
                    );
                    NotificationAttempt {
                        method,
                        status: DeliveryStatus::Failed,
                        sent_at: Utc::now(),
                        error: Some(failure_reason(e)),
                    }
                }
            };
            attempts.push(attempt);
        }
        attempts
    }
}

fn failure_reason(err: MonitorError) -> String {
    match err {
        MonitorError::Notification(reason) => reason,
        other => other.to_string(),
    }
}
