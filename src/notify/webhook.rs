//! Webhook delivery: POST the alert as JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::NotificationChannel;
use crate::domain::{Alert, NotificationMethod};
use crate::error::MonitorError;

/// Request body sent to the webhook target.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a Alert,
}

/// Posts `{"type": "alert", "data": <alert>}` to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    /// Creates a channel posting to `url` with a 10 second timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Internal`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MonitorError::Internal(format!("webhook client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn method(&self) -> NotificationMethod {
        NotificationMethod::Webhook
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                kind: "alert",
                data: alert,
            })
            .send()
            .await
            .map_err(|e| MonitorError::Notification(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(MonitorError::Notification(format!("HTTP {}", status.as_u16())))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AlertType, NewAlert, ParachainId, Severity};
    use chrono::{TimeDelta, Utc};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        let draft = NewAlert::system(AlertType::TvlDrop, Severity::High, "TVL Drop Alert: Acala", "m")
            .for_parachain(ParachainId::new(2000), "Acala");
        Alert::from_new(draft, Utc::now(), TimeDelta::minutes(60))
    }

    #[tokio::test]
    async fn posts_typed_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "type": "alert",
                "data": { "type": "tvl_drop", "parachain_id": 2000 }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let Ok(channel) = WebhookChannel::new(format!("{}/hook", server.uri())) else {
            panic!("client should build");
        };
        assert!(channel.send(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let Ok(channel) = WebhookChannel::new(server.uri()) else {
            panic!("client should build");
        };
        let Err(MonitorError::Notification(reason)) = channel.send(&alert()).await else {
            panic!("expected a notification error");
        };
        assert_eq!(reason, "HTTP 503");
    }
}
