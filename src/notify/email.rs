//! Email delivery through a Resend-compatible HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::NotificationChannel;
use crate::domain::{Alert, NotificationMethod};
use crate::error::MonitorError;

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    text: String,
}

/// Sends alerts as plain-text email via `POST {base_url}/emails`.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
    to: Vec<String>,
}

impl EmailChannel {
    /// Creates a channel authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Internal`] if the HTTP client cannot be
    /// built, or [`MonitorError::InvalidRequest`] if `to` is empty.
    pub fn new(
        base_url: &str,
        api_key: &str,
        from: &str,
        to: Vec<String>,
    ) -> Result<Self, MonitorError> {
        if to.is_empty() {
            return Err(MonitorError::InvalidRequest(
                "email channel needs at least one recipient".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MonitorError::Internal(format!("email client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
            to,
        })
    }

    fn render(alert: &Alert) -> (String, String) {
        let subject = format!("[{}] {}", alert.severity.as_str().to_uppercase(), alert.title);
        let mut body = format!(
            "{}\n\nType: {}\nSeverity: {}\n",
            alert.message, alert.alert_type, alert.severity
        );
        if let Some(name) = &alert.parachain_name {
            body.push_str(&format!("Parachain: {name}\n"));
        }
        if let (Some(current), Some(previous)) = (alert.current_value, alert.previous_value) {
            body.push_str(&format!("Current: {current:.2}\nPrevious: {previous:.2}\n"));
        }
        if let Some(change) = alert.change_percentage {
            body.push_str(&format!("Change: {change:.2}%\n"));
        }
        body.push_str(&format!("Raised at: {}\n", alert.created_at.to_rfc3339()));
        (subject, body)
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn method(&self) -> NotificationMethod {
        NotificationMethod::Email
    }

    async fn send(&self, alert: &Alert) -> Result<(), MonitorError> {
        let (subject, text) = Self::render(alert);
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmailRequest {
                from: &self.from,
                to: &self.to,
                subject,
                text,
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
    use crate::domain::{AlertType, NewAlert, Severity};
    use chrono::{TimeDelta, Utc};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        let mut draft = NewAlert::system(
            AlertType::ActivityDrop,
            Severity::Critical,
            "Activity Drop Alert: Moonbeam",
            "Transaction activity dropped by -40.00% in the last 24 hours",
        );
        draft.current_value = Some(60.0);
        draft.previous_value = Some(100.0);
        draft.change_percentage = Some(-40.0);
        Alert::from_new(draft, Utc::now(), TimeDelta::minutes(60))
    }

    #[test]
    fn rendered_subject_carries_severity() {
        let (subject, body) = EmailChannel::render(&alert());
        assert_eq!(subject, "[CRITICAL] Activity Drop Alert: Moonbeam");
        assert!(body.contains("Change: -40.00%"));
    }

    #[test]
    fn requires_recipients() {
        assert!(EmailChannel::new("http://localhost", "key", "a@b.c", Vec::new()).is_err());
    }

    #[tokio::test]
    async fn posts_to_emails_endpoint_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "e1"})))
            .expect(1)
            .mount(&server)
            .await;

        let Ok(channel) = EmailChannel::new(
            &server.uri(),
            "secret",
            "alerts@example.com",
            vec!["ops@example.com".to_string()],
        ) else {
            panic!("channel should build");
        };
        assert!(channel.send(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_request_is_a_notification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let Ok(channel) = EmailChannel::new(
            &server.uri(),
            "bad",
            "alerts@example.com",
            vec!["ops@example.com".to_string()],
        ) else {
            panic!("channel should build");
        };
        assert!(matches!(
            channel.send(&alert()).await,
            Err(MonitorError::Notification(reason)) if reason == "HTTP 401"
        ));
    }
}
