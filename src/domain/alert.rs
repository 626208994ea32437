//! Alert records and their lifecycle.
//!
//! An [`Alert`] is created by the alert engine when a threshold is crossed
//! outside cooldown. After creation it only changes through
//! [`Alert::acknowledge`], [`Alert::resolve`] and
//! [`Alert::record_notification`]. Alerts are never deleted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ParachainId;
use crate::error::MonitorError;

/// What kind of anomaly an alert reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// TVL fell past the drop threshold.
    TvlDrop,
    /// TVL rose past the spike threshold.
    TvlSpike,
    /// Transaction count fell past the drop threshold.
    ActivityDrop,
    /// Transaction count rose past the spike threshold.
    ActivitySpike,
    /// Unusual cross-chain message traffic.
    XcmAnomaly,
    /// A parachain appeared in the registry.
    NewParachain,
    /// Data collection or connectivity problem.
    ParachainIssue,
}

impl AlertType {
    /// All alert types, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::TvlDrop,
        Self::TvlSpike,
        Self::ActivityDrop,
        Self::ActivitySpike,
        Self::XcmAnomaly,
        Self::NewParachain,
        Self::ParachainIssue,
    ];

    /// Returns the type as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TvlDrop => "tvl_drop",
            Self::TvlSpike => "tvl_spike",
            Self::ActivityDrop => "activity_drop",
            Self::ActivitySpike => "activity_spike",
            Self::XcmAnomaly => "xcm_anomaly",
            Self::NewParachain => "new_parachain",
            Self::ParachainIssue => "parachain_issue",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MonitorError::InvalidRequest(format!("unknown alert type: {s}")))
    }
}

/// Alert severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Worth a look.
    Medium,
    /// Needs attention.
    High,
    /// Needs attention now.
    Critical,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Returns the severity as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| MonitorError::InvalidRequest(format!("unknown severity: {s}")))
    }
}

/// Who raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertSource {
    /// Raised by the monitoring pipeline.
    System,
    /// Raised by an operator.
    Manual,
    /// Raised by an external integration.
    External,
}

impl AlertSource {
    /// Returns the source as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Manual => "manual",
            Self::External => "external",
        }
    }
}

impl FromStr for AlertSource {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "manual" => Ok(Self::Manual),
            "external" => Ok(Self::External),
            other => Err(MonitorError::InvalidRequest(format!(
                "unknown alert source: {other}"
            ))),
        }
    }
}

/// Lifecycle status derived from the alert flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Active and not yet acknowledged.
    Active,
    /// Active and acknowledged by an operator.
    Acknowledged,
    /// Deactivated without a resolution.
    Inactive,
    /// Resolved.
    Resolved,
}

impl FromStr for AlertStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "acknowledged" => Ok(Self::Acknowledged),
            "inactive" => Ok(Self::Inactive),
            "resolved" => Ok(Self::Resolved),
            other => Err(MonitorError::InvalidRequest(format!(
                "unknown alert status: {other}"
            ))),
        }
    }
}

/// Notification channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMethod {
    /// Email delivery.
    Email,
    /// HTTP webhook delivery.
    Webhook,
}

impl NotificationMethod {
    /// Returns the method as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Webhook => "webhook",
        }
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Delivered.
    Sent,
    /// Delivery failed.
    Failed,
    /// Queued, outcome unknown.
    Pending,
}

/// One entry of an alert's notification history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationAttempt {
    /// Channel used.
    pub method: NotificationMethod,
    /// Outcome.
    pub status: DeliveryStatus,
    /// When the attempt finished.
    pub sent_at: DateTime<Utc>,
    /// Failure reason, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-alert channel preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationPrefs {
    /// Send an email.
    pub email: bool,
    /// Call the webhook.
    pub webhook: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: false,
            webhook: true,
        }
    }
}

impl NotificationPrefs {
    /// Returns `true` if the alert wants delivery over `method`.
    #[must_use]
    pub const fn wants(&self, method: NotificationMethod) -> bool {
        match method {
            NotificationMethod::Email => self.email,
            NotificationMethod::Webhook => self.webhook,
        }
    }
}

/// Everything needed to create an alert, before the cooldown gate.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    /// Alert type.
    pub alert_type: AlertType,
    /// Severity.
    pub severity: Severity,
    /// Short title.
    pub title: String,
    /// Human-readable description.
    pub message: String,
    /// Scoped parachain; `None` for system alerts.
    pub parachain_id: Option<ParachainId>,
    /// Scoped parachain name.
    pub parachain_name: Option<String>,
    /// Threshold that was crossed.
    pub threshold: Option<f64>,
    /// Current metric value.
    pub current_value: Option<f64>,
    /// Baseline metric value.
    pub previous_value: Option<f64>,
    /// Percentage change between the two.
    pub change_percentage: Option<f64>,
    /// Who raised it.
    pub source: AlertSource,
    /// Channel preferences.
    pub notifications: NotificationPrefs,
}

impl NewAlert {
    /// A system-level alert without parachain scope or metric values.
    #[must_use]
    pub fn system(alert_type: AlertType, severity: Severity, title: &str, message: &str) -> Self {
        Self {
            alert_type,
            severity,
            title: title.to_string(),
            message: message.to_string(),
            parachain_id: None,
            parachain_name: None,
            threshold: None,
            current_value: None,
            previous_value: None,
            change_percentage: None,
            source: AlertSource::System,
            notifications: NotificationPrefs::default(),
        }
    }

    /// Scopes the alert to a parachain.
    #[must_use]
    pub fn for_parachain(mut self, id: ParachainId, name: &str) -> Self {
        self.parachain_id = Some(id);
        self.parachain_name = Some(name.to_string());
        self
    }
}

/// A detected anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Alert {
    /// Unique alert identifier.
    pub id: Uuid,
    /// Alert type.
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Severity.
    pub severity: Severity,
    /// Short title.
    pub title: String,
    /// Human-readable description.
    pub message: String,
    /// Scoped parachain; `None` for system alerts.
    pub parachain_id: Option<ParachainId>,
    /// Scoped parachain name.
    pub parachain_name: Option<String>,
    /// Threshold that was crossed.
    pub threshold: Option<f64>,
    /// Current metric value.
    pub current_value: Option<f64>,
    /// Baseline metric value.
    pub previous_value: Option<f64>,
    /// Percentage change between the two.
    pub change_percentage: Option<f64>,
    /// Who raised it.
    pub source: AlertSource,
    /// Whether the alert is still active.
    pub is_active: bool,
    /// Whether an operator acknowledged it.
    pub is_acknowledged: bool,
    /// Operator that acknowledged it.
    pub acknowledged_by: Option<String>,
    /// When it was acknowledged.
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// When it was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Operator that resolved it.
    pub resolved_by: Option<String>,
    /// Channel preferences.
    pub notifications: NotificationPrefs,
    /// Delivery attempts, oldest first.
    pub notification_history: Vec<NotificationAttempt>,
    /// New alerts of the same type and scope are suppressed until then.
    pub cooldown_until: Option<DateTime<Utc>>,
    /// When the condition was first observed.
    pub first_seen: DateTime<Utc>,
    /// Last modification of the record.
    pub last_seen: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Materializes a draft that passed the cooldown gate.
    #[must_use]
    pub fn from_new(draft: NewAlert, now: DateTime<Utc>, cooldown: TimeDelta) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type: draft.alert_type,
            severity: draft.severity,
            title: draft.title,
            message: draft.message,
            parachain_id: draft.parachain_id,
            parachain_name: draft.parachain_name,
            threshold: draft.threshold,
            current_value: draft.current_value,
            previous_value: draft.previous_value,
            change_percentage: draft.change_percentage,
            source: draft.source,
            is_active: true,
            is_acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            resolved_by: None,
            notifications: draft.notifications,
            notification_history: Vec::new(),
            cooldown_until: Some(now + cooldown),
            first_seen: now,
            last_seen: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived lifecycle status.
    #[must_use]
    pub const fn status(&self) -> AlertStatus {
        if self.resolved_at.is_some() {
            AlertStatus::Resolved
        } else if !self.is_active {
            AlertStatus::Inactive
        } else if self.is_acknowledged {
            AlertStatus::Acknowledged
        } else {
            AlertStatus::Active
        }
    }

    /// Returns `true` while `now` is before `cooldown_until`.
    #[must_use]
    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Returns `true` if this alert blocks a new alert of the same type and
    /// scope at `now`.
    #[must_use]
    pub fn suppresses(
        &self,
        alert_type: AlertType,
        parachain_id: Option<ParachainId>,
        now: DateTime<Utc>,
    ) -> bool {
        self.alert_type == alert_type
            && self.parachain_id == parachain_id
            && self.is_active
            && self.is_in_cooldown(now)
    }

    /// Marks the alert as acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] if the alert is resolved.
    pub fn acknowledge(
        &mut self,
        by: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        if self.resolved_at.is_some() {
            return Err(MonitorError::InvalidRequest(format!(
                "alert {} is already resolved",
                self.id
            )));
        }
        self.is_acknowledged = true;
        self.acknowledged_by = by;
        self.acknowledged_at = Some(at);
        self.touch(at);
        Ok(())
    }

    /// Resolves the alert, deactivating it.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidRequest`] if the alert is already
    /// resolved.
    pub fn resolve(&mut self, by: Option<String>, at: DateTime<Utc>) -> Result<(), MonitorError> {
        if self.resolved_at.is_some() {
            return Err(MonitorError::InvalidRequest(format!(
                "alert {} is already resolved",
                self.id
            )));
        }
        self.is_active = false;
        self.resolved_at = Some(at);
        self.resolved_by = by;
        self.touch(at);
        Ok(())
    }

    /// Appends a delivery attempt to the notification history.
    pub fn record_notification(&mut self, attempt: NotificationAttempt) {
        let at = attempt.sent_at;
        self.notification_history.push(attempt);
        self.touch(at);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_seen = at;
        self.updated_at = at;
    }
}

/// Query filter for alert listings. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    /// Derived status.
    pub status: Option<AlertStatus>,
    /// Severity.
    pub severity: Option<Severity>,
    /// Alert type.
    pub alert_type: Option<AlertType>,
    /// Scoped parachain.
    pub parachain_id: Option<ParachainId>,
    /// Page size.
    pub limit: usize,
    /// Rows to skip.
    pub offset: usize,
}

impl AlertFilter {
    /// Returns `true` if `alert` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, alert: &Alert) -> bool {
        self.status.is_none_or(|s| alert.status() == s)
            && self.severity.is_none_or(|s| alert.severity == s)
            && self.alert_type.is_none_or(|t| alert.alert_type == t)
            && self.parachain_id.is_none_or(|p| alert.parachain_id == Some(p))
    }
}

/// Aggregate counts over all alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AlertStats {
    /// All alerts.
    pub total: u64,
    /// Active, unacknowledged alerts.
    pub active: u64,
    /// Active, acknowledged alerts.
    pub acknowledged: u64,
    /// Resolved alerts.
    pub resolved: u64,
    /// Count per severity name.
    pub by_severity: BTreeMap<String, u64>,
    /// Count per alert type name.
    pub by_type: BTreeMap<String, u64>,
}

impl AlertStats {
    /// Adds `count` alerts sharing type, severity and status.
    pub fn tally(
        &mut self,
        alert_type: AlertType,
        severity: Severity,
        status: AlertStatus,
        count: u64,
    ) {
        self.total += count;
        match status {
            AlertStatus::Active => self.active += count,
            AlertStatus::Acknowledged => self.acknowledged += count,
            AlertStatus::Resolved => self.resolved += count,
            AlertStatus::Inactive => {}
        }
        *self.by_severity.entry(severity.as_str().to_string()).or_default() += count;
        *self.by_type.entry(alert_type.as_str().to_string()).or_default() += count;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_alert(now: DateTime<Utc>) -> Alert {
        let draft = NewAlert::system(
            AlertType::TvlDrop,
            Severity::High,
            "TVL Drop Alert: Acala",
            "TVL dropped by -20.00% in the last 24 hours",
        )
        .for_parachain(ParachainId::new(2000), "Acala");
        Alert::from_new(draft, now, TimeDelta::minutes(60))
    }

    #[test]
    fn new_alert_is_active_with_cooldown() {
        let now = Utc::now();
        let alert = make_alert(now);
        assert_eq!(alert.status(), AlertStatus::Active);
        assert_eq!(alert.cooldown_until, Some(now + TimeDelta::minutes(60)));
        assert!(alert.is_in_cooldown(now + TimeDelta::minutes(30)));
        assert!(!alert.is_in_cooldown(now + TimeDelta::minutes(60)));
    }

    #[test]
    fn suppression_requires_same_scope() {
        let now = Utc::now();
        let alert = make_alert(now);
        let id = Some(ParachainId::new(2000));
        assert!(alert.suppresses(AlertType::TvlDrop, id, now));
        assert!(!alert.suppresses(AlertType::TvlSpike, id, now));
        assert!(!alert.suppresses(AlertType::TvlDrop, None, now));
        assert!(!alert.suppresses(AlertType::TvlDrop, Some(ParachainId::new(2004)), now));
    }

    #[test]
    fn resolved_alert_no_longer_suppresses() {
        let now = Utc::now();
        let mut alert = make_alert(now);
        assert!(alert.resolve(Some("ops".to_string()), now).is_ok());
        assert!(!alert.is_active);
        assert_eq!(alert.status(), AlertStatus::Resolved);
        assert!(!alert.suppresses(AlertType::TvlDrop, Some(ParachainId::new(2000)), now));
    }

    #[test]
    fn acknowledge_sets_flag_and_timestamp_together() {
        let now = Utc::now();
        let mut alert = make_alert(now);
        assert!(alert.acknowledge(None, now).is_ok());
        assert!(alert.is_acknowledged);
        assert_eq!(alert.acknowledged_at, Some(now));
        assert_eq!(alert.status(), AlertStatus::Acknowledged);
    }

    #[test]
    fn resolved_alert_rejects_further_transitions() {
        let now = Utc::now();
        let mut alert = make_alert(now);
        assert!(alert.resolve(None, now).is_ok());
        assert!(alert.resolve(None, now).is_err());
        assert!(alert.acknowledge(None, now).is_err());
        assert!(!alert.is_acknowledged);
    }

    #[test]
    fn type_and_severity_parse_from_wire_names() {
        for t in AlertType::ALL {
            let Ok(parsed) = t.as_str().parse::<AlertType>() else {
                panic!("type {t} should parse");
            };
            assert_eq!(parsed, t);
        }
        assert!("tvl_crash".parse::<AlertType>().is_err());
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn alert_serializes_type_field() {
        let json = serde_json::to_value(make_alert(Utc::now())).unwrap_or_default();
        assert_eq!(json.get("type").and_then(|v| v.as_str()), Some("tvl_drop"));
        assert_eq!(json.get("severity").and_then(|v| v.as_str()), Some("high"));
        assert_eq!(json.get("parachain_id").and_then(|v| v.as_u64()), Some(2000));
    }

    #[test]
    fn filter_matches_on_all_set_fields() {
        let alert = make_alert(Utc::now());
        let filter = AlertFilter {
            severity: Some(Severity::High),
            parachain_id: Some(ParachainId::new(2000)),
            ..AlertFilter::default()
        };
        assert!(filter.matches(&alert));
        let other = AlertFilter {
            status: Some(AlertStatus::Resolved),
            ..AlertFilter::default()
        };
        assert!(!other.matches(&alert));
    }

    #[test]
    fn stats_tally_counts_by_bucket() {
        let mut stats = AlertStats::default();
        stats.tally(AlertType::TvlDrop, Severity::High, AlertStatus::Active, 2);
        stats.tally(AlertType::TvlDrop, Severity::Critical, AlertStatus::Resolved, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.by_type.get("tvl_drop"), Some(&3));
        assert_eq!(stats.by_severity.get("critical"), Some(&1));
    }
}
