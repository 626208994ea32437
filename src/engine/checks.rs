//! The checks run by the alert job.
//!
//! [`AlertChecker`] compares each active parachain's latest snapshot with
//! the one from a comparison window ago, and raises system alerts for a
//! lost chain connection, stale TVL data and repeated fetch failures.
//! Every alert goes through [`AlertEngine::raise`], so the cooldown gate
//! applies uniformly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alert_engine::{AlertEngine, RaiseOutcome};
use super::threshold::{Direction, Evaluation, ThresholdSet};
use crate::config::AlertSettings;
use crate::domain::{AlertType, MetricKind, NewAlert, Parachain, ParachainId, Severity};
use crate::error::MonitorError;
use crate::store::{MetricRepository, ParachainRepository};

/// A parachain whose fetches keep failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    /// Failing parachain.
    pub parachain_id: ParachainId,
    /// Its display name.
    pub parachain_name: String,
    /// Consecutive failed fetches.
    pub consecutive: u32,
    /// Message of the most recent failure.
    pub last_error: String,
}

/// Counters for one alert pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct PassReport {
    /// Comparisons that were evaluated.
    pub evaluated: u32,
    /// Parachains skipped for lack of comparable data.
    pub skipped: u32,
    /// Alerts created.
    pub raised: u32,
    /// Alerts suppressed by cooldown.
    pub suppressed: u32,
    /// Parachains whose check failed.
    pub errors: u32,
}

impl PassReport {
    /// Adds `other`'s counters to this report.
    pub fn merge(&mut self, other: Self) {
        self.evaluated += other.evaluated;
        self.skipped += other.skipped;
        self.raised += other.raised;
        self.suppressed += other.suppressed;
        self.errors += other.errors;
    }

    fn count(&mut self, outcome: &RaiseOutcome) {
        if outcome.is_created() {
            self.raised += 1;
        } else {
            self.suppressed += 1;
        }
    }
}

/// Runs metric and system checks against stored data.
#[derive(Debug)]
pub struct AlertChecker {
    engine: Arc<AlertEngine>,
    metrics: Arc<dyn MetricRepository>,
    parachains: Arc<dyn ParachainRepository>,
    settings: AlertSettings,
}

impl AlertChecker {
    /// Creates a checker.
    #[must_use]
    pub fn new(
        engine: Arc<AlertEngine>,
        metrics: Arc<dyn MetricRepository>,
        parachains: Arc<dyn ParachainRepository>,
        settings: AlertSettings,
    ) -> Self {
        Self {
            engine,
            metrics,
            parachains,
            settings,
        }
    }

    /// Thresholds applied to `kind`.
    #[must_use]
    pub const fn thresholds(&self, kind: MetricKind) -> ThresholdSet {
        match kind {
            MetricKind::Tvl => self.settings.tvl,
            MetricKind::Activity => self.settings.activity,
        }
    }

    /// Compares every active parachain's latest `kind` snapshot with the
    /// newest one at least a comparison window older than `now`.
    ///
    /// A failure for one parachain is logged and counted; the pass
    /// continues with the next.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Persistence`] if the parachain list cannot
    /// be loaded.
    pub async fn check_metric(
        &self,
        kind: MetricKind,
        now: DateTime<Utc>,
    ) -> Result<PassReport, MonitorError> {
        let mut report = PassReport::default();
        for parachain in self.parachains.list_active().await? {
            match self.check_parachain(&parachain, kind, now).await {
                Ok(Some(outcome)) => {
                    report.evaluated += 1;
                    if let Some(outcome) = outcome {
                        report.count(&outcome);
                    }
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        parachain_id = %parachain.id,
                        metric = %kind,
                        error = %e,
                        "alert check failed"
                    );
                }
            }
        }
        Ok(report)
    }

    /// `Ok(None)` when there is nothing to compare, `Ok(Some(None))` when
    /// evaluated without a trigger.
    async fn check_parachain(
        &self,
        parachain: &Parachain,
        kind: MetricKind,
        now: DateTime<Utc>,
    ) -> Result<Option<Option<RaiseOutcome>>, MonitorError> {
        let cutoff = now - self.settings.comparison_window;
        let Some(current) = self.metrics.find_latest(parachain.id, kind).await? else {
            return Ok(None);
        };
        let Some(baseline) = self
            .metrics
            .find_latest_before(parachain.id, kind, cutoff)
            .await?
        else {
            return Ok(None);
        };
        if current.timestamp() <= baseline.timestamp()
            || !current.is_comparable()
            || !baseline.is_comparable()
        {
            return Ok(None);
        }

        let (current_value, previous_value) = (current.alert_value(), baseline.alert_value());
        let detection = match self.thresholds(kind).evaluate(current_value, previous_value) {
            Evaluation::Skipped(reason) => {
                tracing::debug!(parachain_id = %parachain.id, metric = %kind, ?reason, "comparison skipped");
                return Ok(None);
            }
            Evaluation::NoChange { .. } => return Ok(Some(None)),
            Evaluation::Triggered(detection) => detection,
        };

        let change = detection.change_percentage;
        let (alert_type, title, message) = match (kind, detection.direction) {
            (MetricKind::Tvl, Direction::Drop) => (
                AlertType::TvlDrop,
                format!("TVL Drop Alert: {}", parachain.name),
                format!("TVL dropped by {change:.2}% in the last 24 hours"),
            ),
            (MetricKind::Tvl, Direction::Spike) => (
                AlertType::TvlSpike,
                format!("TVL Spike Alert: {}", parachain.name),
                format!("TVL increased by {change:.2}% in the last 24 hours"),
            ),
            (MetricKind::Activity, Direction::Drop) => (
                AlertType::ActivityDrop,
                format!("Activity Drop Alert: {}", parachain.name),
                format!("Transaction activity dropped by {change:.2}% in the last 24 hours"),
            ),
            (MetricKind::Activity, Direction::Spike) => (
                AlertType::ActivitySpike,
                format!("Activity Spike Alert: {}", parachain.name),
                format!("Transaction activity increased by {change:.2}% in the last 24 hours"),
            ),
        };

        let mut draft = NewAlert::system(alert_type, detection.severity, &title, &message)
            .for_parachain(parachain.id, &parachain.name);
        draft.threshold = Some(detection.threshold);
        draft.current_value = Some(current_value);
        draft.previous_value = Some(previous_value);
        draft.change_percentage = Some(change);

        Ok(Some(Some(self.engine.raise(draft, now).await?)))
    }

    /// Raises the connectivity and data-freshness system alerts.
    ///
    /// Both are unscoped `parachain_issue` alerts and share one cooldown.
    /// A storage failure in one check is counted in
    /// [`PassReport::errors`] and the other check still runs.
    pub async fn check_system(&self, connected: bool, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::default();

        if !connected {
            let draft = NewAlert::system(
                AlertType::ParachainIssue,
                Severity::Critical,
                "System Alert: Data Aggregator Disconnected",
                "Lost connection to Polkadot API. Data collection may be affected.",
            );
            self.raise_into(&mut report, draft, now).await;
        }

        let since = now - self.settings.stale_data_window;
        match self.metrics.has_any_since(MetricKind::Tvl, since).await {
            Ok(true) => {}
            Ok(false) => {
                let draft = NewAlert::system(
                    AlertType::ParachainIssue,
                    Severity::High,
                    "System Alert: No Recent TVL Data",
                    "No TVL data collected in the last hour. Check data collection jobs.",
                );
                self.raise_into(&mut report, draft, now).await;
            }
            Err(e) => {
                report.errors += 1;
                tracing::error!(error = %e, "tvl freshness check failed");
            }
        }

        report
    }

    /// Raises a critical `parachain_issue` alert, scoped to the parachain,
    /// for each entry in `failing`. A failed raise is counted and the
    /// remaining entries are still processed.
    pub async fn check_fetch_failures(
        &self,
        failing: &[FetchFailure],
        now: DateTime<Utc>,
    ) -> PassReport {
        let mut report = PassReport::default();
        for failure in failing {
            let draft = NewAlert::system(
                AlertType::ParachainIssue,
                Severity::Critical,
                &format!("Parachain Issue: {}", failure.parachain_name),
                &format!(
                    "Data collection failed {} times in a row: {}",
                    failure.consecutive, failure.last_error
                ),
            )
            .for_parachain(failure.parachain_id, &failure.parachain_name);
            self.raise_into(&mut report, draft, now).await;
        }
        report
    }

    async fn raise_into(&self, report: &mut PassReport, draft: NewAlert, now: DateTime<Utc>) {
        let title = draft.title.clone();
        match self.engine.raise(draft, now).await {
            Ok(outcome) => report.count(&outcome),
            Err(e) => {
                report.errors += 1;
                tracing::error!(title = %title, error = %e, "alert raise failed");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AlertFilter, EventBus, TvlSnapshot};
    use crate::notify::NotificationDispatcher;
    use crate::store::{AlertRepository, InMemoryStore};
    use chrono::{TimeDelta, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 5, 0)
            .single()
            .unwrap_or_default()
    }

    fn checker(store: &Arc<InMemoryStore>) -> AlertChecker {
        let settings = AlertSettings::default();
        let engine = Arc::new(AlertEngine::new(
            Arc::clone(store) as Arc<dyn AlertRepository>,
            NotificationDispatcher::disabled(),
            EventBus::new(16),
            settings.cooldown,
        ));
        AlertChecker::new(
            engine,
            Arc::clone(store) as Arc<dyn MetricRepository>,
            Arc::clone(store) as Arc<dyn ParachainRepository>,
            settings,
        )
    }

    fn acala() -> Parachain {
        Parachain::active(2000, "Acala", "ACA")
    }

    async fn put_tvl(store: &InMemoryStore, usd: f64, ts: DateTime<Utc>) {
        let reading = crate::domain::TvlReading {
            parachain_id: ParachainId::new(2000),
            total_value_locked: 0,
            total_value_locked_usd: usd,
            token_count: 1,
            price_usd: 5.5,
            timestamp: ts,
        };
        let _ = store
            .upsert_tvl(TvlSnapshot::from_reading(&reading, "Acala"))
            .await;
    }

    async fn alerts(store: &InMemoryStore) -> Vec<crate::domain::Alert> {
        let filter = AlertFilter {
            limit: 100,
            ..AlertFilter::default()
        };
        let Ok((alerts, _)) = store.list(&filter).await else {
            panic!("list should succeed");
        };
        alerts
    }

    #[tokio::test]
    async fn tvl_drop_raises_one_high_alert_then_cools_down() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        put_tvl(&store, 1_000_000.0, at(1, 10)).await;
        put_tvl(&store, 800_000.0, at(2, 10)).await;

        let Ok(report) = checker.check_metric(MetricKind::Tvl, at(2, 10)).await else {
            panic!("pass should succeed");
        };
        assert_eq!(report.raised, 1);

        let stored = alerts(&store).await;
        let Some(alert) = stored.first() else {
            panic!("alert expected");
        };
        assert_eq!(alert.alert_type, AlertType::TvlDrop);
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.title, "TVL Drop Alert: Acala");
        assert_eq!(alert.message, "TVL dropped by -20.00% in the last 24 hours");
        assert_eq!(alert.threshold, Some(-10.0));

        let later = at(2, 10) + TimeDelta::minutes(5);
        let Ok(report) = checker.check_metric(MetricKind::Tvl, later).await else {
            panic!("pass should succeed");
        };
        assert_eq!(report.raised, 0);
        assert_eq!(report.suppressed, 1);
        assert_eq!(alerts(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn zero_baseline_is_skipped() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        put_tvl(&store, 0.0, at(1, 10)).await;
        put_tvl(&store, 500.0, at(2, 10)).await;
        let Ok(report) = checker.check_metric(MetricKind::Tvl, at(2, 10)).await else {
            panic!("pass should succeed");
        };
        assert_eq!(report.skipped, 1);
        assert!(alerts(&store).await.is_empty());
    }

    #[tokio::test]
    async fn missing_baseline_is_skipped() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        put_tvl(&store, 1.0, at(2, 9)).await;
        put_tvl(&store, 2.0, at(2, 10)).await;
        let Ok(report) = checker.check_metric(MetricKind::Tvl, at(2, 10)).await else {
            panic!("pass should succeed");
        };
        assert_eq!(report.skipped, 1);
        assert_eq!(report.evaluated, 0);
    }

    #[tokio::test]
    async fn disconnected_and_stale_share_one_cooldown() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        let now = at(2, 10);

        let report = checker.check_system(false, now).await;
        assert_eq!(report.raised, 1);
        assert_eq!(report.suppressed, 1);

        let stored = alerts(&store).await;
        let Some(alert) = stored.first() else {
            panic!("alert expected");
        };
        assert_eq!(alert.title, "System Alert: Data Aggregator Disconnected");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.parachain_id, None);
    }

    #[tokio::test]
    async fn fresh_data_and_connection_raise_nothing() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        let now = at(2, 10);
        put_tvl(&store, 1.0, now - TimeDelta::minutes(10)).await;
        let report = checker.check_system(true, now).await;
        assert_eq!(report, PassReport::default());
    }

    #[tokio::test]
    async fn stale_tvl_raises_high_alert() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        let now = at(2, 10);
        put_tvl(&store, 1.0, now - TimeDelta::minutes(90)).await;
        let _ = checker.check_system(true, now).await;
        let stored = alerts(&store).await;
        assert_eq!(stored.len(), 1);
        assert!(stored.iter().all(|a| a.severity == Severity::High
            && a.title == "System Alert: No Recent TVL Data"));
    }

    #[tokio::test]
    async fn fetch_failures_are_scoped_per_parachain() {
        let store = Arc::new(InMemoryStore::with_parachains([acala()]));
        let checker = checker(&store);
        let failing = vec![FetchFailure {
            parachain_id: ParachainId::new(2000),
            parachain_name: "Acala".to_string(),
            consecutive: 3,
            last_error: "para 2000 unavailable".to_string(),
        }];
        let report = checker.check_fetch_failures(&failing, at(2, 10)).await;
        assert_eq!(report.raised, 1);
        let stored = alerts(&store).await;
        assert_eq!(
            stored.first().and_then(|a| a.parachain_id),
            Some(ParachainId::new(2000))
        );
        // A scoped issue does not hold the unscoped system cooldown.
        let system = checker.check_system(false, at(2, 10)).await;
        assert_eq!(system.raised, 1);
    }

    #[test]
    fn reports_merge() {
        let mut a = PassReport {
            raised: 1,
            ..PassReport::default()
        };
        a.merge(PassReport {
            raised: 2,
            errors: 1,
            ..PassReport::default()
        });
        assert_eq!(a.raised, 3);
        assert_eq!(a.errors, 1);
    }
}
