//! Tick bodies of the four jobs.
//!
//! Per-parachain fetches fan out with a bounded, ordered buffer: up to
//! `fetch_concurrency` requests are in flight, and results are written in
//! parachain id order. Each write holds the `(parachain, kind)` lock so
//! jobs touching the same activity row never interleave their merges.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};

use super::failures::FailureTracker;
use super::job::{JobName, TickReport};
use crate::aggregator::DataAggregator;
use crate::config::SchedulerSettings;
use crate::domain::{
    ActivityUpdate, BlockRange, MetricKind, Parachain, SnapshotKey, SnapshotLockKey, TvlSnapshot,
    WriteLocks,
};
use crate::engine::{AlertChecker, PassReport};
use crate::error::MonitorError;
use crate::store::{MetricRepository, ParachainRepository};

/// Everything a tick body needs.
#[derive(Debug)]
pub struct JobContext {
    /// Chain access.
    pub aggregator: Arc<DataAggregator>,
    /// Snapshot storage.
    pub metrics: Arc<dyn MetricRepository>,
    /// Monitored parachains.
    pub parachains: Arc<dyn ParachainRepository>,
    /// Alert checks.
    pub checker: Arc<AlertChecker>,
    /// Per `(parachain, kind)` write serialization.
    pub locks: Arc<WriteLocks<SnapshotLockKey>>,
    /// Consecutive fetch failures.
    pub failures: Arc<FailureTracker>,
    /// Fan-out and window settings.
    pub settings: SchedulerSettings,
}

impl JobContext {
    /// Runs one tick of `job`.
    ///
    /// Data jobs reconnect first if the aggregator lost its session.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Connection`] if the reconnect fails, or the
    /// error that aborted the tick (e.g. the parachain list could not be
    /// loaded). Per-parachain failures are counted in the report instead.
    pub async fn run(&self, job: JobName) -> Result<TickReport, MonitorError> {
        if job.needs_chain() {
            let seen = self.aggregator.session();
            if !self.aggregator.is_connected() {
                tracing::warn!(job = %job, "aggregator disconnected, reconnecting before tick");
                self.aggregator.reconnect_since(seen).await?;
            }
        }
        match job {
            JobName::ParachainCollection => self.collect_parachain_data().await,
            JobName::TvlCalculation => self.calculate_tvl().await,
            JobName::ActivityMonitoring => self.monitor_activity().await,
            JobName::AlertChecking => self.check_alerts().await,
        }
    }

    /// Fetches with bounded concurrency and hands each result, in
    /// parachain order, to `write`.
    async fn fan_out<T, F, Fut, W, WFut>(
        &self,
        job: JobName,
        kind: MetricKind,
        fetch: F,
        write: W,
    ) -> Result<TickReport, MonitorError>
    where
        F: Fn(Parachain) -> Fut,
        Fut: Future<Output = (Parachain, Result<T, MonitorError>)>,
        W: Fn(Parachain, T) -> WFut,
        WFut: Future<Output = Result<(), MonitorError>>,
    {
        let parachains = self.parachains.list_active().await?;
        let mut report = TickReport::default();
        let mut results =
            stream::iter(parachains.into_iter().map(fetch)).buffered(self.settings.fetch_concurrency.max(1));

        while let Some((parachain, fetched)) = results.next().await {
            let outcome = match fetched {
                Ok(value) => {
                    let _guard = self.locks.acquire((parachain.id, kind)).await;
                    write(parachain.clone(), value).await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => {
                    report.processed += 1;
                    self.failures.record_success(parachain.id).await;
                    tracing::debug!(job = %job, parachain_id = %parachain.id, "parachain updated");
                }
                Err(e) => {
                    report.failed += 1;
                    let streak = self.failures.record_failure(&parachain, &e.to_string()).await;
                    tracing::error!(
                        job = %job,
                        parachain_id = %parachain.id,
                        consecutive_failures = streak,
                        error = %e,
                        "parachain update failed"
                    );
                }
            }
        }
        Ok(report)
    }

    async fn collect_parachain_data(&self) -> Result<TickReport, MonitorError> {
        let aggregator = &self.aggregator;
        let metrics = &self.metrics;
        self.fan_out(
            JobName::ParachainCollection,
            MetricKind::Activity,
            |parachain| async move {
                let state = aggregator.get_parachain_state(parachain.id).await;
                (parachain, state)
            },
            |parachain, state| async move {
                let now = Utc::now();
                let key = SnapshotKey::for_time(parachain.id, MetricKind::Activity, now);
                metrics
                    .upsert_activity(key, &parachain.name, ActivityUpdate::ChainState(state), now)
                    .await
            },
        )
        .await
    }

    async fn calculate_tvl(&self) -> Result<TickReport, MonitorError> {
        let aggregator = &self.aggregator;
        let metrics = &self.metrics;
        self.fan_out(
            JobName::TvlCalculation,
            MetricKind::Tvl,
            |parachain| async move {
                let reading = aggregator.calculate_tvl(parachain.id).await;
                (parachain, reading)
            },
            |parachain, reading| async move {
                metrics
                    .upsert_tvl(TvlSnapshot::from_reading(&reading, &parachain.name))
                    .await
            },
        )
        .await
    }

    async fn monitor_activity(&self) -> Result<TickReport, MonitorError> {
        let head = self.aggregator.current_block_number().await?;
        let range = BlockRange::trailing(head, self.settings.activity_block_window);
        let aggregator = &self.aggregator;
        let metrics = &self.metrics;
        self.fan_out(
            JobName::ActivityMonitoring,
            MetricKind::Activity,
            |parachain| async move {
                let summary = match aggregator.get_transfer_activity(parachain.id, range).await {
                    Ok(transfers) => aggregator.summarize_transfers(&transfers, range).await,
                    Err(e) => Err(e),
                };
                (parachain, summary)
            },
            |parachain, summary| async move {
                let now = Utc::now();
                let key = SnapshotKey::for_time(parachain.id, MetricKind::Activity, now);
                metrics
                    .upsert_activity(key, &parachain.name, ActivityUpdate::Transfers(summary), now)
                    .await
            },
        )
        .await
    }

    /// Runs the four alert passes. A pass that fails outright is logged and
    /// counted as one error; the remaining passes still run.
    async fn check_alerts(&self) -> Result<TickReport, MonitorError> {
        let now = Utc::now();
        let mut pass = PassReport::default();
        for kind in MetricKind::ALL {
            match self.checker.check_metric(kind, now).await {
                Ok(report) => pass.merge(report),
                Err(e) => {
                    pass.errors += 1;
                    tracing::error!(metric = %kind, error = %e, "metric alert pass failed");
                }
            }
        }
        pass.merge(
            self.checker
                .check_system(self.aggregator.is_connected(), now)
                .await,
        );
        let failing = self
            .failures
            .at_or_above(self.settings.failure_alert_threshold)
            .await;
        pass.merge(self.checker.check_fetch_failures(&failing, now).await);

        tracing::info!(
            raised = pass.raised,
            suppressed = pass.suppressed,
            evaluated = pass.evaluated,
            "alert checks completed"
        );
        Ok(TickReport {
            processed: pass.evaluated,
            failed: pass.errors,
            alerts: Some(pass),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod testing {
    //! Context wiring over the fake chain and the in-memory store.

    use super::*;
    use crate::aggregator::ChainRpc;
    use crate::aggregator::FixedPrice;
    use crate::aggregator::data_aggregator::testing::{FakeChain, settings};
    use crate::config::AlertSettings;
    use crate::domain::EventBus;
    use crate::engine::AlertEngine;
    use crate::notify::NotificationDispatcher;
    use crate::store::{AlertRepository, InMemoryStore};

    /// A context over Acala, Moonbeam and Astar.
    pub fn context(chain: &Arc<FakeChain>, store: &Arc<InMemoryStore>) -> JobContext {
        let aggregator = Arc::new(DataAggregator::new(
            Arc::clone(chain) as Arc<dyn ChainRpc>,
            Arc::new(FixedPrice::default()),
            settings(),
        ));
        let alert_settings = AlertSettings::default();
        let engine = Arc::new(AlertEngine::new(
            Arc::clone(store) as Arc<dyn AlertRepository>,
            NotificationDispatcher::disabled(),
            EventBus::new(16),
            alert_settings.cooldown,
        ));
        let checker = Arc::new(AlertChecker::new(
            engine,
            Arc::clone(store) as Arc<dyn MetricRepository>,
            Arc::clone(store) as Arc<dyn ParachainRepository>,
            alert_settings,
        ));
        JobContext {
            aggregator,
            metrics: Arc::clone(store) as Arc<dyn MetricRepository>,
            parachains: Arc::clone(store) as Arc<dyn ParachainRepository>,
            checker,
            locks: Arc::new(WriteLocks::new()),
            failures: Arc::new(FailureTracker::new()),
            settings: SchedulerSettings {
                activity_block_window: 20,
                ..SchedulerSettings::default()
            },
        }
    }

    pub fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_parachains([
            Parachain::active(2000, "Acala", "ACA"),
            Parachain::active(2004, "Moonbeam", "GLMR"),
            Parachain::active(2006, "Astar", "ASTR"),
        ]))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use chrono::TimeDelta;

    use super::testing::{context, store};
    use super::*;
    use crate::aggregator::data_aggregator::testing::FakeChain;
    use crate::config::AlertSettings;
    use crate::domain::{AlertFilter, AlertType, EventBus, MetricSnapshot, ParachainId};
    use crate::engine::AlertEngine;
    use crate::notify::NotificationDispatcher;
    use crate::store::AlertRepository;

    /// Parachain store whose backend is down.
    #[derive(Debug)]
    struct UnavailableParachains;

    #[async_trait]
    impl ParachainRepository for UnavailableParachains {
        async fn list_active(&self) -> Result<Vec<Parachain>, MonitorError> {
            Err(MonitorError::Persistence("pool timed out".to_string()))
        }

        async fn list_all(&self) -> Result<Vec<Parachain>, MonitorError> {
            Err(MonitorError::Persistence("pool timed out".to_string()))
        }

        async fn get(&self, _id: ParachainId) -> Result<Option<Parachain>, MonitorError> {
            Err(MonitorError::Persistence("pool timed out".to_string()))
        }

        async fn register(&self, _parachain: &Parachain) -> Result<(), MonitorError> {
            Err(MonitorError::Persistence("pool timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn tvl_ticks_within_an_hour_update_the_row_in_place() {
        let chain = Arc::new(FakeChain::with_head(100));
        let store = store();
        let ctx = context(&chain, &store);

        let Ok(first) = ctx.run(JobName::TvlCalculation).await else {
            panic!("tick should succeed");
        };
        assert_eq!(first.processed, 3);
        if let Ok(mut issuance) = chain.issuance.lock() {
            *issuance = 20_000_000_000_000;
        }
        let Ok(second) = ctx.run(JobName::TvlCalculation).await else {
            panic!("tick should succeed");
        };
        assert_eq!(second.processed, 3);

        let now = Utc::now();
        let acala = ParachainId::new(2000);
        let (start, end) = (now - TimeDelta::hours(3), now + TimeDelta::hours(1));
        let Ok(rows) = store
            .find_in_range(acala, MetricKind::Tvl, start, end)
            .await
        else {
            panic!("range query should succeed");
        };
        let buckets: HashSet<_> = rows
            .iter()
            .map(|row| SnapshotKey::for_time(acala, MetricKind::Tvl, row.timestamp()).bucket)
            .collect();
        assert!(!rows.is_empty());
        assert_eq!(buckets.len(), rows.len(), "one row per hour bucket");

        let Ok(Some(latest)) = store.find_latest(acala, MetricKind::Tvl).await else {
            panic!("latest row should exist");
        };
        // 2000 DOT at 5.5 USD.
        assert!((latest.alert_value() - 11_000.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_data_ticks_share_one_reconnect() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.failing_connects.store(1, std::sync::atomic::Ordering::SeqCst);
        chain.connect_delay_ms.store(100, std::sync::atomic::Ordering::SeqCst);
        chain.issuance_delay_ms.store(50, std::sync::atomic::Ordering::SeqCst);
        let store = store();
        let ctx = context(&chain, &store);

        let (tvl, collection) = tokio::join!(ctx.run(JobName::TvlCalculation), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            ctx.run(JobName::ParachainCollection).await
        });
        let (Ok(tvl), Ok(collection)) = (tvl, collection) else {
            panic!("both ticks should succeed");
        };
        assert_eq!((tvl.processed, tvl.failed), (3, 0));
        assert_eq!((collection.processed, collection.failed), (3, 0));
        assert_eq!(chain.connect_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(ctx.aggregator.session(), 1);
        assert_eq!(ctx.failures.count(ParachainId::new(2004)).await, 0);
    }

    #[tokio::test]
    async fn failed_metric_pass_does_not_skip_system_checks() {
        let chain = Arc::new(FakeChain::with_head(100));
        let store = store();
        let mut ctx = context(&chain, &store);
        let settings = AlertSettings::default();
        let engine = Arc::new(AlertEngine::new(
            Arc::clone(&store) as Arc<dyn AlertRepository>,
            NotificationDispatcher::disabled(),
            EventBus::new(16),
            settings.cooldown,
        ));
        ctx.checker = Arc::new(AlertChecker::new(
            engine,
            Arc::clone(&store) as Arc<dyn MetricRepository>,
            Arc::new(UnavailableParachains),
            settings,
        ));
        assert!(!ctx.aggregator.is_connected());

        let Ok(report) = ctx.run(JobName::AlertChecking).await else {
            panic!("alert tick should complete");
        };
        let Some(pass) = report.alerts else {
            panic!("alert pass report expected");
        };
        assert_eq!(pass.errors, 2);
        assert_eq!(pass.raised, 1);

        let filter = AlertFilter {
            alert_type: Some(AlertType::ParachainIssue),
            limit: 10,
            ..AlertFilter::default()
        };
        let Ok((alerts, _)) = store.list(&filter).await else {
            panic!("list should succeed");
        };
        assert_eq!(alerts.len(), 1);
        assert!(
            alerts
                .iter()
                .all(|a| a.title == "System Alert: Data Aggregator Disconnected")
        );
    }

    #[tokio::test]
    async fn one_failing_parachain_does_not_stop_the_tick() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.break_para(2004);
        let store = store();
        let ctx = context(&chain, &store);

        let Ok(report) = ctx.run(JobName::ParachainCollection).await else {
            panic!("tick should succeed");
        };
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(ctx.failures.count(ParachainId::new(2004)).await, 1);
        assert_eq!(ctx.failures.count(ParachainId::new(2000)).await, 0);

        let Ok(Some(MetricSnapshot::Activity(row))) = store
            .find_latest(ParachainId::new(2006), MetricKind::Activity)
            .await
        else {
            panic!("astar row should exist");
        };
        assert_eq!(row.lifecycle.as_deref(), Some("Parachain"));
    }

    #[tokio::test]
    async fn activity_tick_merges_into_collected_row() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.add_transfer(95, "alice", "bob", 10_000_000_000);
        chain.add_transfer(99, "bob", "carol", 10_000_000_000);
        let store = store();
        let ctx = context(&chain, &store);

        let _ = ctx.run(JobName::ParachainCollection).await;
        let Ok(report) = ctx.run(JobName::ActivityMonitoring).await else {
            panic!("tick should succeed");
        };
        assert_eq!(report.processed, 3);

        let Ok(Some(MetricSnapshot::Activity(row))) = store
            .find_latest(ParachainId::new(2000), MetricKind::Activity)
            .await
        else {
            panic!("row should exist");
        };
        assert_eq!(row.total_transactions, 2);
        assert_eq!(row.unique_active_accounts, 3);
        assert_eq!(row.blocks_produced, 20);
        assert_eq!(row.validator_count, Some(297));
    }

    #[tokio::test]
    async fn disconnected_data_tick_reconnects_first() {
        let chain = Arc::new(FakeChain::with_head(100));
        let store = store();
        let ctx = context(&chain, &store);
        assert!(!ctx.aggregator.is_connected());
        assert!(ctx.run(JobName::TvlCalculation).await.is_ok());
        assert!(ctx.aggregator.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnect_abandons_the_tick() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain
            .failing_connects
            .store(100, std::sync::atomic::Ordering::SeqCst);
        let store = store();
        let ctx = context(&chain, &store);
        assert!(matches!(
            ctx.run(JobName::TvlCalculation).await,
            Err(MonitorError::Connection(_))
        ));
        assert_eq!(store.snapshot_count(MetricKind::Tvl).await, 0);
    }

    #[tokio::test]
    async fn repeated_failures_raise_a_scoped_issue() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.break_para(2004);
        let store = store();
        let ctx = context(&chain, &store);
        // TVL first: a success for 2004 would reset its streak.
        let _ = ctx.run(JobName::TvlCalculation).await;
        for _ in 0..3 {
            let _ = ctx.run(JobName::ParachainCollection).await;
        }

        let Ok(report) = ctx.run(JobName::AlertChecking).await else {
            panic!("alert tick should succeed");
        };
        let Some(pass) = report.alerts else {
            panic!("alert pass report expected");
        };
        assert_eq!(pass.raised, 1);

        let filter = AlertFilter {
            alert_type: Some(AlertType::ParachainIssue),
            limit: 10,
            ..AlertFilter::default()
        };
        let Ok((alerts, _)) = store.list(&filter).await else {
            panic!("list should succeed");
        };
        assert_eq!(
            alerts.first().and_then(|a| a.parachain_id),
            Some(ParachainId::new(2004))
        );
    }
}
