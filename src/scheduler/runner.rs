//! The job scheduler.
//!
//! Each job runs on its own tokio interval. A tick spawns the job's body
//! as a separate task guarded by a per-job busy flag: if the previous
//! body is still running the tick is skipped and logged. Bodies are
//! bounded by a timeout and tracked so [`Scheduler::stop`] can wait for
//! them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

use super::job::{JobName, JobOutcome, JobPhase, JobState, RunTrigger};
use super::tasks::JobContext;
use crate::aggregator::ConnectionState;
use crate::config::SchedulerSettings;
use crate::error::MonitorError;

/// Snapshot of the scheduler for the status endpoint.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SchedulerStatus {
    /// Whether the job loops are running.
    pub running: bool,
    /// Aggregator session state.
    pub connection: ConnectionState,
    /// Per-job state, in start order.
    pub jobs: Vec<JobState>,
}

#[derive(Debug)]
struct JobSlot {
    name: JobName,
    interval: Duration,
    timeout: Duration,
    busy: AtomicBool,
    state: RwLock<JobState>,
}

/// Clears the busy flag when the body finishes, is cancelled or panics.
struct BusyGuard(Arc<JobSlot>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct Inner {
    ctx: Arc<JobContext>,
    slots: BTreeMap<JobName, Arc<JobSlot>>,
    running: AtomicBool,
    loops: Mutex<Vec<JoinHandle<()>>>,
    bodies: Mutex<JoinSet<()>>,
}

/// Drives the four periodic jobs.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a stopped scheduler.
    ///
    /// Intervals shorter than one second are raised to one second. The
    /// per-tick timeout defaults to the job's interval.
    #[must_use]
    pub fn new(ctx: JobContext, settings: &SchedulerSettings) -> Self {
        let slots = JobName::ALL
            .into_iter()
            .map(|name| {
                let interval = match name {
                    JobName::ParachainCollection => settings.collection_interval,
                    JobName::TvlCalculation => settings.tvl_interval,
                    JobName::ActivityMonitoring => settings.activity_interval,
                    JobName::AlertChecking => settings.alert_interval,
                }
                .max(Duration::from_secs(1));
                let slot = JobSlot {
                    name,
                    interval,
                    timeout: settings.tick_timeout.unwrap_or(interval),
                    busy: AtomicBool::new(false),
                    state: RwLock::new(JobState::new(name, interval.as_secs())),
                };
                (name, Arc::new(slot))
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                ctx: Arc::new(ctx),
                slots,
                running: AtomicBool::new(false),
                loops: Mutex::new(Vec::new()),
                bodies: Mutex::new(JoinSet::new()),
            }),
        }
    }

    /// Connects the aggregator and starts every job loop. The first tick
    /// of each job fires one interval after start.
    ///
    /// Calling it on a running scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Initialization`] if the aggregator cannot
    /// connect; no job is started in that case.
    pub async fn initialize(&self) -> Result<(), MonitorError> {
        if self.inner.running.load(Ordering::Acquire) {
            return Ok(());
        }
        self.inner
            .ctx
            .aggregator
            .connect()
            .await
            .map_err(|e| MonitorError::Initialization(e.to_string()))?;

        let mut loops = self.inner.loops.lock().await;
        for slot in self.inner.slots.values() {
            slot.state.write().await.phase = JobPhase::Scheduled;
            tracing::info!(job = %slot.name, interval_secs = slot.interval.as_secs(), "job scheduled");
            let inner = Arc::clone(&self.inner);
            let slot = Arc::clone(slot);
            loops.push(tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval_at(Instant::now() + slot.interval, slot.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    Inner::trigger(&inner, &slot).await;
                }
            }));
        }
        self.inner.running.store(true, Ordering::Release);
        tracing::info!(jobs = loops.len(), "scheduler started");
        Ok(())
    }

    /// Runs one tick of `job` now, with the same overlap guard as the
    /// timed ticks.
    pub async fn run_job_now(&self, job: JobName) -> RunTrigger {
        match self.inner.slots.get(&job) {
            Some(slot) => Inner::trigger(&self.inner, slot).await,
            None => RunTrigger::Skipped,
        }
    }

    /// Current state of the scheduler and its jobs.
    pub async fn status(&self) -> SchedulerStatus {
        let mut jobs = Vec::with_capacity(self.inner.slots.len());
        for slot in self.inner.slots.values() {
            jobs.push(slot.state.read().await.clone());
        }
        SchedulerStatus {
            running: self.inner.running.load(Ordering::Acquire),
            connection: self.connection_state(),
            jobs,
        }
    }

    /// Session state of the aggregator the jobs use.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.ctx.aggregator.connection_state()
    }

    /// Returns `true` while the job loops are running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Stops the job loops, waits for running tick bodies and disconnects
    /// the aggregator. Safe to call more than once and after a failed
    /// [`initialize`](Self::initialize).
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        for handle in self.inner.loops.lock().await.drain(..) {
            handle.abort();
        }

        let mut bodies = std::mem::take(&mut *self.inner.bodies.lock().await);
        while let Some(joined) = bodies.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "tick body ended abnormally");
            }
        }

        for slot in self.inner.slots.values() {
            slot.state.write().await.phase = JobPhase::Stopped;
        }
        self.inner.ctx.aggregator.disconnect().await;
        tracing::info!("scheduler stopped");
    }
}

impl Inner {
    async fn trigger(inner: &Arc<Self>, slot: &Arc<JobSlot>) -> RunTrigger {
        if slot
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            slot.state.write().await.skipped_ticks += 1;
            tracing::warn!(job = %slot.name, "previous run still in progress, skipping tick");
            return RunTrigger::Skipped;
        }

        {
            let mut state = slot.state.write().await;
            state.phase = JobPhase::Running;
            state.last_started_at = Some(Utc::now());
            state.runs += 1;
        }

        let guard = BusyGuard(Arc::clone(slot));
        let inner_for_body = Arc::clone(inner);
        let slot_for_body = Arc::clone(slot);
        let mut bodies = inner.bodies.lock().await;
        while bodies.try_join_next().is_some() {}
        bodies.spawn(async move {
            let _guard = guard;
            inner_for_body.run_body(&slot_for_body).await;
        });
        RunTrigger::Started
    }

    async fn run_body(&self, slot: &JobSlot) {
        let job = slot.name;
        tracing::info!(job = %job, "job started");
        let started = Instant::now();

        let outcome = match tokio::time::timeout(slot.timeout, self.ctx.run(job)).await {
            Ok(Ok(report)) => {
                tracing::info!(
                    job = %job,
                    processed = report.processed,
                    failed = report.failed,
                    elapsed_ms = started.elapsed().as_millis(),
                    "job completed"
                );
                JobOutcome::Completed(report)
            }
            Ok(Err(e)) => {
                tracing::error!(job = %job, error = %e, "job failed");
                JobOutcome::Failed {
                    error: e.to_string(),
                }
            }
            Err(_) => {
                tracing::error!(job = %job, timeout_secs = slot.timeout.as_secs(), "job timed out");
                JobOutcome::TimedOut {
                    after_secs: slot.timeout.as_secs(),
                }
            }
        };

        let mut state = slot.state.write().await;
        state.last_finished_at = Some(Utc::now());
        state.last_outcome = Some(outcome);
        state.phase = if self.running.load(Ordering::Acquire) {
            JobPhase::Scheduled
        } else {
            JobPhase::Stopped
        };
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use super::*;
    use crate::aggregator::data_aggregator::testing::FakeChain;
    use crate::domain::MetricKind;
    use crate::scheduler::tasks::testing::{context, store};

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            tick_timeout: Some(Duration::from_secs(30)),
            ..SchedulerSettings::default()
        }
    }

    async fn wait_idle(scheduler: &Scheduler, job: JobName) -> JobState {
        loop {
            let status = scheduler.status().await;
            if let Some(state) = status.jobs.into_iter().find(|j| j.name == job)
                && state.phase != JobPhase::Running
            {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_initialize_starts_nothing() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.failing_connects.store(100, AtomicOrdering::SeqCst);
        let store = store();
        let scheduler = Scheduler::new(context(&chain, &store), &settings());

        assert!(matches!(
            scheduler.initialize().await,
            Err(MonitorError::Initialization(_))
        ));
        let status = scheduler.status().await;
        assert!(!status.running);
        assert!(status.jobs.iter().all(|j| j.phase == JobPhase::Stopped));

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_tick_is_skipped() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.issuance_delay_ms.store(5_000, AtomicOrdering::SeqCst);
        let store = store();
        let scheduler = Scheduler::new(context(&chain, &store), &settings());

        assert_eq!(scheduler.run_job_now(JobName::TvlCalculation).await, RunTrigger::Started);
        assert_eq!(scheduler.run_job_now(JobName::TvlCalculation).await, RunTrigger::Skipped);

        let state = wait_idle(&scheduler, JobName::TvlCalculation).await;
        assert_eq!(state.runs, 1);
        assert_eq!(state.skipped_ticks, 1);
        assert!(matches!(state.last_outcome, Some(JobOutcome::Completed(_))));

        assert_eq!(scheduler.run_job_now(JobName::TvlCalculation).await, RunTrigger::Started);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tick_times_out_and_frees_the_job() {
        let chain = Arc::new(FakeChain::with_head(100));
        chain.issuance_delay_ms.store(60_000, AtomicOrdering::SeqCst);
        let store = store();
        let scheduler = Scheduler::new(
            context(&chain, &store),
            &SchedulerSettings {
                tick_timeout: Some(Duration::from_secs(1)),
                ..SchedulerSettings::default()
            },
        );

        assert_eq!(scheduler.run_job_now(JobName::TvlCalculation).await, RunTrigger::Started);
        let state = wait_idle(&scheduler, JobName::TvlCalculation).await;
        assert_eq!(state.last_outcome, Some(JobOutcome::TimedOut { after_secs: 1 }));
        assert_eq!(store.snapshot_count(MetricKind::Tvl).await, 0);

        chain.issuance_delay_ms.store(0, AtomicOrdering::SeqCst);
        assert_eq!(scheduler.run_job_now(JobName::TvlCalculation).await, RunTrigger::Started);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_tick_after_one_interval() {
        let chain = Arc::new(FakeChain::with_head(100));
        let store = store();
        let scheduler = Scheduler::new(context(&chain, &store), &settings());
        assert!(scheduler.initialize().await.is_ok());
        assert!(scheduler.initialize().await.is_ok());
        assert_eq!(store.snapshot_count(MetricKind::Tvl).await, 0);

        tokio::time::sleep(Duration::from_secs(601)).await;
        let state = wait_idle(&scheduler, JobName::TvlCalculation).await;
        assert_eq!(state.runs, 1);
        assert_eq!(state.phase, JobPhase::Scheduled);
        assert_eq!(store.snapshot_count(MetricKind::Tvl).await, 3);

        scheduler.stop().await;
        let status = scheduler.status().await;
        assert!(!status.running);
        assert_eq!(status.connection, ConnectionState::Disconnected);
        assert!(status.jobs.iter().all(|j| j.phase == JobPhase::Stopped));
    }
}
