//! Job identities and their observable state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::PassReport;

/// The four periodic jobs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    /// Reads parachain state into the activity rows.
    ParachainCollection,
    /// Computes TVL snapshots.
    TvlCalculation,
    /// Scans recent blocks for transfer activity.
    ActivityMonitoring,
    /// Runs the alert checks.
    AlertChecking,
}

impl JobName {
    /// All jobs, in start order.
    pub const ALL: [Self; 4] = [
        Self::ParachainCollection,
        Self::TvlCalculation,
        Self::ActivityMonitoring,
        Self::AlertChecking,
    ];

    /// Returns the job name as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParachainCollection => "parachain-collection",
            Self::TvlCalculation => "tvl-calculation",
            Self::ActivityMonitoring => "activity-monitoring",
            Self::AlertChecking => "alert-checking",
        }
    }

    /// Returns `true` for jobs that read from the chain.
    #[must_use]
    pub const fn needs_chain(self) -> bool {
        !matches!(self, Self::AlertChecking)
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| format!("unknown job: {s}"))
    }
}

/// Lifecycle phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Not scheduled.
    Stopped,
    /// Waiting for its next tick.
    Scheduled,
    /// A tick body is executing.
    Running,
}

/// Work done by one successful tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct TickReport {
    /// Parachains processed successfully.
    pub processed: u32,
    /// Parachains whose fetch or write failed.
    pub failed: u32,
    /// Alert pass counters (alert job only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<PassReport>,
}

/// How the most recent tick ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The tick ran to completion.
    Completed(TickReport),
    /// The tick failed as a whole.
    Failed {
        /// Error message.
        error: String,
    },
    /// The tick exceeded its time budget and was cancelled.
    TimedOut {
        /// Budget in seconds.
        after_secs: u64,
    },
}

/// What a manual trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    /// A tick body was started.
    Started,
    /// The previous tick was still running; nothing was started.
    Skipped,
}

/// Observable state of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct JobState {
    /// Job identity.
    pub name: JobName,
    /// Tick period in seconds.
    pub interval_secs: u64,
    /// Current phase.
    pub phase: JobPhase,
    /// When the last tick body started.
    pub last_started_at: Option<DateTime<Utc>>,
    /// When the last tick body finished.
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Outcome of the last finished tick.
    pub last_outcome: Option<JobOutcome>,
    /// Tick bodies started.
    pub runs: u64,
    /// Ticks skipped because the previous body was still running.
    pub skipped_ticks: u64,
}

impl JobState {
    /// A stopped job with no history.
    #[must_use]
    pub const fn new(name: JobName, interval_secs: u64) -> Self {
        Self {
            name,
            interval_secs,
            phase: JobPhase::Stopped,
            last_started_at: None,
            last_finished_at: None,
            last_outcome: None,
            runs: 0,
            skipped_ticks: 0,
        }
    }
}
