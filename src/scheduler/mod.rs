//! Periodic collection and alert jobs.

pub mod failures;
pub mod job;
pub mod runner;
pub mod tasks;

pub use failures::FailureTracker;
pub use job::{JobName, JobOutcome, JobPhase, JobState, RunTrigger, TickReport};
pub use runner::{Scheduler, SchedulerStatus};
pub use tasks::JobContext;
