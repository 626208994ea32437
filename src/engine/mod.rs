//! Alert evaluation and creation.
//!
//! - [`threshold`]: pure percentage-change classification.
//! - [`alert_engine`]: the cooldown gate every alert passes through.
//! - [`checks`]: the metric and system checks run by the alert job.

pub mod alert_engine;
pub mod checks;
pub mod threshold;

pub use alert_engine::{AlertEngine, RaiseOutcome};
pub use checks::{AlertChecker, FetchFailure, PassReport};
pub use threshold::{
    Detection, Direction, Evaluation, SkipReason, ThresholdSet, change_percentage,
};
