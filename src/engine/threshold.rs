//! Percentage-change classification.
//!
//! Pure functions with no I/O: given a current and a baseline value,
//! decide whether a drop or spike threshold was crossed and how severe it
//! is. Drop is evaluated first, so it wins if both conditions hold.

use serde::Serialize;

use crate::domain::Severity;

/// Percentage thresholds for one metric.
///
/// `drop` is negative and `spike` positive; both are inclusive.
/// The critical bounds are magnitudes compared strictly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ThresholdSet {
    /// Change at or below this is a drop (e.g. `-10.0`).
    pub drop: f64,
    /// Change at or above this is a spike (e.g. `20.0`).
    pub spike: f64,
    /// Drops with magnitude above this are critical.
    pub critical_drop: f64,
    /// Spikes above this are critical.
    pub critical_spike: f64,
}

impl ThresholdSet {
    /// Defaults for total value locked.
    pub const TVL: Self = Self {
        drop: -10.0,
        spike: 20.0,
        critical_drop: 20.0,
        critical_spike: 50.0,
    };

    /// Defaults for transaction counts.
    pub const ACTIVITY: Self = Self {
        drop: -15.0,
        spike: 50.0,
        critical_drop: 30.0,
        critical_spike: 100.0,
    };

    /// Classifies the change from `previous` to `current`.
    #[must_use]
    pub fn evaluate(&self, current: f64, previous: f64) -> Evaluation {
        let Some(change) = change_percentage(current, previous) else {
            return Evaluation::Skipped(if previous == 0.0 {
                SkipReason::ZeroBaseline
            } else {
                SkipReason::NonFinite
            });
        };

        if change <= self.drop {
            let severity = if change.abs() > self.critical_drop {
                Severity::Critical
            } else {
                Severity::High
            };
            return Evaluation::Triggered(Detection {
                direction: Direction::Drop,
                severity,
                change_percentage: change,
                threshold: self.drop,
            });
        }

        if change >= self.spike {
            let severity = if change > self.critical_spike {
                Severity::Critical
            } else {
                Severity::Medium
            };
            return Evaluation::Triggered(Detection {
                direction: Direction::Spike,
                severity,
                change_percentage: change,
                threshold: self.spike,
            });
        }

        Evaluation::NoChange { change_percentage: change }
    }
}

/// `(current - previous) / previous * 100`, or `None` when the baseline is
/// zero or either input is not finite.
#[must_use]
pub fn change_percentage(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }
    let change = (current - previous) / previous * 100.0;
    change.is_finite().then_some(change)
}

/// Which way the metric moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Metric fell.
    Drop,
    /// Metric rose.
    Spike,
}

/// A crossed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Drop or spike.
    pub direction: Direction,
    /// Derived severity.
    pub severity: Severity,
    /// Computed change.
    pub change_percentage: f64,
    /// Threshold that was crossed.
    pub threshold: f64,
}

/// Why a comparison was not evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Baseline was zero.
    ZeroBaseline,
    /// An input was NaN or infinite.
    NonFinite,
}

/// Result of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Evaluation {
    /// Not evaluated this tick.
    Skipped(SkipReason),
    /// Evaluated, within thresholds.
    NoChange {
        /// Computed change.
        change_percentage: f64,
    },
    /// A threshold was crossed.
    Triggered(Detection),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn triggered(eval: Evaluation) -> Detection {
        let Evaluation::Triggered(d) = eval else {
            panic!("expected a detection, got {eval:?}");
        };
        d
    }

    #[test]
    fn tvl_drop_of_exactly_twenty_is_high() {
        let d = triggered(ThresholdSet::TVL.evaluate(80.0, 100.0));
        assert_eq!(d.direction, Direction::Drop);
        assert_eq!(d.severity, Severity::High);
        assert!((d.change_percentage + 20.0).abs() < 1e-9);
    }

    #[test]
    fn tvl_drop_of_thirty_is_critical() {
        let d = triggered(ThresholdSet::TVL.evaluate(70.0, 100.0));
        assert_eq!(d.direction, Direction::Drop);
        assert_eq!(d.severity, Severity::Critical);
    }

    #[test]
    fn activity_spike_of_sixty_is_medium() {
        let d = triggered(ThresholdSet::ACTIVITY.evaluate(160.0, 100.0));
        assert_eq!(d.direction, Direction::Spike);
        assert_eq!(d.severity, Severity::Medium);
        assert_eq!(d.threshold, 50.0);
    }

    #[test]
    fn activity_spike_above_hundred_is_critical() {
        let d = triggered(ThresholdSet::ACTIVITY.evaluate(201.0, 100.0));
        assert_eq!(d.severity, Severity::Critical);
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert!(matches!(
            ThresholdSet::TVL.evaluate(90.0, 100.0),
            Evaluation::Triggered(Detection { direction: Direction::Drop, .. })
        ));
        assert!(matches!(
            ThresholdSet::TVL.evaluate(120.0, 100.0),
            Evaluation::Triggered(Detection { direction: Direction::Spike, .. })
        ));
        assert!(matches!(
            ThresholdSet::TVL.evaluate(95.0, 100.0),
            Evaluation::NoChange { .. }
        ));
    }

    #[test]
    fn zero_baseline_is_skipped() {
        assert_eq!(
            ThresholdSet::TVL.evaluate(50.0, 0.0),
            Evaluation::Skipped(SkipReason::ZeroBaseline)
        );
        assert_eq!(change_percentage(1.0, 0.0), None);
    }

    #[test]
    fn non_finite_inputs_are_skipped() {
        assert_eq!(
            ThresholdSet::TVL.evaluate(f64::NAN, 100.0),
            Evaluation::Skipped(SkipReason::NonFinite)
        );
    }

    #[test]
    fn overlapping_thresholds_prefer_drop() {
        let odd = ThresholdSet {
            drop: 10.0,
            spike: 5.0,
            critical_drop: 50.0,
            critical_spike: 50.0,
        };
        let d = triggered(odd.evaluate(107.0, 100.0));
        assert_eq!(d.direction, Direction::Drop);
    }

    proptest! {
        #[test]
        fn change_matches_formula(current in -1e9_f64..1e9, previous in -1e9_f64..1e9) {
            prop_assume!(previous != 0.0);
            let Some(change) = change_percentage(current, previous) else {
                panic!("finite inputs with non-zero baseline must produce a change");
            };
            prop_assert_eq!(change, (current - previous) / previous * 100.0);
        }

        #[test]
        fn sign_decides_direction(current in 0.0_f64..1e9, previous in 1e-3_f64..1e9) {
            match ThresholdSet::TVL.evaluate(current, previous) {
                Evaluation::Triggered(d) => {
                    match d.direction {
                        Direction::Drop => prop_assert!(d.change_percentage < 0.0),
                        Direction::Spike => prop_assert!(d.change_percentage > 0.0),
                    }
                }
                Evaluation::NoChange { change_percentage } => {
                    prop_assert!(change_percentage > -10.0 && change_percentage < 20.0);
                }
                Evaluation::Skipped(reason) => {
                    prop_assert!(false, "unexpected skip: {:?}", reason);
                }
            }
        }

        #[test]
        fn severity_is_monotonic_in_magnitude(a in 0.0_f64..100.0, b in 0.0_f64..100.0) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let ev_small = ThresholdSet::TVL.evaluate(100.0 - small, 100.0);
            let ev_large = ThresholdSet::TVL.evaluate(100.0 - large, 100.0);
            if let (Evaluation::Triggered(s), Evaluation::Triggered(l)) = (ev_small, ev_large) {
                prop_assert!(s.severity <= l.severity);
            }
        }
    }
}
