// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Policies converting demand, supply and time into work progress.
//!
//! Work is measured in rate-milliseconds: a fragment demanding `d` for
//! `t` ms represents `d * t` units of work.

use serde::{Deserialize, Serialize};

pub trait ScalingPolicy {
    /// Work completed in `elapsed_ms` at the given rates.
    fn finished_work(&self, demand: f64, supplied: f64, elapsed_ms: f64) -> f64;

    /// Time needed to complete `remaining_work` at the given rates.
    ///
    /// Returns `None` if the relevant rate is zero, meaning the work never
    /// completes at these rates.
    fn remaining_duration(&self, demand: f64, supplied: f64, remaining_work: f64) -> Option<f64>;

    /// Work represented by `demand` sustained over `duration_ms`.
    fn remaining_work(&self, demand: f64, duration_ms: f64) -> f64 {
        demand * duration_ms
    }
}

/// Progress is proportional to the supply received, so any shortfall
/// stretches the run time.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerfectScaling;

impl ScalingPolicy for PerfectScaling {
    fn finished_work(&self, _demand: f64, supplied: f64, elapsed_ms: f64) -> f64 {
        supplied * elapsed_ms
    }

    fn remaining_duration(&self, _demand: f64, supplied: f64, remaining_work: f64) -> Option<f64> {
        if supplied > 0.0 {
            Some(remaining_work / supplied)
        } else {
            None
        }
    }
}

/// Progress follows the demand regardless of the supply received.
///
/// This replays a trace with its recorded timing, while still exercising the
/// contention on the suppliers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelayScaling;

impl ScalingPolicy for NoDelayScaling {
    fn finished_work(&self, demand: f64, _supplied: f64, elapsed_ms: f64) -> f64 {
        demand * elapsed_ms
    }

    fn remaining_duration(&self, demand: f64, _supplied: f64, remaining_work: f64) -> Option<f64> {
        if demand > 0.0 {
            Some(remaining_work / demand)
        } else {
            None
        }
    }
}

/// Selects the [`ScalingPolicy`] of a workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingKind {
    #[default]
    Perfect,
    NoDelay,
}

impl ScalingKind {
    #[must_use]
    pub fn policy(self) -> Box<dyn ScalingPolicy> {
        match self {
            ScalingKind::Perfect => Box::new(PerfectScaling),
            ScalingKind::NoDelay => Box::new(NoDelayScaling),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_scaling() {
        let policy = PerfectScaling;
        assert_eq!(policy.remaining_work(4000.0, 600.0), 2_400_000.0);
        assert_eq!(
            policy.remaining_duration(4000.0, 2000.0, 2_400_000.0),
            Some(1200.0)
        );
        assert_eq!(policy.finished_work(4000.0, 2000.0, 100.0), 200_000.0);
    }

    #[test]
    fn perfect_scaling_without_supply_never_completes() {
        assert_eq!(PerfectScaling.remaining_duration(4000.0, 0.0, 10.0), None);
    }

    #[test]
    fn no_delay_ignores_supply() {
        let policy = NoDelayScaling;
        assert_eq!(
            policy.finished_work(4000.0, 0.0, 100.0),
            policy.finished_work(4000.0, 4000.0, 100.0)
        );
        assert_eq!(
            policy.remaining_duration(4000.0, 10.0, 2_400_000.0),
            Some(600.0)
        );
        assert_eq!(policy.remaining_duration(0.0, 10.0, 1.0), None);
    }

    #[test]
    fn selector() {
        assert_eq!(ScalingKind::default(), ScalingKind::Perfect);
        let policy = ScalingKind::NoDelay.policy();
        assert_eq!(policy.finished_work(3.0, 0.0, 2.0), 6.0);
    }
}
