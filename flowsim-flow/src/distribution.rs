// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Strategies allocating a scalar supply across a vector of demands.
//!
//! All strategies guarantee that no allocation exceeds its demand and that
//! the allocations never sum to more than the available supply. Insufficient
//! supply is not an error, it simply shows in the allocations.

use serde::{Deserialize, Serialize};

/// Allocate `supply` across `demands`.
///
/// `weights` holds one share count per demand. Strategies that do not use
/// weights ignore it.
pub trait Distribute {
    fn distribute(&self, demands: &[f64], weights: &[f64], supply: f64) -> Vec<f64>;
}

/// Water-filling allocation.
///
/// Demands are visited from the smallest to the largest. Each is offered an
/// equal share of what remains and any surplus cascades to the larger
/// demands, so small demands are satisfied in full first.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxMinFairness;

impl Distribute for MaxMinFairness {
    fn distribute(&self, demands: &[f64], _weights: &[f64], supply: f64) -> Vec<f64> {
        let n = demands.len();
        let mut allocations = vec![0.0; n];

        let mut order: Vec<(usize, f64)> = demands
            .iter()
            .map(|d| d.max(0.0))
            .enumerate()
            .collect();
        // Stable, so equal demands keep their original order.
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut remaining = supply.max(0.0);
        for (i, (index, demand)) in order.into_iter().enumerate() {
            if demand <= 0.0 {
                continue;
            }
            let fair = remaining / (n - i).max(1) as f64;
            let allocation = demand.min(fair);
            allocations[index] = allocation;
            remaining = (remaining - allocation).max(0.0);
        }
        allocations
    }
}

/// Weighted proportional allocation.
///
/// Each demand is offered `supply * weight / sum(weights)` and receives the
/// smaller of that and its demand. Shares left unused by small demands are not
/// passed on to larger ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedShare;

impl Distribute for FixedShare {
    fn distribute(&self, demands: &[f64], weights: &[f64], supply: f64) -> Vec<f64> {
        let weight_of = |i: usize| weights.get(i).copied().unwrap_or(0.0).max(0.0);
        let total_weight: f64 = (0..demands.len()).map(weight_of).sum();
        if total_weight <= 0.0 {
            return vec![0.0; demands.len()];
        }

        let supply = supply.max(0.0);
        demands
            .iter()
            .enumerate()
            .map(|(i, demand)| {
                let demand = demand.max(0.0);
                if demand == 0.0 {
                    0.0
                } else {
                    demand.min(supply * weight_of(i) / total_weight)
                }
            })
            .collect()
    }
}

/// Selects the [`Distribute`] implementation used by a distributor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategyType {
    #[default]
    MaxMinFairness,
    FixedShare,
}

impl DistributionStrategyType {
    #[must_use]
    pub fn strategy(self) -> Box<dyn Distribute> {
        match self {
            DistributionStrategyType::MaxMinFairness => Box::new(MaxMinFairness),
            DistributionStrategyType::FixedShare => Box::new(FixedShare),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn max_min(demands: &[f64], supply: f64) -> Vec<f64> {
        MaxMinFairness.distribute(demands, &[], supply)
    }

    #[test]
    fn max_min_water_fills() {
        let allocations = max_min(&[10.0, 5.0, 20.0], 20.0);
        assert_eq!(allocations, vec![7.5, 5.0, 7.5]);
        assert_relative_eq!(allocations.iter().sum::<f64>(), 20.0);
    }

    #[test]
    fn max_min_sufficient_supply() {
        let demands = [3.0, 1.0, 4.0, 1.5];
        assert_eq!(max_min(&demands, 100.0), demands.to_vec());
        assert_eq!(max_min(&demands, 9.5), demands.to_vec());
    }

    #[test]
    fn max_min_zero_demands_take_nothing() {
        let allocations = max_min(&[0.0, 10.0, 0.0, 10.0], 10.0);
        assert_eq!(allocations, vec![0.0, 5.0, 0.0, 5.0]);
    }

    #[test]
    fn max_min_bounds() {
        let demands = [7.0, 0.5, 12.0, 3.25, 3.25, 40.0, 0.0];
        for supply in [0.0, 1.0, 4.0, 10.0, 33.3, 66.0, 1000.0] {
            let allocations = max_min(&demands, supply);
            for (a, d) in allocations.iter().zip(demands.iter()) {
                assert!(*a <= *d);
                assert!(*a >= 0.0);
            }
            assert!(allocations.iter().sum::<f64>() <= supply + 1e-9);
        }
    }

    #[test]
    fn max_min_equal_demands_split_evenly() {
        assert_eq!(max_min(&[10.0, 10.0, 10.0, 10.0], 20.0), vec![5.0; 4]);
    }

    #[test]
    fn max_min_empty() {
        assert!(max_min(&[], 10.0).is_empty());
    }

    #[test]
    fn max_min_no_supply() {
        assert_eq!(max_min(&[1.0, 2.0], 0.0), vec![0.0, 0.0]);
        assert_eq!(max_min(&[1.0, 2.0], -5.0), vec![0.0, 0.0]);
    }

    #[test]
    fn fixed_share_by_weight() {
        let allocations = FixedShare.distribute(&[100.0, 100.0], &[1.0, 3.0], 40.0);
        assert_eq!(allocations, vec![10.0, 30.0]);
    }

    #[test]
    fn fixed_share_caps_at_demand() {
        let allocations = FixedShare.distribute(&[5.0, 100.0], &[1.0, 1.0], 40.0);
        assert_eq!(allocations, vec![5.0, 20.0]);
    }

    #[test]
    fn fixed_share_zero_weights() {
        let allocations = FixedShare.distribute(&[5.0, 10.0], &[0.0, 0.0], 40.0);
        assert_eq!(allocations, vec![0.0, 0.0]);
        let allocations = FixedShare.distribute(&[5.0, 10.0], &[0.0, 2.0], 40.0);
        assert_eq!(allocations, vec![0.0, 10.0]);
    }

    #[test]
    fn fixed_share_zero_demand() {
        let allocations = FixedShare.distribute(&[0.0, 50.0], &[1.0, 1.0], 40.0);
        assert_eq!(allocations, vec![0.0, 20.0]);
    }

    #[test]
    fn selector_defaults_to_max_min() {
        assert_eq!(
            DistributionStrategyType::default(),
            DistributionStrategyType::MaxMinFairness
        );
        let strategy = DistributionStrategyType::default().strategy();
        assert_eq!(strategy.distribute(&[10.0, 5.0, 20.0], &[], 20.0), vec![7.5, 5.0, 7.5]);
    }

    #[test]
    fn selector_from_yaml() {
        let kind: DistributionStrategyType = serde_yaml::from_str("fixed_share").unwrap();
        assert_eq!(kind, DistributionStrategyType::FixedShare);
        assert!(serde_yaml::from_str::<DistributionStrategyType>("round_robin").is_err());
    }
}
