// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Fan one supply source out across several consumers.
//!
//! A distributor has at most one upstream supplier edge and any number of
//! downstream consumer edges. Whenever it is updated it:
//!  - pushes the total downstream demand upstream,
//!  - runs its [`Distribute`] strategy over the downstream demands and the
//!    supply currently available upstream,
//!  - optionally passes each allocation through a [`SupplyAdjust`] transform,
//!  - pushes each allocation to its consumer.

use flowsim_engine::sim_error;
use flowsim_engine::types::SimResult;
use flowsim_track::trace;

use crate::distribution::{Distribute, DistributionStrategyType};
use crate::node::{FlowNode, NodeContext};

/// Post-processing applied to each allocation of a distributor.
pub trait SupplyAdjust {
    /// Return the supply to grant for an `allocation` when the distributor
    /// has `consumer_count` consumers.
    fn adjust(&self, allocation: f64, consumer_count: usize) -> f64;
}

pub struct FlowDistributor {
    strategy: Box<dyn Distribute>,
    overhead: Option<Box<dyn SupplyAdjust>>,
    max_supply: f64,

    demanded: f64,
    available: f64,
    supplied: f64,
}

impl FlowDistributor {
    #[must_use]
    pub fn new(kind: DistributionStrategyType) -> Self {
        Self::with_strategy(kind.strategy())
    }

    #[must_use]
    pub fn with_strategy(strategy: Box<dyn Distribute>) -> Self {
        Self {
            strategy,
            overhead: None,
            max_supply: f64::INFINITY,
            demanded: 0.0,
            available: 0.0,
            supplied: 0.0,
        }
    }

    #[must_use]
    pub fn with_overhead(mut self, overhead: Box<dyn SupplyAdjust>) -> Self {
        self.overhead = Some(overhead);
        self
    }

    /// Bound the capacity of the consumer edges created after this point.
    #[must_use]
    pub fn with_max_supply(mut self, max_supply: f64) -> Self {
        self.max_supply = max_supply;
        self
    }

    /// Total demand of the consumers at the last update.
    #[must_use]
    pub fn demanded(&self) -> f64 {
        self.demanded
    }

    /// Supply available from upstream at the last update.
    #[must_use]
    pub fn available(&self) -> f64 {
        self.available
    }

    /// Total supply granted to the consumers at the last update.
    #[must_use]
    pub fn supplied(&self) -> f64 {
        self.supplied
    }
}

impl FlowNode for FlowDistributor {
    fn on_update(&mut self, ctx: &mut NodeContext) -> SimResult {
        let consumers = ctx.consumer_edges();
        let demands: Vec<f64> = consumers.iter().map(|e| ctx.demand(*e)).collect();
        let weights: Vec<f64> = consumers.iter().map(|e| ctx.weight(*e)).collect();
        let demanded: f64 = demands.iter().sum();

        let suppliers = ctx.supplier_edges();
        if suppliers.len() > 1 {
            return sim_error!(format!(
                "{}: a distributor takes a single supplier, found {}",
                ctx.entity(),
                suppliers.len()
            ));
        }
        let available = match suppliers.first() {
            Some(upstream) => {
                ctx.push_demand(*upstream, demanded)?;
                ctx.supply(*upstream)
            }
            None => 0.0,
        };

        let allocations = self.strategy.distribute(&demands, &weights, available);
        let consumer_count = consumers.len();
        let mut supplied = 0.0;
        for (edge, allocation) in consumers.iter().zip(allocations) {
            let mut supply = match &self.overhead {
                Some(overhead) => overhead.adjust(allocation, consumer_count).min(allocation),
                None => allocation,
            };
            supply = supply.min(ctx.capacity(*edge)).max(0.0);
            ctx.push_supply(*edge, supply)?;
            supplied += supply;
        }

        trace!(ctx.entity() ; "demanded {demanded}, available {available}, supplied {supplied}");
        self.demanded = demanded;
        self.available = available;
        self.supplied = supplied;
        Ok(())
    }

    fn max_supply(&self) -> f64 {
        self.max_supply
    }
}
