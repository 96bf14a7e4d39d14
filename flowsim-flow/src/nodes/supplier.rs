// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A fixed-capacity source, such as the CPU of a host.

use flowsim_engine::types::SimResult;

use crate::distribution::{Distribute, MaxMinFairness};
use crate::node::{FlowNode, NodeContext};

/// Shares its capacity across its consumers with [`MaxMinFairness`].
///
/// The capacity can be changed while the simulation runs. Edges keep the
/// capacity they were created with, so the supply on an edge is also bounded
/// by that.
pub struct SimpleSupplier {
    capacity: f64,
    demanded: f64,
    supplied: f64,
}

impl SimpleSupplier {
    #[must_use]
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity: capacity.max(0.0),
            demanded: 0.0,
            supplied: 0.0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: f64) {
        self.capacity = capacity.max(0.0);
    }

    #[must_use]
    pub fn demanded(&self) -> f64 {
        self.demanded
    }

    #[must_use]
    pub fn supplied(&self) -> f64 {
        self.supplied
    }

    /// Fraction of the capacity currently supplied, between 0 and 1.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity > 0.0 {
            (self.supplied / self.capacity).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl FlowNode for SimpleSupplier {
    fn on_update(&mut self, ctx: &mut NodeContext) -> SimResult {
        let consumers = ctx.consumer_edges();
        let demands: Vec<f64> = consumers.iter().map(|e| ctx.demand(*e)).collect();
        let allocations = MaxMinFairness.distribute(&demands, &[], self.capacity);

        let mut supplied = 0.0;
        for (edge, allocation) in consumers.iter().zip(allocations) {
            let supply = allocation.min(ctx.capacity(*edge));
            ctx.push_supply(*edge, supply)?;
            supplied += supply;
        }
        self.demanded = demands.iter().sum();
        self.supplied = supplied;
        Ok(())
    }

    fn max_supply(&self) -> f64 {
        self.capacity
    }
}
