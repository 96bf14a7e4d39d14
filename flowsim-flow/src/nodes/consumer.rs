// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A consumer with a constant, settable demand.

use flowsim_engine::types::SimResult;

use crate::node::{FlowNode, NodeContext};

/// Pushes its demand on every supplier edge and records the total supply it
/// receives.
pub struct ConstantConsumer {
    demand: f64,
    supply: f64,
}

impl ConstantConsumer {
    #[must_use]
    pub fn new(demand: f64) -> Self {
        Self {
            demand: demand.max(0.0),
            supply: 0.0,
        }
    }

    #[must_use]
    pub fn demand(&self) -> f64 {
        self.demand
    }

    pub fn set_demand(&mut self, demand: f64) {
        self.demand = demand.max(0.0);
    }

    /// Total supply seen at the last update.
    #[must_use]
    pub fn supply(&self) -> f64 {
        self.supply
    }
}

impl FlowNode for ConstantConsumer {
    fn on_update(&mut self, ctx: &mut NodeContext) -> SimResult {
        let mut supply = 0.0;
        for edge in ctx.supplier_edges() {
            ctx.push_demand(edge, self.demand)?;
            supply += ctx.supply(edge);
        }
        self.supply = supply;
        Ok(())
    }
}
