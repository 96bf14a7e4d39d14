// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A directed link between one consumer and one supplier.

use std::rc::Rc;

use flowsim_track::entity::Entity;

use crate::types::{EdgeId, NodeId};

/// Default share count of an edge.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A live edge of the flow graph.
///
/// The edge only holds values. Pushing values and notifying the endpoints is
/// done through the [`FlowEngine`](crate::engine::FlowEngine) so that the
/// graph can enforce which endpoint may push what.
pub struct FlowEdge {
    pub entity: Rc<Entity>,
    pub consumer: NodeId,
    pub supplier: NodeId,

    /// Rate requested by the consumer.
    pub demand: f64,

    /// Rate granted by the supplier. Never above `capacity`.
    pub supply: f64,

    /// Supplier's declared maximum at the time the edge was created.
    pub capacity: f64,

    /// Share count used by weighted distribution strategies.
    pub weight: f64,
}

impl FlowEdge {
    #[must_use]
    pub fn snapshot(&self, id: EdgeId) -> EdgeSnapshot {
        EdgeSnapshot {
            id,
            consumer: self.consumer,
            supplier: self.supplier,
            demand: self.demand,
            supply: self.supply,
            capacity: self.capacity,
            weight: self.weight,
        }
    }
}

/// Plain copy of the values held by an edge.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub consumer: NodeId,
    pub supplier: NodeId,
    pub demand: f64,
    pub supply: f64,
    pub capacity: f64,
    pub weight: f64,
}
