// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The behaviour of a graph vertex and the view of the graph it is given
//! while it is being updated.

use std::any::Any;
use std::rc::Rc;

use flowsim_engine::dispatcher::{Dispatcher, Timer};
use flowsim_engine::types::{SimError, SimResult, SimTime};
use flowsim_track::entity::Entity;

use crate::engine::FlowEngine;
use crate::types::{EdgeId, NodeId};

/// The behaviour of a vertex in the flow graph.
///
/// The engine calls [`on_update`](FlowNode::on_update) whenever the node has
/// been marked dirty, at most once per convergence cycle. The node reads the
/// current edge values and pushes new ones through the [`NodeContext`].
pub trait FlowNode: Any {
    /// Recompute the state of the node.
    fn on_update(&mut self, ctx: &mut NodeContext) -> SimResult;

    /// Maximum rate this node can supply on a single consumer edge.
    ///
    /// Read once when an edge is created and stored as the edge capacity.
    fn max_supply(&self) -> f64 {
        f64::INFINITY
    }

    /// Called once the node has been detached from the graph.
    fn on_remove(&mut self, _entity: &Rc<Entity>) {}
}

/// View of the graph handed to a node during [`FlowNode::on_update`].
///
/// All pushes made through the context are checked against the node that is
/// being updated: a node may only push demand on edges where it is the
/// consumer and supply on edges where it is the supplier.
pub struct NodeContext<'a> {
    engine: &'a FlowEngine,
    id: NodeId,
    entity: Rc<Entity>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(engine: &'a FlowEngine, id: NodeId, entity: Rc<Entity>) -> Self {
        Self { engine, id, entity }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn entity(&self) -> &Rc<Entity> {
        &self.entity
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.engine.dispatcher().now()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        self.engine.dispatcher()
    }

    /// Edges on which this node is the consumer, in connection order.
    #[must_use]
    pub fn supplier_edges(&self) -> Vec<EdgeId> {
        self.engine.supplier_edges(self.id).unwrap_or_default()
    }

    /// Edges on which this node is the supplier, in connection order.
    #[must_use]
    pub fn consumer_edges(&self) -> Vec<EdgeId> {
        self.engine.consumer_edges(self.id).unwrap_or_default()
    }

    /// Demand currently recorded on `edge`, or zero if it has been closed.
    #[must_use]
    pub fn demand(&self, edge: EdgeId) -> f64 {
        self.engine.edge_snapshot(edge).map_or(0.0, |e| e.demand)
    }

    /// Supply currently recorded on `edge`, or zero if it has been closed.
    #[must_use]
    pub fn supply(&self, edge: EdgeId) -> f64 {
        self.engine.edge_snapshot(edge).map_or(0.0, |e| e.supply)
    }

    #[must_use]
    pub fn capacity(&self, edge: EdgeId) -> f64 {
        self.engine.edge_snapshot(edge).map_or(0.0, |e| e.capacity)
    }

    #[must_use]
    pub fn weight(&self, edge: EdgeId) -> f64 {
        self.engine.edge_snapshot(edge).map_or(0.0, |e| e.weight)
    }

    /// Record a new demand on one of this node's supplier edges.
    pub fn push_demand(&mut self, edge: EdgeId, value: f64) -> SimResult {
        self.engine.push_demand_from(self.id, edge, value)
    }

    /// Record a new supply on one of this node's consumer edges.
    pub fn push_supply(&mut self, edge: EdgeId, value: f64) -> SimResult {
        self.engine.push_supply_from(self.id, edge, value)
    }

    /// Close one of this node's edges.
    pub fn close_edge(&mut self, edge: EdgeId) -> SimResult {
        match self.engine.edge_snapshot(edge) {
            Some(e) if e.consumer != self.id && e.supplier != self.id => Err(SimError(format!(
                "{}: cannot close {edge} which it is not attached to",
                self.entity
            ))),
            _ => self.engine.close_edge(edge),
        }
    }

    /// Mark this node dirty again after `delay_ms` and converge the graph.
    ///
    /// The returned [`Timer`] can be used to cancel the update.
    pub fn schedule_update(&self, delay_ms: SimTime) -> Timer {
        self.engine.schedule_update(self.id, delay_ms)
    }
}
