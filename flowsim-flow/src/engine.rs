// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The flow engine owns the graph arena and drives it to convergence.
//!
//! Nodes and edges live in arenas indexed by [`NodeId`] and [`EdgeId`]. Slots
//! are never reused: removing a node or closing an edge leaves an empty slot
//! behind so that stale handles are detected rather than aliased.
//!
//! Every push records the value on the edge and marks the node at the other
//! end dirty. Marking a node that is already dirty does nothing, so several
//! pushes towards the same node before it runs result in a single update.
//!
//! [`FlowEngine::converge`] drains the dirty queue in cycles. Each cycle takes
//! the nodes that are dirty when it starts and updates each of them once. A
//! node dirtied after it has run in a cycle is updated again in the next
//! cycle. The number of cycles is bounded so that a graph which never settles
//! is reported as an error rather than looping forever.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use flowsim_engine::dispatcher::{Dispatcher, Timer};
use flowsim_engine::sim_error;
use flowsim_engine::types::{SimError, SimResult, SimTime};
use flowsim_track::entity::Entity;
use flowsim_track::{connect, debug, trace, value};

use crate::edge::{DEFAULT_WEIGHT, EdgeSnapshot, FlowEdge};
use crate::node::{FlowNode, NodeContext};
use crate::types::{EdgeId, NodeId, within_capacity};

/// Default bound on the number of cycles of a single convergence.
pub const DEFAULT_MAX_CYCLES: usize = 10_000;

struct NodeSlot {
    entity: Rc<Entity>,

    /// Taken out of the slot while the node is being updated.
    behaviour: Option<Box<dyn FlowNode>>,

    /// Edges on which this node is the consumer.
    supplier_edges: Vec<EdgeId>,

    /// Edges on which this node is the supplier.
    consumer_edges: Vec<EdgeId>,

    pending: bool,
    update_count: u64,
}

#[derive(Default)]
struct FlowGraph {
    nodes: Vec<Option<NodeSlot>>,
    edges: Vec<Option<FlowEdge>>,
    dirty: VecDeque<NodeId>,
}

impl FlowGraph {
    fn slot(&self, id: NodeId) -> Option<&NodeSlot> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn edge(&self, id: EdgeId) -> Option<&FlowEdge> {
        self.edges.get(id.0).and_then(Option::as_ref)
    }

    fn edge_mut(&mut self, id: EdgeId) -> Option<&mut FlowEdge> {
        self.edges.get_mut(id.0).and_then(Option::as_mut)
    }

    fn invalidate(&mut self, id: NodeId) {
        if let Some(slot) = self.slot_mut(id) {
            if !slot.pending {
                slot.pending = true;
                self.dirty.push_back(id);
            }
        }
    }
}

struct FlowState {
    entity: Rc<Entity>,
    dispatcher: Dispatcher,
    graph: RefCell<FlowGraph>,
    converging: Cell<bool>,
    max_cycles: Cell<usize>,
}

/// Handle to a flow graph.
///
/// This is a thin-wrapper (using [`Rc`]) around the graph state, so that it
/// can be cloned and captured by dispatcher callbacks.
#[derive(Clone)]
pub struct FlowEngine {
    state: Rc<FlowState>,
}

/// Plain copy of the state of a node and its edges.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub update_count: u64,

    /// Edges on which the node is the consumer.
    pub supplier_edges: Vec<EdgeSnapshot>,

    /// Edges on which the node is the supplier.
    pub consumer_edges: Vec<EdgeSnapshot>,
}

impl NodeSnapshot {
    /// Total demand this node requests from its suppliers.
    #[must_use]
    pub fn demand(&self) -> f64 {
        self.supplier_edges.iter().map(|e| e.demand).sum()
    }

    /// Total supply this node receives from its suppliers.
    #[must_use]
    pub fn supply(&self) -> f64 {
        self.supplier_edges.iter().map(|e| e.supply).sum()
    }

    /// Total demand placed on this node by its consumers.
    #[must_use]
    pub fn demanded(&self) -> f64 {
        self.consumer_edges.iter().map(|e| e.demand).sum()
    }

    /// Total supply this node grants to its consumers.
    #[must_use]
    pub fn supplied(&self) -> f64 {
        self.consumer_edges.iter().map(|e| e.supply).sum()
    }
}

impl FlowEngine {
    pub fn new(parent: &Rc<Entity>, dispatcher: Dispatcher) -> Self {
        Self {
            state: Rc::new(FlowState {
                entity: Rc::new(Entity::new(parent, "flow")),
                dispatcher,
                graph: RefCell::new(FlowGraph::default()),
                converging: Cell::new(false),
                max_cycles: Cell::new(DEFAULT_MAX_CYCLES),
            }),
        }
    }

    #[must_use]
    pub fn entity(&self) -> &Rc<Entity> {
        &self.state.entity
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.state.dispatcher
    }

    /// Change the bound on the number of cycles of a single convergence.
    pub fn set_max_cycles(&self, max_cycles: usize) {
        self.state.max_cycles.set(max_cycles.max(1));
    }

    /// Add a node to the graph. The new node starts dirty.
    pub fn add_node<N: FlowNode>(&self, parent: &Rc<Entity>, name: &str, node: N) -> NodeId {
        let entity = Rc::new(Entity::new(parent, name));
        let mut graph = self.state.graph.borrow_mut();
        let id = NodeId(graph.nodes.len());
        debug!(self.state.entity ; "add {id} ({entity})");
        graph.nodes.push(Some(NodeSlot {
            entity,
            behaviour: Some(Box::new(node)),
            supplier_edges: Vec::new(),
            consumer_edges: Vec::new(),
            pending: false,
            update_count: 0,
        }));
        graph.invalidate(id);
        id
    }

    /// Whether `id` refers to a node that has not been removed.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.state.graph.borrow().slot(id).is_some()
    }

    /// Connect `consumer` to `supplier` with the default weight.
    pub fn connect(&self, consumer: NodeId, supplier: NodeId) -> Result<EdgeId, SimError> {
        self.connect_weighted(consumer, supplier, DEFAULT_WEIGHT)
    }

    /// Connect `consumer` to `supplier`.
    ///
    /// The edge capacity is taken from the supplier's
    /// [`max_supply`](FlowNode::max_supply). Both endpoints are marked dirty.
    pub fn connect_weighted(
        &self,
        consumer: NodeId,
        supplier: NodeId,
        weight: f64,
    ) -> Result<EdgeId, SimError> {
        if consumer == supplier {
            return sim_error!(format!(
                "{}: cannot connect {consumer} to itself",
                self.state.entity
            ));
        }
        if !(weight.is_finite() && weight >= 0.0) {
            return sim_error!(format!(
                "{}: invalid weight {weight} connecting {consumer} to {supplier}",
                self.state.entity
            ));
        }

        let mut graph = self.state.graph.borrow_mut();
        let consumer_entity = match graph.slot(consumer) {
            Some(slot) => slot.entity.clone(),
            None => {
                return sim_error!(format!(
                    "{}: consumer {consumer} is not a live node",
                    self.state.entity
                ));
            }
        };
        let (supplier_entity, capacity) = match graph.slot(supplier) {
            Some(NodeSlot {
                entity,
                behaviour: Some(behaviour),
                ..
            }) => (entity.clone(), behaviour.max_supply()),
            Some(slot) => {
                return sim_error!(format!(
                    "{}: cannot connect to {} while it is being updated",
                    self.state.entity, slot.entity
                ));
            }
            None => {
                return sim_error!(format!(
                    "{}: supplier {supplier} is not a live node",
                    self.state.entity
                ));
            }
        };

        let id = EdgeId(graph.edges.len());
        let entity = Rc::new(Entity::new(&self.state.entity, &id.to_string()));
        connect!(consumer_entity ; supplier_entity);
        debug!(entity ; "{consumer_entity} -> {supplier_entity} capacity={capacity} weight={weight}");

        graph.edges.push(Some(FlowEdge {
            entity,
            consumer,
            supplier,
            demand: 0.0,
            supply: 0.0,
            capacity,
            weight,
        }));
        if let Some(slot) = graph.slot_mut(consumer) {
            slot.supplier_edges.push(id);
        }
        if let Some(slot) = graph.slot_mut(supplier) {
            slot.consumer_edges.push(id);
        }
        graph.invalidate(supplier);
        graph.invalidate(consumer);
        Ok(id)
    }

    /// Record a new demand on `edge` and mark its supplier dirty.
    ///
    /// Negative values are floored at zero. Pushing the value already on the
    /// edge does nothing.
    pub fn push_demand(&self, edge: EdgeId, value: f64) -> SimResult {
        self.set_demand(None, edge, value)
    }

    /// Record a new supply on `edge` and mark its consumer dirty.
    ///
    /// Supplying more than the edge capacity is an error.
    pub fn push_supply(&self, edge: EdgeId, value: f64) -> SimResult {
        self.set_supply(None, edge, value)
    }

    pub(crate) fn push_demand_from(&self, node: NodeId, edge: EdgeId, value: f64) -> SimResult {
        self.set_demand(Some(node), edge, value)
    }

    pub(crate) fn push_supply_from(&self, node: NodeId, edge: EdgeId, value: f64) -> SimResult {
        self.set_supply(Some(node), edge, value)
    }

    fn set_demand(&self, from: Option<NodeId>, edge_id: EdgeId, value: f64) -> SimResult {
        let value = value.max(0.0);
        let mut graph = self.state.graph.borrow_mut();
        let Some(edge) = graph.edge_mut(edge_id) else {
            return sim_error!(format!(
                "{}: cannot push demand on closed {edge_id}",
                self.state.entity
            ));
        };
        if let Some(node) = from {
            if edge.consumer != node {
                return sim_error!(format!(
                    "{}: {node} is not the consumer of {edge_id}",
                    self.state.entity
                ));
            }
        }
        if edge.demand == value {
            return Ok(());
        }
        edge.demand = value;
        value!(edge.entity ; "demand", value);
        let supplier = edge.supplier;
        graph.invalidate(supplier);
        Ok(())
    }

    fn set_supply(&self, from: Option<NodeId>, edge_id: EdgeId, value: f64) -> SimResult {
        let value = value.max(0.0);
        let mut graph = self.state.graph.borrow_mut();
        let Some(edge) = graph.edge_mut(edge_id) else {
            return sim_error!(format!(
                "{}: cannot push supply on closed {edge_id}",
                self.state.entity
            ));
        };
        if let Some(node) = from {
            if edge.supplier != node {
                return sim_error!(format!(
                    "{}: {node} is not the supplier of {edge_id}",
                    self.state.entity
                ));
            }
        }
        if !within_capacity(value, edge.capacity) {
            return sim_error!(format!(
                "{}: supply {value} exceeds capacity {}",
                edge.entity, edge.capacity
            ));
        }
        if edge.supply == value {
            return Ok(());
        }
        edge.supply = value;
        value!(edge.entity ; "supply", value);
        let consumer = edge.consumer;
        graph.invalidate(consumer);
        Ok(())
    }

    /// Detach `edge` from both of its endpoints and mark them dirty.
    ///
    /// Closing an edge that is already closed does nothing.
    pub fn close_edge(&self, edge_id: EdgeId) -> SimResult {
        let mut graph = self.state.graph.borrow_mut();
        if edge_id.0 >= graph.edges.len() {
            return sim_error!(format!(
                "{}: {edge_id} does not exist",
                self.state.entity
            ));
        }
        let Some(edge) = graph.edges[edge_id.0].take() else {
            return Ok(());
        };
        debug!(edge.entity ; "close");
        if let Some(slot) = graph.slot_mut(edge.consumer) {
            slot.supplier_edges.retain(|e| *e != edge_id);
        }
        if let Some(slot) = graph.slot_mut(edge.supplier) {
            slot.consumer_edges.retain(|e| *e != edge_id);
        }
        graph.invalidate(edge.supplier);
        graph.invalidate(edge.consumer);
        Ok(())
    }

    /// Close all edges of a node and then remove it from the graph.
    pub fn remove_node(&self, id: NodeId) -> SimResult {
        let edges = {
            let graph = self.state.graph.borrow();
            match graph.slot(id) {
                Some(slot) if slot.behaviour.is_none() => {
                    return sim_error!(format!(
                        "{}: cannot remove {} while it is being updated",
                        self.state.entity, slot.entity
                    ));
                }
                Some(slot) => {
                    let mut edges = slot.supplier_edges.clone();
                    edges.extend(slot.consumer_edges.iter().copied());
                    edges
                }
                None => {
                    return sim_error!(format!(
                        "{}: {id} is not a live node",
                        self.state.entity
                    ));
                }
            }
        };

        for edge in edges {
            self.close_edge(edge)?;
        }

        let slot = self.state.graph.borrow_mut().nodes[id.0].take();
        if let Some(mut slot) = slot {
            debug!(self.state.entity ; "remove {id} ({})", slot.entity);
            if let Some(behaviour) = slot.behaviour.as_mut() {
                behaviour.on_remove(&slot.entity);
            }
        }
        Ok(())
    }

    /// Mark a node dirty so that it is updated by the next convergence.
    pub fn invalidate(&self, id: NodeId) {
        self.state.graph.borrow_mut().invalidate(id);
    }

    /// Whether no node is waiting to be updated.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.state.graph.borrow().dirty.is_empty()
    }

    /// Update dirty nodes until none remain.
    pub fn converge(&self) -> SimResult {
        if self.state.converging.replace(true) {
            return sim_error!(format!(
                "{}: converge called while already converging",
                self.state.entity
            ));
        }
        let result = self.drain();
        self.state.converging.set(false);
        result
    }

    fn drain(&self) -> SimResult {
        let max_cycles = self.state.max_cycles.get();
        let mut cycles = 0;
        loop {
            let batch: Vec<NodeId> = self.state.graph.borrow_mut().dirty.drain(..).collect();
            if batch.is_empty() {
                return Ok(());
            }

            cycles += 1;
            if cycles > max_cycles {
                self.state.graph.borrow_mut().dirty.extend(batch);
                return sim_error!(format!(
                    "{}: no convergence after {max_cycles} cycles",
                    self.state.entity
                ));
            }
            trace!(self.state.entity ; "cycle {cycles}: {} dirty", batch.len());

            let mut batch = batch.into_iter();
            while let Some(id) = batch.next() {
                if let Err(e) = self.update_node(id) {
                    // Keep the nodes that did not get to run queued.
                    self.state.graph.borrow_mut().dirty.extend(batch);
                    return Err(e);
                }
            }
        }
    }

    fn update_node(&self, id: NodeId) -> SimResult {
        let (mut behaviour, entity) = {
            let mut graph = self.state.graph.borrow_mut();
            let Some(slot) = graph.slot_mut(id) else {
                // Removed after it was queued
                return Ok(());
            };
            slot.pending = false;
            let Some(behaviour) = slot.behaviour.take() else {
                return sim_error!(format!("{}: update re-entered", slot.entity));
            };
            slot.update_count += 1;
            (behaviour, slot.entity.clone())
        };

        trace!(entity ; "update");
        let mut ctx = NodeContext::new(self, id, entity);
        let result = behaviour.on_update(&mut ctx);

        if let Some(slot) = self.state.graph.borrow_mut().slot_mut(id) {
            slot.behaviour = Some(behaviour);
        }
        result
    }

    /// Schedule an update of `id` after `delay_ms`.
    ///
    /// When the callback runs the node is marked dirty and the graph is
    /// converged. Callbacks for nodes that have since been removed do nothing.
    pub fn schedule_update(&self, id: NodeId, delay_ms: SimTime) -> Timer {
        let weak: Weak<FlowState> = Rc::downgrade(&self.state);
        self.state
            .dispatcher
            .schedule_cancellable(delay_ms, move |_| {
                let Some(state) = weak.upgrade() else {
                    return Ok(());
                };
                let engine = FlowEngine { state };
                engine.invalidate(id);
                engine.converge()
            })
    }

    /// Number of times `on_update` has been called for a node.
    pub fn update_count(&self, id: NodeId) -> Result<u64, SimError> {
        match self.state.graph.borrow().slot(id) {
            Some(slot) => Ok(slot.update_count),
            None => sim_error!(format!("{}: {id} is not a live node", self.state.entity)),
        }
    }

    /// Edges on which `id` is the consumer.
    pub fn supplier_edges(&self, id: NodeId) -> Result<Vec<EdgeId>, SimError> {
        match self.state.graph.borrow().slot(id) {
            Some(slot) => Ok(slot.supplier_edges.clone()),
            None => sim_error!(format!("{}: {id} is not a live node", self.state.entity)),
        }
    }

    /// Edges on which `id` is the supplier.
    pub fn consumer_edges(&self, id: NodeId) -> Result<Vec<EdgeId>, SimError> {
        match self.state.graph.borrow().slot(id) {
            Some(slot) => Ok(slot.consumer_edges.clone()),
            None => sim_error!(format!("{}: {id} is not a live node", self.state.entity)),
        }
    }

    /// Values of an edge, or `None` if it has been closed.
    #[must_use]
    pub fn edge_snapshot(&self, id: EdgeId) -> Option<EdgeSnapshot> {
        self.state.graph.borrow().edge(id).map(|e| e.snapshot(id))
    }

    pub fn node_snapshot(&self, id: NodeId) -> Result<NodeSnapshot, SimError> {
        let graph = self.state.graph.borrow();
        match graph.slot(id) {
            Some(slot) => Ok(Self::snapshot_slot(&graph, id, slot)),
            None => sim_error!(format!("{}: {id} is not a live node", self.state.entity)),
        }
    }

    /// Snapshots of all live nodes in the order they were added.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        let graph = self.state.graph.borrow();
        graph
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.as_ref()
                    .map(|slot| Self::snapshot_slot(&graph, NodeId(i), slot))
            })
            .collect()
    }

    fn snapshot_slot(graph: &FlowGraph, id: NodeId, slot: &NodeSlot) -> NodeSnapshot {
        let edges = |ids: &[EdgeId]| -> Vec<EdgeSnapshot> {
            ids.iter()
                .filter_map(|e| graph.edge(*e).map(|edge| edge.snapshot(*e)))
                .collect()
        };
        NodeSnapshot {
            id,
            name: slot.entity.full_name(),
            update_count: slot.update_count,
            supplier_edges: edges(slot.supplier_edges.as_slice()),
            consumer_edges: edges(slot.consumer_edges.as_slice()),
        }
    }

    /// Read the behaviour of a node as its concrete type.
    pub fn with_node<T: FlowNode, R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, SimError> {
        let graph = self.state.graph.borrow();
        let Some(slot) = graph.slot(id) else {
            return sim_error!(format!("{}: {id} is not a live node", self.state.entity));
        };
        let Some(behaviour) = slot.behaviour.as_ref() else {
            return sim_error!(format!("{} is being updated", slot.entity));
        };
        let any: &dyn Any = &**behaviour;
        match any.downcast_ref::<T>() {
            Some(node) => Ok(f(node)),
            None => sim_error!(format!(
                "{} is not a {}",
                slot.entity,
                std::any::type_name::<T>()
            )),
        }
    }

    /// Modify the behaviour of a node as its concrete type.
    ///
    /// The node is marked dirty afterwards, so the change takes effect at the
    /// next [`converge`](FlowEngine::converge).
    pub fn with_node_mut<T: FlowNode, R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, SimError> {
        let mut graph = self.state.graph.borrow_mut();
        let Some(slot) = graph.slot_mut(id) else {
            return sim_error!(format!("{}: {id} is not a live node", self.state.entity));
        };
        let name = slot.entity.full_name();
        let Some(behaviour) = slot.behaviour.as_mut() else {
            return sim_error!(format!("{name} is being updated"));
        };
        let any: &mut dyn Any = &mut **behaviour;
        let result = match any.downcast_mut::<T>() {
            Some(node) => f(node),
            None => {
                return sim_error!(format!("{name} is not a {}", std::any::type_name::<T>()));
            }
        };
        graph.invalidate(id);
        Ok(result)
    }
}

impl fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.state.graph.borrow();
        f.debug_struct("FlowEngine")
            .field("entity", &self.state.entity.full_name())
            .field("nodes", &graph.nodes.iter().filter(|n| n.is_some()).count())
            .field("edges", &graph.edges.iter().filter(|e| e.is_some()).count())
            .field("dirty", &graph.dirty.len())
            .finish()
    }
}
