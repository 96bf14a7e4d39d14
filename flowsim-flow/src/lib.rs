// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The flow simulation kernel.
//!
//! A flow simulation is a directed graph of [nodes](crate::node::FlowNode)
//! connected by [edges](crate::edge::FlowEdge). Each edge links one consumer
//! to one supplier: the consumer pushes _demand_ towards the supplier and the
//! supplier pushes _supply_ back towards the consumer.
//!
//! Pushing a value onto an edge records it and marks the node at the other end
//! dirty. The [`FlowEngine`](crate::engine::FlowEngine) then drains the dirty
//! queue, calling [`on_update`](crate::node::FlowNode::on_update) on each
//! dirty node at most once per cycle, until the graph settles.
//!
//! Nodes which need to act at a later virtual time (for example a
//! [workload](crate::nodes::workload::FlowWorkload) finishing a fragment)
//! schedule an update through the
//! [`Dispatcher`](flowsim_engine::dispatcher::Dispatcher).
//!
//! # Example
//!
//! ```rust
//! use flowsim_engine::engine::Engine;
//! use flowsim_flow::engine::FlowEngine;
//! use flowsim_flow::nodes::consumer::ConstantConsumer;
//! use flowsim_flow::nodes::supplier::SimpleSupplier;
//!
//! let engine = Engine::default();
//! let flow = FlowEngine::new(engine.top(), engine.dispatcher());
//!
//! let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
//! let vm = flow.add_node(engine.top(), "vm", ConstantConsumer::new(150.0));
//! flow.connect(vm, cpu).unwrap();
//! flow.converge().unwrap();
//!
//! let supply = flow.with_node(vm, |vm: &ConstantConsumer| vm.supply()).unwrap();
//! assert_eq!(supply, 100.0);
//! ```

pub mod distribution;
pub mod edge;
pub mod engine;
pub mod node;
pub mod nodes;
pub mod scaling;
pub mod types;
