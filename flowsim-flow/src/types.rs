// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Handles used to refer to graph vertices and edges.

use std::fmt;

/// Stable handle to a node of a [`FlowEngine`](crate::engine::FlowEngine).
///
/// Handles are never reused, so a handle to a removed node stays invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Stable handle to an edge of a [`FlowEngine`](crate::engine::FlowEngine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge{}", self.0)
    }
}

/// Relative tolerance allowed when checking a supply against a capacity.
pub const CAPACITY_TOLERANCE: f64 = 1e-9;

/// Whether `value` fits within `capacity`, allowing for rounding errors.
#[must_use]
pub fn within_capacity(value: f64, capacity: f64) -> bool {
    value <= capacity + CAPACITY_TOLERANCE * capacity.abs().max(1.0)
}
