// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::cell::Cell;
use std::rc::Rc;

use flowsim_engine::test_helpers::start_test;
use flowsim_engine::types::SimResult;
use flowsim_flow::engine::FlowEngine;
use flowsim_flow::node::{FlowNode, NodeContext};
use flowsim_flow::nodes::consumer::ConstantConsumer;
use flowsim_flow::nodes::supplier::SimpleSupplier;
use flowsim_flow::types::EdgeId;

/// A node which only counts its updates.
struct CountingNode {
    updates: Rc<Cell<u32>>,
}

impl FlowNode for CountingNode {
    fn on_update(&mut self, _ctx: &mut NodeContext) -> SimResult {
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }
}

fn counting_node() -> (CountingNode, Rc<Cell<u32>>) {
    let updates = Rc::new(Cell::new(0));
    (
        CountingNode {
            updates: updates.clone(),
        },
        updates,
    )
}

#[test]
fn pushes_within_one_pass_coalesce() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let (a, _) = counting_node();
    let (b, _) = counting_node();
    let a = flow.add_node(engine.top(), "a", a);
    let b = flow.add_node(engine.top(), "b", b);
    let ea = flow.connect(a, cpu).unwrap();
    let eb = flow.connect(b, cpu).unwrap();
    flow.converge().unwrap();
    assert!(flow.is_converged());

    let before = flow.update_count(cpu).unwrap();
    flow.push_demand(ea, 30.0).unwrap();
    flow.push_demand(eb, 90.0).unwrap();
    flow.push_demand(ea, 40.0).unwrap();
    flow.converge().unwrap();
    assert_eq!(flow.update_count(cpu).unwrap(), before + 1);

    assert_eq!(flow.edge_snapshot(ea).unwrap().supply, 40.0);
    assert_eq!(flow.edge_snapshot(eb).unwrap().supply, 60.0);
}

#[test]
fn consumer_updates_coalesce_at_supplier() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let vm0 = flow.add_node(engine.top(), "vm0", ConstantConsumer::new(10.0));
    let vm1 = flow.add_node(engine.top(), "vm1", ConstantConsumer::new(10.0));
    flow.connect(vm0, cpu).unwrap();
    flow.connect(vm1, cpu).unwrap();
    flow.converge().unwrap();

    let before = flow.update_count(cpu).unwrap();
    flow.with_node_mut(vm0, |vm: &mut ConstantConsumer| vm.set_demand(70.0))
        .unwrap();
    flow.with_node_mut(vm1, |vm: &mut ConstantConsumer| vm.set_demand(70.0))
        .unwrap();
    flow.converge().unwrap();

    assert_eq!(flow.update_count(cpu).unwrap(), before + 1);
    for vm in [vm0, vm1] {
        let supply = flow.with_node(vm, |vm: &ConstantConsumer| vm.supply()).unwrap();
        assert_eq!(supply, 50.0);
    }
}

#[test]
fn unchanged_push_is_a_no_op() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let (vm, _) = counting_node();
    let vm = flow.add_node(engine.top(), "vm", vm);
    let edge = flow.connect(vm, cpu).unwrap();
    flow.push_demand(edge, 10.0).unwrap();
    flow.converge().unwrap();

    let before = flow.update_count(cpu).unwrap();
    flow.push_demand(edge, 10.0).unwrap();
    assert!(flow.is_converged());
    flow.converge().unwrap();
    assert_eq!(flow.update_count(cpu).unwrap(), before);
}

#[test]
fn close_edge_is_idempotent() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let vm0 = flow.add_node(engine.top(), "vm0", ConstantConsumer::new(80.0));
    let vm1 = flow.add_node(engine.top(), "vm1", ConstantConsumer::new(80.0));
    let e0 = flow.connect(vm0, cpu).unwrap();
    let e1 = flow.connect(vm1, cpu).unwrap();
    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(e1).unwrap().supply, 50.0);

    flow.close_edge(e0).unwrap();
    flow.close_edge(e0).unwrap();
    assert!(flow.edge_snapshot(e0).is_none());
    assert_eq!(flow.consumer_edges(cpu).unwrap(), vec![e1]);
    assert!(flow.supplier_edges(vm0).unwrap().is_empty());

    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(e1).unwrap().supply, 80.0);
    let supply = flow.with_node(vm0, |vm: &ConstantConsumer| vm.supply()).unwrap();
    assert_eq!(supply, 0.0);

    assert!(flow.push_demand(e0, 1.0).is_err());
    assert!(flow.close_edge(EdgeId(42)).is_err());
}

#[test]
fn remove_node_closes_its_edges() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(90.0));
    let vms: Vec<_> = (0..3)
        .map(|i| flow.add_node(engine.top(), &format!("vm{i}"), ConstantConsumer::new(100.0)))
        .collect();
    let edges: Vec<_> = vms.iter().map(|vm| flow.connect(*vm, cpu).unwrap()).collect();
    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(edges[2]).unwrap().supply, 30.0);

    flow.remove_node(vms[0]).unwrap();
    assert!(!flow.is_live(vms[0]));
    assert!(flow.edge_snapshot(edges[0]).is_none());
    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(edges[1]).unwrap().supply, 45.0);
    assert_eq!(flow.edge_snapshot(edges[2]).unwrap().supply, 45.0);

    // Handles are never reused
    let vm3 = flow.add_node(engine.top(), "vm3", ConstantConsumer::new(1.0));
    assert_ne!(vm3, vms[0]);
    assert!(flow.remove_node(vms[0]).is_err());
    assert!(flow.update_count(vms[0]).is_err());
}

#[test]
fn snapshots() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(10.0));
    let vm = flow.add_node(engine.top(), "vm", ConstantConsumer::new(4.0));
    let edge = flow.connect(vm, cpu).unwrap();
    flow.converge().unwrap();

    let cpu_snapshot = flow.node_snapshot(cpu).unwrap();
    assert_eq!(cpu_snapshot.name, "top::cpu");
    assert_eq!(cpu_snapshot.demanded(), 4.0);
    assert_eq!(cpu_snapshot.supplied(), 4.0);
    assert_eq!(cpu_snapshot.consumer_edges[0].capacity, 10.0);

    let vm_snapshot = flow.node_snapshot(vm).unwrap();
    assert_eq!(vm_snapshot.demand(), 4.0);
    assert_eq!(vm_snapshot.supply(), 4.0);
    assert_eq!(vm_snapshot.supplier_edges[0].id, edge);
    assert_eq!(vm_snapshot.supplier_edges[0].weight, 1.0);

    let all = flow.snapshot();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, cpu);
    assert_eq!(all[1].id, vm);
}

#[test]
fn capacity_comes_from_supplier() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(25.0));
    let (vm, _) = counting_node();
    let vm = flow.add_node(engine.top(), "vm", vm);
    let edge = flow.connect(vm, cpu).unwrap();
    assert_eq!(flow.edge_snapshot(edge).unwrap().capacity, 25.0);

    // Raising the capacity later does not change existing edges
    flow.with_node_mut(cpu, |cpu: &mut SimpleSupplier| cpu.set_capacity(50.0))
        .unwrap();
    flow.push_demand(edge, 40.0).unwrap();
    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(edge).unwrap().supply, 25.0);
}

#[test]
fn capacity_change_is_redistributed() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let vm0 = flow.add_node(engine.top(), "vm0", ConstantConsumer::new(30.0));
    let vm1 = flow.add_node(engine.top(), "vm1", ConstantConsumer::new(60.0));
    let e0 = flow.connect(vm0, cpu).unwrap();
    let e1 = flow.connect(vm1, cpu).unwrap();
    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(e1).unwrap().supply, 60.0);

    flow.with_node_mut(cpu, |cpu: &mut SimpleSupplier| cpu.set_capacity(40.0))
        .unwrap();
    flow.converge().unwrap();
    assert_eq!(flow.edge_snapshot(e0).unwrap().supply, 20.0);
    assert_eq!(flow.edge_snapshot(e1).unwrap().supply, 20.0);
    let utilization = flow
        .with_node(cpu, |cpu: &SimpleSupplier| cpu.utilization())
        .unwrap();
    assert_eq!(utilization, 1.0);
}
