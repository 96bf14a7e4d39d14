// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::thread;

use approx::assert_relative_eq;
use flowsim_engine::engine::Engine;
use flowsim_engine::run_simulation;
use flowsim_engine::test_helpers::start_test;
use flowsim_flow::distribution::DistributionStrategyType;
use flowsim_flow::engine::FlowEngine;
use flowsim_flow::nodes::distributor::FlowDistributor;
use flowsim_flow::nodes::supplier::SimpleSupplier;
use flowsim_flow::nodes::workload::{FlowWorkload, Fragment};
use flowsim_flow::scaling::NoDelayScaling;
use flowsim_flow::types::NodeId;
use flowsim_track::tracker::dev_null_tracker;

fn completed_at(flow: &FlowEngine, workload: NodeId) -> Option<u64> {
    flow.with_node(workload, |w: &FlowWorkload| w.completed_at())
        .unwrap()
}

#[test]
fn half_supply_doubles_duration() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(2000.0));
    let workload = flow.add_node(
        engine.top(),
        "workload",
        FlowWorkload::new(vec![Fragment::new(600, 4000.0)]),
    );
    let edge = flow.connect(workload, cpu).unwrap();
    flow.converge().unwrap();

    let remaining = flow
        .with_node(workload, |w: &FlowWorkload| w.remaining_work())
        .unwrap();
    assert_eq!(remaining, Some(2_400_000.0));

    run_simulation!(engine);
    assert_eq!(completed_at(&flow, workload), Some(1200));
    assert_eq!(engine.time_now_ms(), 1200);
    assert!(flow.edge_snapshot(edge).is_none());
    assert_eq!(flow.node_snapshot(cpu).unwrap().demanded(), 0.0);

    let (demanded, supplied) = flow
        .with_node(workload, |w: &FlowWorkload| {
            (w.demanded_work(), w.supplied_work())
        })
        .unwrap();
    assert_relative_eq!(demanded, 4000.0 * 1200.0);
    assert_relative_eq!(supplied, 2_400_000.0);
}

#[test]
fn no_delay_keeps_trace_timing() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(2000.0));
    let workload = flow.add_node(
        engine.top(),
        "workload",
        FlowWorkload::with_scaling(
            vec![Fragment::new(600, 4000.0)],
            Box::new(NoDelayScaling),
        ),
    );
    flow.connect(workload, cpu).unwrap();
    flow.converge().unwrap();

    run_simulation!(engine);
    assert_eq!(completed_at(&flow, workload), Some(600));
    let (demanded, supplied) = flow
        .with_node(workload, |w: &FlowWorkload| {
            (w.demanded_work(), w.supplied_work())
        })
        .unwrap();
    assert_relative_eq!(demanded, 2_400_000.0);
    assert_relative_eq!(supplied, 1_200_000.0);
}

#[test]
fn fragments_and_idle_periods() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(10.0));
    let workload = flow.add_node(
        engine.top(),
        "workload",
        FlowWorkload::new(vec![
            Fragment::new(100, 10.0),
            Fragment::new(50, 0.0),
            Fragment::new(100, 20.0),
        ]),
    );
    flow.connect(workload, cpu).unwrap();
    flow.converge().unwrap();

    engine.run_until(120).unwrap();
    let index = flow
        .with_node(workload, |w: &FlowWorkload| w.fragment_index())
        .unwrap();
    assert_eq!(index, 1);
    assert_eq!(flow.node_snapshot(cpu).unwrap().supplied(), 0.0);

    run_simulation!(engine);
    assert_eq!(completed_at(&flow, workload), Some(350));
    let (demanded, supplied) = flow
        .with_node(workload, |w: &FlowWorkload| {
            (w.demanded_work(), w.supplied_work())
        })
        .unwrap();
    assert_relative_eq!(demanded, 5000.0);
    assert_relative_eq!(supplied, 3000.0);
}

#[test]
fn contention_then_release() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let long = flow.add_node(
        engine.top(),
        "long",
        FlowWorkload::new(vec![Fragment::new(100, 100.0)]),
    );
    let short = flow.add_node(
        engine.top(),
        "short",
        FlowWorkload::new(vec![Fragment::new(50, 100.0)]),
    );
    flow.connect(long, cpu).unwrap();
    flow.connect(short, cpu).unwrap();
    flow.converge().unwrap();

    run_simulation!(engine);
    assert_eq!(completed_at(&flow, short), Some(100));
    assert_eq!(completed_at(&flow, long), Some(150));
}

#[test]
fn workloads_behind_a_distributor() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(100.0));
    let distributor = flow.add_node(
        engine.top(),
        "distributor",
        FlowDistributor::new(DistributionStrategyType::FixedShare),
    );
    flow.connect(distributor, cpu).unwrap();

    let heavy = flow.add_node(
        engine.top(),
        "heavy",
        FlowWorkload::new(vec![Fragment::new(100, 100.0)]),
    );
    let light = flow.add_node(
        engine.top(),
        "light",
        FlowWorkload::new(vec![Fragment::new(100, 100.0)]),
    );
    flow.connect_weighted(heavy, distributor, 3.0).unwrap();
    flow.connect_weighted(light, distributor, 1.0).unwrap();
    flow.converge().unwrap();

    // heavy runs at 75 until it completes at 134 (ceil of 133.3), then light
    // has the full supply.
    run_simulation!(engine);
    assert_eq!(completed_at(&flow, heavy), Some(134));
    let light_done = completed_at(&flow, light).unwrap();
    assert!(light_done > 134);
    assert!(light_done <= 235);
}

#[test]
fn delayed_start() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(10.0));
    let workload = flow.add_node(
        engine.top(),
        "workload",
        FlowWorkload::new(vec![Fragment::new(30, 10.0)]),
    );
    flow.converge().unwrap();
    let started = flow
        .with_node(workload, |w: &FlowWorkload| w.started_at())
        .unwrap();
    assert_eq!(started, None);

    {
        let flow = flow.clone();
        engine.dispatcher().schedule(40, move |_| {
            flow.connect(workload, cpu)?;
            flow.converge()
        });
    }
    run_simulation!(engine);

    let (started, completed) = flow
        .with_node(workload, |w: &FlowWorkload| (w.started_at(), w.completed_at()))
        .unwrap();
    assert_eq!(started, Some(40));
    assert_eq!(completed, Some(70));
}

#[test]
fn empty_workload_completes_on_connection() {
    let engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(10.0));
    let workload = flow.add_node(engine.top(), "workload", FlowWorkload::new(Vec::new()));
    let edge = flow.connect(workload, cpu).unwrap();
    flow.converge().unwrap();

    assert_eq!(completed_at(&flow, workload), Some(0));
    assert!(flow.edge_snapshot(edge).is_none());
    assert_eq!(engine.dispatcher().num_pending(), 0);
}

#[test]
fn removing_a_workload_cancels_its_update() {
    let mut engine = start_test(file!());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(10.0));
    let workload = flow.add_node(
        engine.top(),
        "workload",
        FlowWorkload::new(vec![Fragment::new(100, 10.0)]),
    );
    flow.connect(workload, cpu).unwrap();
    flow.converge().unwrap();

    engine.run_until(30).unwrap();
    flow.remove_node(workload).unwrap();
    flow.converge().unwrap();

    run_simulation!(engine);
    assert_eq!(engine.time_now_ms(), 30);
    assert_eq!(flow.node_snapshot(cpu).unwrap().demanded(), 0.0);
}

fn staggered_run() -> Vec<Option<u64>> {
    let mut engine = Engine::new(&dev_null_tracker());
    let flow = FlowEngine::new(engine.top(), engine.dispatcher());

    let cpu = flow.add_node(engine.top(), "cpu", SimpleSupplier::new(1000.0));
    let distributor = flow.add_node(
        engine.top(),
        "distributor",
        FlowDistributor::new(DistributionStrategyType::MaxMinFairness),
    );
    flow.connect(distributor, cpu).unwrap();

    let mut workloads = Vec::new();
    for i in 0..8u64 {
        let fragments = (0..4)
            .map(|j| {
                let demand = 100.0 + 70.0 * ((i * j) % 7) as f64;
                Fragment::new(50 + 13 * ((i + j) % 5), demand)
            })
            .collect();
        let workload = flow.add_node(
            engine.top(),
            &format!("w{i}"),
            FlowWorkload::new(fragments),
        );
        workloads.push(workload);

        let flow = flow.clone();
        engine.dispatcher().schedule(17 * i, move |_| {
            flow.connect(workload, distributor)?;
            flow.converge()
        });
    }
    engine.run().unwrap();

    workloads
        .iter()
        .map(|w| completed_at(&flow, *w))
        .collect()
}

#[test]
fn runs_are_deterministic_across_threads() {
    let expected = staggered_run();
    assert!(expected.iter().all(Option::is_some));

    let handles: Vec<_> = (0..4).map(|_| thread::spawn(staggered_run)).collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
