// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::path::Path;

use flowsim_engine::test_helpers::start_test;
use flowsim_platform::Datacenter;

fn build_error(scenario: &str) -> String {
    let engine = start_test(file!());
    match Datacenter::from_string(&engine, scenario) {
        Ok(_) => panic!("Expected an error!"),
        Err(e) => e.0,
    }
}

#[test]
#[should_panic(expected = "Duplicate name")]
fn duplicate_host_name() {
    let engine = start_test(file!());
    Datacenter::from_string(
        &engine,
        "
hosts:
  - name: host0
    capacity: 1
  - name: host0
    capacity: 2
",
    )
    .unwrap();
}

#[test]
#[should_panic(expected = "Duplicate name")]
fn workload_named_like_host() {
    let engine = start_test(file!());
    Datacenter::from_string(
        &engine,
        "
hosts:
  - name: host0
    capacity: 1
workloads:
  - name: host0
    host: host0
",
    )
    .unwrap();
}

#[test]
fn unknown_host() {
    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
workloads:
  - name: vm0
    host: host9
",
    );
    assert_eq!(err, "Workload 'vm0' refers to unknown host 'host9'");
}

#[test]
fn unknown_fields_and_selectors() {
    let err = build_error("hosts:\n  - name: h\n    capacity: 1\n    colour: red\n");
    assert!(err.starts_with("serde_yaml::from_str failed:"), "{err}");

    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
    overhead:
      kind: fancy
",
    );
    assert!(err.starts_with("serde_yaml::from_str failed:"), "{err}");

    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
    strategy: round_robin
",
    );
    assert!(err.starts_with("serde_yaml::from_str failed:"), "{err}");
}

#[test]
fn invalid_host_models() {
    let err = build_error("hosts:\n  - name: host0\n    capacity: -1\n");
    assert_eq!(err, "Host 'host0': invalid capacity -1");

    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
    thermal:
      kind: manufacturer
      properties: { slope: 1, intercept: 2 }
",
    );
    assert_eq!(err, "Host 'host0': a thermal model needs a power model");

    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
    power:
      kind: square
      properties: { idle_power: 1 }
sampling:
  interval_ms: 10
",
    );
    assert_eq!(
        err,
        "Host 'host0': square power: missing required property 'max_power'"
    );

    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
    overhead:
      kind: constant
      properties: { percentage_overhead: 2 }
",
    );
    assert!(err.starts_with("Host 'host0': constant overhead"), "{err}");

    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
    overhead:
      kind: constant
      properties: { percentage: 0.1 }
",
    );
    assert_eq!(
        err,
        "Host 'host0': constant overhead: unknown property 'percentage'"
    );
}

#[test]
fn invalid_weight() {
    let err = build_error(
        "
hosts:
  - name: host0
    capacity: 1
workloads:
  - name: vm0
    host: host0
    weight: -2
",
    );
    assert!(err.contains("invalid weight -2"), "{err}");
}

#[test]
fn missing_file() {
    let engine = start_test(file!());
    let err = Datacenter::from_file(&engine, Path::new("no/such/scenario.yaml"))
        .err()
        .unwrap();
    assert!(err.0.starts_with("Unable to read no/such/scenario.yaml"));
}

#[test]
fn unknown_names() {
    let engine = start_test(file!());
    let datacenter = Datacenter::from_string(&engine, "hosts: []\n").unwrap();
    assert_eq!(datacenter.num_hosts(), 0);
    assert_eq!(datacenter.host("host0").err().unwrap().0, "No host 'host0'");
    assert_eq!(
        datacenter.workload_report("vm0").err().unwrap().0,
        "No workload 'vm0'"
    );
}
