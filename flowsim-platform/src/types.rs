// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The YAML layout of a datacenter scenario.
//!
//! ```yaml
//! hosts:
//!   - name: host0
//!     capacity: 2000
//!     strategy: max_min_fairness
//!     overhead:
//!       kind: constant
//!       properties:
//!         percentage_overhead: 0.1
//!     power:
//!       kind: linear
//!       properties:
//!         idle_power: 100
//!         max_power: 300
//! workloads:
//!   - name: vm0
//!     host: host0
//!     start_ms: 100
//!     fragments:
//!       - { duration_ms: 600, demand: 1000 }
//! sampling:
//!   interval_ms: 100
//! ```

use flowsim_flow::distribution::DistributionStrategyType;
use flowsim_flow::nodes::workload::Fragment;
use flowsim_flow::scaling::ScalingKind;
use flowsim_models::config::ModelConfig;
use flowsim_models::overhead::VirtualizationOverheadKind;
use flowsim_models::power::PowerModelKind;
use flowsim_models::thermal::ThermalModelKind;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatacenterConfig {
    #[serde(default)]
    pub hosts: Vec<HostSection>,
    #[serde(default)]
    pub workloads: Vec<WorkloadSection>,
    pub sampling: Option<SamplingSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    pub name: String,
    pub capacity: f64,
    #[serde(default)]
    pub strategy: DistributionStrategyType,
    pub overhead: Option<ModelConfig<VirtualizationOverheadKind>>,
    pub power: Option<ModelConfig<PowerModelKind>>,
    pub thermal: Option<ModelConfig<ThermalModelKind>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadSection {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub start_ms: u64,
    #[serde(default)]
    pub scaling: ScalingKind,
    pub weight: Option<f64>,
    #[serde(default)]
    pub fragments: Vec<Fragment>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingSection {
    pub interval_ms: u64,
}
