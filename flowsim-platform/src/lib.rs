// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Build a datacenter scenario from a YAML description.
//!
//! A scenario lists hosts, the workloads submitted to them and, optionally,
//! how often hosts are sampled. See [types](crate::types) for the layout.
//!
//! ```rust
//! use flowsim_engine::engine::Engine;
//! use flowsim_platform::Datacenter;
//!
//! let mut engine = Engine::default();
//! let datacenter = Datacenter::from_string(
//!     &engine,
//!     "
//! hosts:
//!   - name: host0
//!     capacity: 2000
//! workloads:
//!   - name: vm0
//!     host: host0
//!     fragments:
//!       - { duration_ms: 600, demand: 4000 }
//! ",
//! )
//! .unwrap();
//! engine.run().unwrap();
//!
//! let report = datacenter.workload_report("vm0").unwrap();
//! assert_eq!(report.completed_at, Some(1200));
//! ```

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::Path;
use std::rc::Rc;

use flowsim_engine::engine::Engine;
use flowsim_engine::sim_error;
use flowsim_engine::types::{SimError, SimResult, SimTime};
use flowsim_flow::engine::FlowEngine;
use flowsim_flow::nodes::supplier::SimpleSupplier;
use flowsim_flow::nodes::workload::FlowWorkload;
use flowsim_flow::types::NodeId;
use flowsim_models::monitor::HostMonitor;
use flowsim_track::entity::Entity;

use crate::builder::{build_hosts, build_monitors, build_workloads, validate_names};
use crate::types::DatacenterConfig;

pub mod builder;
pub mod types;

type Hosts = Vec<Host>;
type Workloads = Vec<Workload>;

/// A host: a CPU supplier feeding a distributor which the workloads of the
/// host connect to.
pub struct Host {
    pub name: String,
    pub entity: Rc<Entity>,
    pub cpu: NodeId,
    pub distributor: NodeId,
    pub monitor: Option<Rc<HostMonitor>>,
}

pub struct Workload {
    pub name: String,
    pub host: String,
    pub node: NodeId,
    pub start_ms: SimTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HostReport {
    pub name: String,
    pub capacity: f64,
    pub demanded: f64,
    pub supplied: f64,
    pub utilization: f64,
    pub num_samples: usize,
    pub energy_j: Option<f64>,
    pub peak_temperature_c: Option<f64>,
}

impl Display for HostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: capacity {}, demanded {}, supplied {} ({:.1}%)",
            self.name,
            self.capacity,
            self.demanded,
            self.supplied,
            self.utilization * 100.0
        )?;
        if let Some(energy_j) = self.energy_j {
            write!(f, ", {} samples, {energy_j:.1}J", self.num_samples)?;
        }
        if let Some(peak) = self.peak_temperature_c {
            write!(f, ", peak {peak:.1}C")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadReport {
    pub name: String,
    pub host: String,
    pub started_at: Option<SimTime>,
    pub completed_at: Option<SimTime>,
    pub demanded_work: f64,
    pub supplied_work: f64,
}

impl Display for WorkloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: ", self.name, self.host)?;
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => write!(f, "ran {start}ms to {end}ms")?,
            (Some(start), None) => write!(f, "started {start}ms, incomplete")?,
            _ => write!(f, "never started")?,
        }
        write!(
            f,
            ", supplied {} of {} work",
            self.supplied_work, self.demanded_work
        )
    }
}

pub struct Datacenter {
    pub entity: Rc<Entity>,
    flow: FlowEngine,
    hosts: Hosts,
    hosts_idx_by_name: HashMap<String, usize>,
    workloads: Workloads,
    workloads_idx_by_name: HashMap<String, usize>,
}

impl Datacenter {
    pub fn from_file(engine: &Engine, scenario_path: &Path) -> Result<Self, SimError> {
        let s = std::fs::read_to_string(scenario_path)
            .map_err(|e| SimError(format!("Unable to read {}: {e}", scenario_path.display())))?;
        Datacenter::from_string(engine, &s)
    }

    pub fn from_string(engine: &Engine, scenario: &str) -> Result<Self, SimError> {
        let cfg: DatacenterConfig = serde_yaml::from_str(scenario)
            .map_err(|e| SimError(format!("serde_yaml::from_str failed: {e}")))?;
        Datacenter::build(engine, &cfg)
    }

    fn build(engine: &Engine, cfg: &DatacenterConfig) -> Result<Self, SimError> {
        validate_names(cfg)?;

        let entity = Rc::new(Entity::new(engine.top(), "datacenter"));
        let flow = FlowEngine::new(&entity, engine.dispatcher());

        let mut hosts = build_hosts(&flow, &entity, cfg)?;
        let workloads = build_workloads(&flow, &entity, cfg, &hosts)?;
        if let Some(sampling) = &cfg.sampling {
            build_monitors(&flow, cfg, sampling, &mut hosts)?;
        }
        flow.converge()?;

        for monitor in hosts.iter().filter_map(|h| h.monitor.as_ref()) {
            monitor.start()?;
        }

        let hosts_idx_by_name = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| (h.name.clone(), i))
            .collect();
        let workloads_idx_by_name = workloads
            .iter()
            .enumerate()
            .map(|(i, w)| (w.name.clone(), i))
            .collect();

        Ok(Datacenter {
            entity,
            flow,
            hosts,
            hosts_idx_by_name,
            workloads,
            workloads_idx_by_name,
        })
    }

    #[must_use]
    pub fn flow(&self) -> &FlowEngine {
        &self.flow
    }

    pub fn host_idx_from_name(&self, host_name: &str) -> Result<usize, SimError> {
        match self.hosts_idx_by_name.get(host_name) {
            Some(idx) => Ok(*idx),
            None => sim_error!(format!("No host '{host_name}'")),
        }
    }

    pub fn workload_idx_from_name(&self, workload_name: &str) -> Result<usize, SimError> {
        match self.workloads_idx_by_name.get(workload_name) {
            Some(idx) => Ok(*idx),
            None => sim_error!(format!("No workload '{workload_name}'")),
        }
    }

    #[must_use]
    pub fn num_hosts(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn num_workloads(&self) -> usize {
        self.workloads.len()
    }

    /// Host names in the order they were configured.
    #[must_use]
    pub fn host_names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }

    /// Workload names in the order they were configured.
    #[must_use]
    pub fn workload_names(&self) -> Vec<String> {
        self.workloads.iter().map(|w| w.name.clone()).collect()
    }

    pub fn host(&self, host_name: &str) -> Result<&Host, SimError> {
        let idx = self.host_idx_from_name(host_name)?;
        Ok(&self.hosts[idx])
    }

    pub fn workload(&self, workload_name: &str) -> Result<&Workload, SimError> {
        let idx = self.workload_idx_from_name(workload_name)?;
        Ok(&self.workloads[idx])
    }

    pub fn host_report(&self, host_name: &str) -> Result<HostReport, SimError> {
        let host = self.host(host_name)?;
        let (capacity, demanded, supplied, utilization) =
            self.flow.with_node(host.cpu, |s: &SimpleSupplier| {
                (s.capacity(), s.demanded(), s.supplied(), s.utilization())
            })?;

        let (num_samples, energy_j, peak_temperature_c) = match &host.monitor {
            Some(monitor) => {
                let samples = monitor.samples();
                let peak = samples
                    .iter()
                    .filter_map(|s| s.temperature_c)
                    .reduce(f64::max);
                (samples.len(), Some(monitor.energy_j()), peak)
            }
            None => (0, None, None),
        };

        Ok(HostReport {
            name: host.name.clone(),
            capacity,
            demanded,
            supplied,
            utilization,
            num_samples,
            energy_j,
            peak_temperature_c,
        })
    }

    pub fn workload_report(&self, workload_name: &str) -> Result<WorkloadReport, SimError> {
        let workload = self.workload(workload_name)?;
        self.flow.with_node(workload.node, |w: &FlowWorkload| WorkloadReport {
            name: workload.name.clone(),
            host: workload.host.clone(),
            started_at: w.started_at(),
            completed_at: w.completed_at(),
            demanded_work: w.demanded_work(),
            supplied_work: w.supplied_work(),
        })
    }

    pub fn host_reports(&self) -> Result<Vec<HostReport>, SimError> {
        self.hosts.iter().map(|h| self.host_report(&h.name)).collect()
    }

    pub fn workload_reports(&self) -> Result<Vec<WorkloadReport>, SimError> {
        self.workloads
            .iter()
            .map(|w| self.workload_report(&w.name))
            .collect()
    }

    /// Return an error naming the first workload which has not completed.
    pub fn check_workloads_complete(&self) -> SimResult {
        for workload in &self.workloads {
            let complete = self
                .flow
                .with_node(workload.node, |w: &FlowWorkload| w.is_complete())?;
            if !complete {
                return sim_error!(format!("Workload '{}' did not complete", workload.name));
            }
        }
        Ok(())
    }
}

impl Display for Datacenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hosts:")?;
        for (i, host) in self.hosts.iter().enumerate() {
            writeln!(f, "  {i}: {}", host.entity)?;
        }

        writeln!(f, "\nWorkloads:")?;
        for (i, workload) in self.workloads.iter().enumerate() {
            writeln!(
                f,
                "  {i}: {} on {} at {}ms",
                workload.name, workload.host, workload.start_ms
            )?;
        }
        Ok(())
    }
}
