// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::collections::HashMap;
use std::rc::Rc;

use flowsim_engine::sim_error;
use flowsim_engine::types::SimError;
use flowsim_flow::edge::DEFAULT_WEIGHT;
use flowsim_flow::engine::FlowEngine;
use flowsim_flow::nodes::distributor::FlowDistributor;
use flowsim_flow::nodes::supplier::SimpleSupplier;
use flowsim_flow::nodes::workload::FlowWorkload;
use flowsim_models::monitor::HostMonitor;
use flowsim_models::overhead::{VirtualizationOverhead, VirtualizationOverheadKind};
use flowsim_models::power::PowerModel;
use flowsim_models::thermal::ThermalModel;
use flowsim_track::entity::Entity;
use flowsim_track::info;

use crate::types::{DatacenterConfig, HostSection, SamplingSection};
use crate::{Host, Hosts, Workload, Workloads};

/// Check that every name is unique and that every workload refers to a host.
pub fn validate_names(cfg: &DatacenterConfig) -> Result<(), SimError> {
    let mut names = HashMap::new();
    for host in &cfg.hosts {
        if names.insert(host.name.as_str(), "host").is_some() {
            return sim_error!(format!("Duplicate name {}", host.name));
        }
    }
    for workload in &cfg.workloads {
        if names.insert(workload.name.as_str(), "workload").is_some() {
            return sim_error!(format!("Duplicate name {}", workload.name));
        }
    }
    for workload in &cfg.workloads {
        match names.get(workload.host.as_str()) {
            Some(&"host") => {}
            _ => {
                return sim_error!(format!(
                    "Workload '{}' refers to unknown host '{}'",
                    workload.name, workload.host
                ));
            }
        }
    }
    Ok(())
}

fn build_distributor(host: &HostSection) -> Result<FlowDistributor, SimError> {
    let distributor = FlowDistributor::new(host.strategy);
    let Some(overhead_cfg) = &host.overhead else {
        return Ok(distributor);
    };
    if overhead_cfg.kind == VirtualizationOverheadKind::None {
        return Ok(distributor);
    }
    let overhead = VirtualizationOverhead::from_config(overhead_cfg)
        .map_err(|e| SimError(format!("Host '{}': {}", host.name, e.0)))?;
    Ok(distributor.with_overhead(Box::new(overhead)))
}

pub fn build_hosts(
    flow: &FlowEngine,
    parent: &Rc<Entity>,
    cfg: &DatacenterConfig,
) -> Result<Hosts, SimError> {
    let mut hosts = Hosts::new();
    for section in &cfg.hosts {
        if !section.capacity.is_finite() || section.capacity < 0.0 {
            return sim_error!(format!(
                "Host '{}': invalid capacity {}",
                section.name, section.capacity
            ));
        }
        if section.thermal.is_some() && section.power.is_none() {
            return sim_error!(format!(
                "Host '{}': a thermal model needs a power model",
                section.name
            ));
        }

        let entity = Rc::new(Entity::new(parent, &section.name));
        let cpu = flow.add_node(&entity, "cpu", SimpleSupplier::new(section.capacity));
        let distributor = flow.add_node(&entity, "distributor", build_distributor(section)?);
        flow.connect(distributor, cpu)?;

        hosts.push(Host {
            name: section.name.clone(),
            entity,
            cpu,
            distributor,
            monitor: None,
        });
    }
    Ok(hosts)
}

pub fn build_workloads(
    flow: &FlowEngine,
    parent: &Rc<Entity>,
    cfg: &DatacenterConfig,
    hosts: &Hosts,
) -> Result<Workloads, SimError> {
    let mut workloads = Workloads::new();
    for section in &cfg.workloads {
        let Some(host) = hosts.iter().find(|h| h.name == section.host) else {
            return sim_error!(format!("No host '{}'", section.host));
        };

        let node = flow.add_node(
            parent,
            &section.name,
            FlowWorkload::with_scaling(section.fragments.clone(), section.scaling.policy()),
        );
        let weight = section.weight.unwrap_or(DEFAULT_WEIGHT);
        let distributor = host.distributor;

        if section.start_ms == 0 {
            flow.connect_weighted(node, distributor, weight)?;
        } else {
            // A workload without a supplier waits until it is submitted
            let submit = flow.clone();
            let entity = parent.clone();
            let name = section.name.clone();
            let host_name = host.name.clone();
            flow.dispatcher().schedule(section.start_ms, move |_| {
                info!(entity ; "submit {name} to {host_name}");
                submit.connect_weighted(node, distributor, weight)?;
                submit.converge()
            });
        }

        workloads.push(Workload {
            name: section.name.clone(),
            host: section.host.clone(),
            node,
            start_ms: section.start_ms,
        });
    }
    Ok(workloads)
}

/// Attach a [HostMonitor] to every host that has a power model.
pub fn build_monitors(
    flow: &FlowEngine,
    cfg: &DatacenterConfig,
    sampling: &SamplingSection,
    hosts: &mut Hosts,
) -> Result<(), SimError> {
    for (host, section) in hosts.iter_mut().zip(&cfg.hosts) {
        let Some(power_cfg) = &section.power else {
            continue;
        };
        let power = PowerModel::from_config(power_cfg)
            .map_err(|e| SimError(format!("Host '{}': {}", host.name, e.0)))?;
        let thermal = match &section.thermal {
            Some(thermal_cfg) => Some(
                ThermalModel::from_config(thermal_cfg)
                    .map_err(|e| SimError(format!("Host '{}': {}", host.name, e.0)))?,
            ),
            None => None,
        };
        host.monitor = Some(HostMonitor::new(
            &host.entity,
            flow,
            host.cpu,
            sampling.interval_ms,
            power,
            thermal,
        )?);
    }
    Ok(())
}
