// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Periodic sampling of a host.
//!
//! A [HostMonitor] reads the state of a [SimpleSupplier] every `interval_ms`
//! of virtual time and derives the power drawn and, when a thermal model is
//! attached, the temperature of the host.
//!
//! Samples are scheduled as background work. The monitor only keeps sampling
//! while the dispatcher has foreground work to do. Once none is left it takes
//! a final sample and stops, so monitors never keep a simulation alive, alone
//! or together.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use flowsim_engine::dispatcher::Dispatcher;
use flowsim_engine::sim_error;
use flowsim_engine::types::{SimError, SimResult, SimTime};
use flowsim_flow::engine::FlowEngine;
use flowsim_flow::nodes::supplier::SimpleSupplier;
use flowsim_flow::types::NodeId;
use flowsim_track::entity::Entity;
use flowsim_track::{debug, value};

use crate::power::PowerModel;
use crate::thermal::ThermalModel;

/// The state of a host at one point in virtual time.
#[derive(Clone, Debug, PartialEq)]
pub struct HostSample {
    pub time_ms: SimTime,
    pub demand: f64,
    pub supply: f64,
    pub capacity: f64,
    pub utilization: f64,
    pub power_w: f64,
    pub dynamic_power_w: f64,
    pub temperature_c: Option<f64>,
}

pub struct HostMonitor {
    pub entity: Rc<Entity>,
    flow: FlowEngine,
    host: NodeId,
    interval_ms: SimTime,
    power: PowerModel,
    thermal: RefCell<Option<ThermalModel>>,
    samples: RefCell<Vec<HostSample>>,
    energy_j: Cell<f64>,
    last_power: Cell<Option<(SimTime, f64)>>,
}

impl HostMonitor {
    pub fn new(
        parent: &Rc<Entity>,
        flow: &FlowEngine,
        host: NodeId,
        interval_ms: SimTime,
        power: PowerModel,
        thermal: Option<ThermalModel>,
    ) -> Result<Rc<Self>, SimError> {
        let entity = Rc::new(Entity::new(parent, "monitor"));
        if interval_ms == 0 {
            return sim_error!(format!("{entity}: sampling interval must be non-zero"));
        }
        // Fails early if the host is not a supplier
        flow.with_node(host, |_: &SimpleSupplier| ())?;

        Ok(Rc::new(Self {
            entity,
            flow: flow.clone(),
            host,
            interval_ms,
            power,
            thermal: RefCell::new(thermal),
            samples: RefCell::new(Vec::new()),
            energy_j: Cell::new(0.0),
            last_power: Cell::new(None),
        }))
    }

    /// Take a sample now and keep sampling every interval.
    pub fn start(self: &Rc<Self>) -> SimResult {
        self.sample()?;
        self.schedule_next(self.flow.dispatcher());
        Ok(())
    }

    fn schedule_next(self: &Rc<Self>, dispatcher: &Dispatcher) {
        let monitor = self.clone();
        dispatcher.schedule_background(self.interval_ms, move |dispatcher| {
            monitor.sample()?;
            if dispatcher.num_foreground_pending() > 0 {
                monitor.schedule_next(dispatcher);
            } else {
                debug!(monitor.entity ; "stopped sampling");
            }
            Ok(())
        });
    }

    /// Read the host and record a [HostSample].
    pub fn sample(&self) -> Result<HostSample, SimError> {
        let (demand, supply, capacity, utilization) =
            self.flow.with_node(self.host, |s: &SimpleSupplier| {
                (s.demanded(), s.supplied(), s.capacity(), s.utilization())
            })?;
        let time_ms = self.flow.dispatcher().now();

        let power_w = self.power.compute_power(utilization);
        let dynamic_power_w = power_w - self.power.idle_power();
        let temperature_c = self.thermal.borrow_mut().as_mut().map(|thermal| {
            thermal.set_temperature(
                dynamic_power_w,
                self.power.idle_power(),
                self.power.max_power(),
            )
        });

        if let Some((last_ms, last_w)) = self.last_power.get() {
            let elapsed_s = (time_ms - last_ms) as f64 / 1000.0;
            self.energy_j.set(self.energy_j.get() + last_w * elapsed_s);
        }
        self.last_power.set(Some((time_ms, power_w)));

        value!(self.entity ; "power_w", power_w);
        if let Some(temperature_c) = temperature_c {
            value!(self.entity ; "temperature_c", temperature_c);
        }

        let sample = HostSample {
            time_ms,
            demand,
            supply,
            capacity,
            utilization,
            power_w,
            dynamic_power_w,
            temperature_c,
        };
        self.samples.borrow_mut().push(sample.clone());
        Ok(sample)
    }

    #[must_use]
    pub fn samples(&self) -> Vec<HostSample> {
        self.samples.borrow().clone()
    }

    /// Energy drawn up to the last sample in joules, holding the power of
    /// each sample until the next one.
    #[must_use]
    pub fn energy_j(&self) -> f64 {
        self.energy_j.get()
    }

    #[must_use]
    pub fn interval_ms(&self) -> SimTime {
        self.interval_ms
    }
}
