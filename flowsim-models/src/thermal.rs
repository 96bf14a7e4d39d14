// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Thermal models converting the power drawn by a host into a temperature.
//!
//! Two models are provided:
//!  - `rc_model`: a resistor/capacitor network in steady state. Static
//!    (leakage) power is interpolated between a minimum and a maximum leakage
//!    current according to how busy the host is. It is added to the idle and
//!    dynamic power and the total flows through the junction, case and heat
//!    sink resistances to ambient.
//!  - `manufacturer`: a linear fit published for a part,
//!    `slope * dynamic_power + intercept`.

use flowsim_engine::sim_error;
use flowsim_engine::types::SimError;
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::properties::{Properties, check_known, optional, required};

pub const DEFAULT_AMBIENT_TEMPERATURE: f64 = 22.0;
pub const DEFAULT_SUPPLY_VOLTAGE: f64 = 1.8;
pub const DEFAULT_MIN_LEAKAGE_CURRENT: f64 = 0.000_02;
pub const DEFAULT_MAX_LEAKAGE_CURRENT: f64 = 0.000_6;

const RC_MODEL_PROPERTIES: &[&str] = &[
    "ambient_temperature",
    "r_junction_to_case",
    "r_case_to_heat_sink",
    "r_heat_sink_to_ambient",
    "supply_voltage",
    "min_leakage_current",
    "max_leakage_current",
];

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThermalModelKind {
    RcModel,
    Manufacturer,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ThermalKind {
    RcModel {
        ambient_temperature: f64,
        r_junction_to_case: f64,
        r_case_to_heat_sink: f64,
        r_heat_sink_to_ambient: f64,
        supply_voltage: f64,
        min_leakage_current: f64,
        max_leakage_current: f64,
    },
    Manufacturer {
        slope: f64,
        intercept: f64,
    },
}

/// A thermal model and the last temperature it computed.
#[derive(Clone, Debug)]
pub struct ThermalModel {
    kind: ThermalKind,
    temperature: f64,
}

impl ThermalModel {
    pub fn from_config(config: &ModelConfig<ThermalModelKind>) -> Result<Self, SimError> {
        let p = &config.properties;
        let kind = match config.kind {
            ThermalModelKind::RcModel => {
                let model = "rc_model";
                check_known(p, model, RC_MODEL_PROPERTIES)?;
                ThermalKind::RcModel {
                    ambient_temperature: optional(
                        p,
                        model,
                        "ambient_temperature",
                        DEFAULT_AMBIENT_TEMPERATURE,
                    )?,
                    r_junction_to_case: non_negative(model, p, "r_junction_to_case")?,
                    r_case_to_heat_sink: non_negative(model, p, "r_case_to_heat_sink")?,
                    r_heat_sink_to_ambient: non_negative(model, p, "r_heat_sink_to_ambient")?,
                    supply_voltage: optional(p, model, "supply_voltage", DEFAULT_SUPPLY_VOLTAGE)?,
                    min_leakage_current: optional(
                        p,
                        model,
                        "min_leakage_current",
                        DEFAULT_MIN_LEAKAGE_CURRENT,
                    )?,
                    max_leakage_current: optional(
                        p,
                        model,
                        "max_leakage_current",
                        DEFAULT_MAX_LEAKAGE_CURRENT,
                    )?,
                }
            }
            ThermalModelKind::Manufacturer => {
                check_known(p, "manufacturer", &["slope", "intercept"])?;
                ThermalKind::Manufacturer {
                    slope: required(p, "manufacturer", "slope")?,
                    intercept: required(p, "manufacturer", "intercept")?,
                }
            }
        };
        let temperature = match kind {
            ThermalKind::RcModel {
                ambient_temperature,
                ..
            } => ambient_temperature,
            ThermalKind::Manufacturer { intercept, .. } => intercept,
        };
        Ok(Self { kind, temperature })
    }

    #[must_use]
    pub fn kind(&self) -> &ThermalKind {
        &self.kind
    }

    /// The temperature computed by the last call to
    /// [`set_temperature`](Self::set_temperature).
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Compute and record the temperature for a host drawing
    /// `dynamic_power` watts on top of its `min_power`, where `max_power` is
    /// the most it can draw.
    pub fn set_temperature(&mut self, dynamic_power: f64, min_power: f64, max_power: f64) -> f64 {
        let dynamic_power = dynamic_power.max(0.0);
        self.temperature = match self.kind {
            ThermalKind::RcModel {
                ambient_temperature,
                r_junction_to_case,
                r_case_to_heat_sink,
                r_heat_sink_to_ambient,
                supply_voltage,
                min_leakage_current,
                max_leakage_current,
            } => {
                let range = max_power - min_power;
                let busy = if range > 0.0 {
                    (dynamic_power / range).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let leakage_current =
                    min_leakage_current + busy * (max_leakage_current - min_leakage_current);
                let static_power = leakage_current * supply_voltage;
                let total_power = dynamic_power + min_power + static_power;
                let resistance = r_junction_to_case + r_case_to_heat_sink + r_heat_sink_to_ambient;
                ambient_temperature + total_power * resistance
            }
            ThermalKind::Manufacturer { slope, intercept } => slope * dynamic_power + intercept,
        };
        self.temperature
    }
}

fn non_negative(model: &str, properties: &Properties, name: &str) -> Result<f64, SimError> {
    let value = required(properties, model, name)?;
    if value < 0.0 {
        return sim_error!(format!("{model}: {name} must not be negative"));
    }
    Ok(value)
}
