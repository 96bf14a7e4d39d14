// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Power models mapping the utilization of a host to the power it draws.
//!
//! All models except `constant` take an `idle_power` (drawn at 0%
//! utilization, default 0) and a `max_power` (drawn at 100%) in watts and
//! shape the curve between them. A `constant` model always draws `power`.

use flowsim_engine::sim_error;
use flowsim_engine::types::SimError;
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::properties::{check_known, optional, required};

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerModelKind {
    Constant,
    Linear,
    Square,
    Cubic,
    Sqrt,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PowerModel {
    kind: PowerModelKind,
    idle_power: f64,
    max_power: f64,
}

impl PowerModel {
    pub fn from_config(config: &ModelConfig<PowerModelKind>) -> Result<Self, SimError> {
        let p = &config.properties;
        let (idle_power, max_power) = match config.kind {
            PowerModelKind::Constant => {
                check_known(p, "constant power", &["power"])?;
                let power = required(p, "constant power", "power")?;
                (power, power)
            }
            kind => {
                let model = format!("{kind:?} power").to_lowercase();
                check_known(p, &model, &["idle_power", "max_power"])?;
                (
                    optional(p, &model, "idle_power", 0.0)?,
                    required(p, &model, "max_power")?,
                )
            }
        };
        if idle_power < 0.0 || max_power < idle_power {
            return sim_error!(format!(
                "power model needs 0 <= idle_power <= max_power, got {idle_power} and {max_power}"
            ));
        }
        Ok(Self {
            kind: config.kind,
            idle_power,
            max_power,
        })
    }

    #[must_use]
    pub fn kind(&self) -> PowerModelKind {
        self.kind
    }

    #[must_use]
    pub fn idle_power(&self) -> f64 {
        self.idle_power
    }

    #[must_use]
    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    /// Power drawn in watts at `utilization`, which is clamped to `[0, 1]`.
    #[must_use]
    pub fn compute_power(&self, utilization: f64) -> f64 {
        let u = utilization.clamp(0.0, 1.0);
        let shape = match self.kind {
            PowerModelKind::Constant => 0.0,
            PowerModelKind::Linear => u,
            PowerModelKind::Square => u * u,
            PowerModelKind::Cubic => u * u * u,
            PowerModelKind::Sqrt => u.sqrt(),
        };
        self.idle_power + (self.max_power - self.idle_power) * shape
    }
}
