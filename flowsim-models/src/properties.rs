// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Named numeric properties used to parameterise models.

use std::collections::BTreeMap;

use flowsim_engine::sim_error;
use flowsim_engine::types::SimError;

pub type Properties = BTreeMap<String, f64>;

/// Look up a property that the model cannot be built without.
pub fn required(properties: &Properties, model: &str, name: &str) -> Result<f64, SimError> {
    match properties.get(name) {
        Some(value) if value.is_finite() => Ok(*value),
        Some(value) => sim_error!(format!("{model}: property '{name}' is not finite ({value})")),
        None => sim_error!(format!("{model}: missing required property '{name}'")),
    }
}

/// Look up an optional property, falling back to `default`.
pub fn optional(
    properties: &Properties,
    model: &str,
    name: &str,
    default: f64,
) -> Result<f64, SimError> {
    match properties.get(name) {
        Some(_) => required(properties, model, name),
        None => Ok(default),
    }
}

/// Reject any property the model does not understand.
pub fn check_known(
    properties: &Properties,
    model: &str,
    known: &[&str],
) -> Result<(), SimError> {
    match properties.keys().find(|key| !known.contains(&key.as_str())) {
        Some(key) => sim_error!(format!("{model}: unknown property '{key}'")),
        None => Ok(()),
    }
}
