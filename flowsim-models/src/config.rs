// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Configuration sections shared by all models.
//!
//! A section names the model with `kind` and parameterises it with a map of
//! `properties`:
//!
//! ```yaml
//! kind: constant
//! properties:
//!   percentage_overhead: 0.1
//! ```

use serde::Deserialize;

use crate::properties::Properties;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig<K> {
    pub kind: K,
    #[serde(default)]
    pub properties: Properties,
}

impl<K> ModelConfig<K> {
    #[must_use]
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: &str, value: f64) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }
}
