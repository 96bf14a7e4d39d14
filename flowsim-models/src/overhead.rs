// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Virtualization overhead applied to the supply a host grants its guests.
//!
//! The overhead sits between a distributor and its consumers: each
//! allocation is reduced before it is pushed to the consumer.
//!
//! | kind          | supply                               |
//! |---------------|--------------------------------------|
//! | `none`        | `demand`                             |
//! | `constant`    | `demand * (1 - percentage_overhead)` |
//! | `share_based` | `demand / max(consumer_count, 1)`    |

use std::fmt;
use std::str::FromStr;

use flowsim_engine::sim_error;
use flowsim_engine::types::SimError;
use flowsim_flow::nodes::distributor::SupplyAdjust;
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::properties::{check_known, optional};

/// Overhead used by a `constant` model when no percentage is configured.
pub const DEFAULT_PERCENTAGE_OVERHEAD: f64 = 0.05;

/// Property value that also selects [`DEFAULT_PERCENTAGE_OVERHEAD`].
const UNSET_PERCENTAGE: f64 = -1.0;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VirtualizationOverheadKind {
    #[default]
    None,
    Constant,
    ShareBased,
}

impl FromStr for VirtualizationOverheadKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "constant" => Ok(Self::Constant),
            "share_based" => Ok(Self::ShareBased),
            _ => sim_error!(format!("unknown virtualization overhead kind '{s}'")),
        }
    }
}

impl fmt::Display for VirtualizationOverheadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Constant => write!(f, "constant"),
            Self::ShareBased => write!(f, "share_based"),
        }
    }
}

/// A resolved overhead model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VirtualizationOverhead {
    None,
    Constant { percentage: f64 },
    ShareBased,
}

impl VirtualizationOverhead {
    pub fn from_config(
        config: &ModelConfig<VirtualizationOverheadKind>,
    ) -> Result<Self, SimError> {
        match config.kind {
            VirtualizationOverheadKind::None => {
                check_known(&config.properties, "no overhead", &[])?;
                Ok(Self::None)
            }
            VirtualizationOverheadKind::ShareBased => {
                check_known(&config.properties, "share based overhead", &[])?;
                Ok(Self::ShareBased)
            }
            VirtualizationOverheadKind::Constant => {
                check_known(
                    &config.properties,
                    "constant overhead",
                    &["percentage_overhead"],
                )?;
                let mut percentage = optional(
                    &config.properties,
                    "constant overhead",
                    "percentage_overhead",
                    UNSET_PERCENTAGE,
                )?;
                if percentage == UNSET_PERCENTAGE {
                    percentage = DEFAULT_PERCENTAGE_OVERHEAD;
                }
                if !(0.0..=1.0).contains(&percentage) {
                    return sim_error!(format!(
                        "constant overhead: percentage_overhead {percentage} is not within [0, 1]"
                    ));
                }
                Ok(Self::Constant { percentage })
            }
        }
    }

    /// Supply granted for `demand` when the host serves `consumer_count`
    /// consumers.
    #[must_use]
    pub fn get_supply(&self, demand: f64, consumer_count: usize) -> f64 {
        match self {
            Self::None => demand,
            Self::Constant { percentage } => demand * (1.0 - percentage),
            Self::ShareBased => demand / consumer_count.max(1) as f64,
        }
    }
}

impl SupplyAdjust for VirtualizationOverhead {
    fn adjust(&self, allocation: f64, consumer_count: usize) -> f64 {
        self.get_supply(allocation, consumer_count)
    }
}
