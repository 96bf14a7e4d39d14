// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Pluggable models used by flow simulations of a datacenter.
//!
//! Each model is configured by a selector and a bag of named numeric
//! properties, which is resolved once when the model is built:
//!
//! ```rust
//! use flowsim_models::config::ModelConfig;
//! use flowsim_models::overhead::{VirtualizationOverhead, VirtualizationOverheadKind};
//!
//! let config: ModelConfig<VirtualizationOverheadKind> =
//!     ModelConfig::new(VirtualizationOverheadKind::ShareBased);
//! let overhead = VirtualizationOverhead::from_config(&config).unwrap();
//! assert_eq!(overhead.get_supply(100.0, 4), 25.0);
//! ```
//!
//! The [HostMonitor](crate::monitor::HostMonitor) combines a
//! [PowerModel](crate::power::PowerModel) and an optional
//! [ThermalModel](crate::thermal::ThermalModel) to sample a host over time.

pub mod config;
pub mod monitor;
pub mod overhead;
pub mod power;
pub mod properties;
pub mod thermal;
