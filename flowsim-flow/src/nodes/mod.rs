// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Node behaviours provided with the kernel.

pub mod consumer;
pub mod distributor;
pub mod supplier;
pub mod workload;
