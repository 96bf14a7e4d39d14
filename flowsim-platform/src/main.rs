// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Run a datacenter scenario and report how its hosts and workloads fared.
//!
//! For example, run using:
//!   cargo run --bin flowsim -- flowsim-platform/scenarios/two_hosts.yaml
//! --stdout --stdout-level debug

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use flowsim_engine::engine::Engine;
use flowsim_platform::Datacenter;
use flowsim_track::builder::{TrackerConfig, setup_trackers};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Application to run a datacenter flow simulation scenario")]
struct Cli {
    /// Scenario file
    scenario: String,

    /// Enable logging to the console.
    #[arg(long, default_value = "false")]
    stdout: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entites should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Write the log to this file instead of the console.
    #[arg(long)]
    log_file: Option<String>,

    /// Stop the simulation at this time even if workloads remain.
    #[arg(long)]
    finish_ms: Option<u64>,

    /// Fail if any workload has not completed by the end of the run.
    #[arg(long)]
    check_complete: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let tracker = setup_trackers(&TrackerConfig {
        enable: args.stdout || args.log_file.is_some(),
        level: args.stdout_level,
        filter_regex: &args.stdout_filter_regex,
        file: args.log_file.as_deref(),
    })?;

    let mut engine = Engine::new(&tracker);
    let datacenter = Datacenter::from_file(&engine, Path::new(&args.scenario))?;

    println!("Loaded scenario:");
    println!("{datacenter}");

    match args.finish_ms {
        Some(finish_ms) => engine.run_until(finish_ms)?,
        None => engine.run()?,
    }

    println!("Ran simulation. Time now {}ms", engine.time_now_ms());
    println!("\nHosts:");
    for report in datacenter.host_reports()? {
        println!("  {report}");
    }
    println!("\nWorkloads:");
    for report in datacenter.workload_reports()? {
        println!("  {report}");
    }

    if args.check_complete {
        datacenter.check_workloads_complete()?;
    }
    Ok(())
}
