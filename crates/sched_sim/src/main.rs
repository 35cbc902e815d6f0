use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::info;
use sched_core::Scheduler;
use sched_sim::{KernelLogger, Simulator, Workload};

/// Replays a workload against the scheduler and writes the execution log.
///
/// The workload is a JSON document naming the scheduling algorithm (FCFS,
/// RR, Priority or Multilevel), the processes with their arrival times, CPU
/// demands and behavior events, and the semaphores and mutexes they share.
#[derive(Debug, Parser)]
#[command(name = "sched-sim")]
struct Opts {
    /// Path to the JSON workload description.
    workload: PathBuf,

    /// Path the execution log is written to.
    log: PathBuf,

    /// Enable verbose output. Specify multiple times to increase verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Leave the scheduler's own messages out of the execution log. By
    /// default they are written next to the driver's lines with a `#`
    /// delimiter.
    #[clap(long)]
    no_kernel_logs: bool,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let llv = match opts.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = Vec::new();
    loggers.push(simplelog::TermLogger::new(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ));
    if !opts.no_kernel_logs {
        loggers.push(KernelLogger::new(simplelog::LevelFilter::Debug));
    }
    simplelog::CombinedLogger::init(loggers)?;

    let workload = Workload::load(&opts.workload)
        .with_context(|| format!("Failed to load workload {}", opts.workload.display()))?;
    info!(
        "Simulating {} processes under {}",
        workload.processes.len(),
        workload.scheduling_algorithm
    );

    let out = File::create(&opts.log)
        .with_context(|| format!("Failed to create log {}", opts.log.display()))?;
    let kernel = Scheduler::new(workload.scheduling_algorithm);
    let stats = Simulator::new(workload, kernel, BufWriter::new(out))
        .with_kernel_logs(!opts.no_kernel_logs)
        .run()
        .context("Simulation failed")?;

    info!(
        "Finished at {:.3}s: {} processes, {} context switches, {:.3}s idle",
        stats.finished_at as f64 / 1000.0,
        stats.processes,
        stats.context_switches,
        stats.idle_time as f64 / 1000.0
    );
    Ok(())
}
