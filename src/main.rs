//! # deepstream Benchmark Runner - Main Entry Point
//!
//! One binary, two roles:
//!
//! - **Coordinator** (`deepstream-bench <scenario>`): describes every runner,
//!   executes them all, and prints the results
//! - **Worker** (`deepstream-bench <scenario> <runner>`): executes a single
//!   runner and writes its outcome as one JSON line on stdout
//!
//! ## Exit Codes
//!
//! - `0`: the run completed, even if individual runners failed
//! - `255`: bad arguments, an unreadable or invalid scenario, or a worker
//!   asked for a runner it cannot build

use clap::Parser;
use deepstream_bench::{
    cli::{Args, RunSettings},
    client::LocalBus,
    coordination::{run_worker, Coordinator, WorkerExit},
    defaults::FAILURE_EXIT_CODE,
    logging,
    results::ConsoleReporter,
    scenario::Scenario,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { FAILURE_EXIT_CODE } else { 0 };
            // Printing usage can only fail if the terminal is gone
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    logging::init(args.verbose, args.runner.clone());

    if !args.scenario.is_file() {
        eprintln!(
            "{} is not a valid file path. Please provide a valid scenario file.",
            args.scenario.display()
        );
        return ExitCode::from(FAILURE_EXIT_CODE);
    }

    let scenario = match Scenario::from_file(&args.scenario) {
        Ok(scenario) => scenario,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            return ExitCode::from(FAILURE_EXIT_CODE);
        }
    };

    let settings = RunSettings::from(&args);
    let result = match args.runner.as_deref() {
        Some(runner) => worker(&scenario, runner, &settings).await,
        None => coordinate(scenario, settings).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

async fn coordinate(scenario: Scenario, settings: RunSettings) -> anyhow::Result<ExitCode> {
    info!("Starting deepstream benchmark runner v{}", deepstream_bench::VERSION);
    let coordinator = Coordinator::new(scenario, settings, Arc::new(LocalBus::new()))?;
    coordinator.run(&mut ConsoleReporter::stdout()).await?;
    Ok(ExitCode::SUCCESS)
}

async fn worker(scenario: &Scenario, runner: &str, settings: &RunSettings) -> anyhow::Result<ExitCode> {
    let mut stdout = std::io::stdout();
    let exit = run_worker(scenario, runner, settings, &LocalBus::new(), &mut stdout).await?;
    Ok(match exit {
        WorkerExit::Reported => ExitCode::SUCCESS,
        WorkerExit::Rejected => ExitCode::from(FAILURE_EXIT_CODE),
    })
}
