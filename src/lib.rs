//! # deepstream Benchmark Runner Library
//!
//! Drives pub/sub workloads described in a JSON scenario file and prints a
//! report per workload.
//!
//! ## Runner Types
//!
//! - **Single user event emitter**: one client emitting an event at a pace
//! - **Single user subscriber**: one client counting (and optionally
//!   printing) received events
//! - **Parallel users emit**: several clients emitting in lockstep rounds
//! - **On and off subscriber**: one client repeatedly subscribing and
//!   unsubscribing
//!
//! ## Architecture Overview
//!
//! - `scenario`: loading the scenario document and selecting `perf-*` keys
//! - `runners`: decoding declarations into typed runners and executing them
//! - `client`: the pub/sub client boundary and the in-process loopback bus
//! - `coordination`: running every runner (as tasks or worker processes)
//!   and gathering outcomes
//! - `results`: runner outcomes and console rendering
//! - `cli`: command-line parsing and run settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use deepstream_bench::{ConsoleReporter, Coordinator, ExecutionMode, LocalBus, RunSettings, Scenario};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scenario = Scenario::from_file("scenario.json")?;
//!     let settings = RunSettings {
//!         mode: ExecutionMode::InProcess,
//!         ..RunSettings::default()
//!     };
//!     let coordinator = Coordinator::new(scenario, settings, Arc::new(LocalBus::new()))?;
//!     let outcomes = coordinator.run(&mut ConsoleReporter::stdout()).await?;
//!     println!("{} runner(s) finished", outcomes.len());
//!     Ok(())
//! }
//! ```

/// Command-line interface and run settings
pub mod cli;

/// Pub/sub client traits and the loopback bus
pub mod client;

/// Running a whole scenario, or a single runner as a worker
pub mod coordination;

pub mod error;

/// Frequency strings such as `"5 per second"`
pub mod frequency;

pub mod logging;

/// Runner outcomes and console output
pub mod results;

/// Workload variants
pub mod runners;

/// Scenario file loading
pub mod scenario;

pub mod utils;

pub use cli::{Args, ExecutionMode, RunSettings};
pub use client::{ClientFactory, LocalBus, PubSubClient};
pub use coordination::{run_worker, Coordinator, WorkerExit};
pub use error::{ClientError, ConfigError, FrequencyError, ScenarioError};
pub use results::{ConsoleReporter, RunnerOutcome};
pub use runners::{create_runner, create_runners, Report, Runner, RunnerKind, UnknownTypePolicy};
pub use scenario::Scenario;

/// The current version of the benchmark runner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Pause between the last runner finishing and printing results
    pub const GRACE_PERIOD: Duration = Duration::from_secs(2);

    /// Interval between progress dots
    pub const PROGRESS_TICK: Duration = Duration::from_secs(1);

    /// Deadline for a runner to report
    pub const WORKER_TIMEOUT: Duration = Duration::from_secs(600);

    /// Exit code for unusable arguments or scenario files, and for workers
    /// that could not start their runner
    pub const FAILURE_EXIT_CODE: u8 = 255;
}
