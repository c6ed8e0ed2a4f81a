//! # Runner Coordination Module
//!
//! Drives every runner of a scenario to completion and gathers one
//! [`RunnerOutcome`] per runner, in declaration order.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │     Coordinator      │ spawn  │  Worker (runner "a") │
//! │  - describes runners │───────►│  - re-parses scenario│
//! │  - one completion    │        │  - runs one runner   │
//! │    future per runner │◄───────│  - one JSON line on  │
//! │  - deadline + kill   │ stdout │    stdout            │
//! │  - prints results    │        └──────────────────────┘
//! └──────────────────────┘
//! ```
//!
//! ## Execution Modes
//!
//! - **In-process**: each runner is a tokio task in the coordinator
//! - **Subprocess**: each runner is a separate worker process running this
//!   same binary with `<scenario> <runner-name>`
//!
//! Either way the coordinator waits on one completion future per runner.
//! All futures share a deadline; a runner that misses it is cancelled (its
//! task aborted or its process killed) and reported as failed. Progress dots
//! are printed on a fixed tick while the futures are pending and never delay
//! their completion.

use crate::{
    cli::{ExecutionMode, RunSettings},
    client::{ClientFactory, ClientOptions},
    results::{ConsoleReporter, RunnerOutcome},
    runners::{create_runner, create_runners, Runner, UnknownTypePolicy},
    scenario::Scenario,
    utils::format_duration,
};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::{interval, sleep, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Name of the binary spawned for workers.
const WORKER_BINARY: &str = "deepstream-bench";

/// Coordinates one benchmark run
pub struct Coordinator {
    scenario: Scenario,
    runners: Vec<Runner>,
    settings: RunSettings,
    factory: Arc<dyn ClientFactory>,
}

impl Coordinator {
    /// Decode every runner of the scenario.
    ///
    /// Fails before anything runs if a declaration is invalid.
    pub fn new(
        scenario: Scenario,
        settings: RunSettings,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self> {
        let runners = create_runners(&scenario, settings.unknown_types)?;
        Ok(Self {
            scenario,
            runners,
            settings,
            factory,
        })
    }

    pub fn runners(&self) -> &[Runner] {
        &self.runners
    }

    /// Describe, execute and report every runner.
    pub async fn run<W: Write>(&self, reporter: &mut ConsoleReporter<W>) -> Result<Vec<RunnerOutcome>> {
        reporter.print_description(&self.scenario.description)?;
        reporter.print_runners(&self.runners, self.settings.debug)?;

        let started_at = Utc::now();
        info!(
            "Run {} starting {} runner(s) in {} mode",
            self.settings.run_id,
            self.runners.len(),
            self.settings.mode
        );
        reporter.print_start(&format!(
            "Run {} started at {} ({} mode, {} against {})",
            self.settings.run_id,
            started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.settings.mode,
            plural(self.runners.len(), "runner"),
            self.factory.name()
        ))?;

        let deadline = Instant::now() + self.settings.worker_timeout;
        let pending = match self.settings.mode {
            ExecutionMode::InProcess => self.start_tasks(deadline),
            ExecutionMode::Subprocess => self.start_workers(deadline)?,
        };

        let outcomes = self.collect(pending, reporter).await?;

        if !self.settings.grace_period.is_zero() {
            debug!("Waiting {:?} before printing results", self.settings.grace_period);
            sleep(self.settings.grace_period).await;
        }

        reporter.print_results(&self.runners, &outcomes)?;
        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(
            "Run {} finished in {}, {} failed",
            self.settings.run_id,
            format_duration((Utc::now() - started_at).to_std().unwrap_or_default()),
            plural(failed, "runner")
        );
        Ok(outcomes)
    }

    /// Wait for every completion future, ticking progress meanwhile.
    async fn collect<W: Write>(
        &self,
        pending: Vec<BoxFuture<'static, RunnerOutcome>>,
        reporter: &mut ConsoleReporter<W>,
    ) -> Result<Vec<RunnerOutcome>> {
        // join_all keeps the input order, so outcome i belongs to runner i
        let all = join_all(pending);
        tokio::pin!(all);

        let mut ticker = interval(self.settings.progress_tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                outcomes = &mut all => return Ok(outcomes),
                _ = ticker.tick() => {
                    ticks += 1;
                    if !self.settings.quiet {
                        reporter.print_progress(ticks)?;
                    }
                }
            }
        }
    }

    /// Run every runner as a task of this process.
    fn start_tasks(&self, deadline: Instant) -> Vec<BoxFuture<'static, RunnerOutcome>> {
        self.runners
            .iter()
            .map(|runner| {
                let runner = runner.clone();
                let factory = Arc::clone(&self.factory);
                let options = self.scenario.options.clone();
                let name = runner.name.clone();
                let mut handle =
                    tokio::spawn(async move { runner.execute(factory.as_ref(), &options).await });

                async move {
                    match timeout_at(deadline, &mut handle).await {
                        Ok(Ok(Ok(report))) => RunnerOutcome::from_report(&report),
                        Ok(Ok(Err(e))) => {
                            warn!("Runner '{}' failed: {}", name, e);
                            RunnerOutcome::from_error(&e)
                        }
                        Ok(Err(join_error)) => {
                            RunnerOutcome::failure(format!("Runner {} crashed: {}", name, join_error))
                        }
                        Err(_) => {
                            handle.abort();
                            warn!("Runner '{}' missed the deadline and was cancelled", name);
                            RunnerOutcome::failure(format!("Runner {} timed out", name))
                        }
                    }
                }
                .boxed()
            })
            .collect()
    }

    /// Spawn one worker process per runner.
    fn start_workers(&self, deadline: Instant) -> Result<Vec<BoxFuture<'static, RunnerOutcome>>> {
        let exe = resolve_worker_exe(self.settings.worker_exe.as_deref())?;
        let mut pending = Vec::with_capacity(self.runners.len());

        for runner in &self.runners {
            let mut child = self.spawn_worker(&exe, &runner.name)?;
            let stdout = child.stdout.take();
            let name = runner.name.clone();

            pending.push(
                async move {
                    match timeout_at(deadline, wait_for_outcome(&mut child, stdout, &name)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!("Worker '{}' missed the deadline and will be killed", name);
                            if let Err(e) = child.kill().await {
                                warn!("Failed to kill worker '{}': {}", name, e);
                            }
                            RunnerOutcome::failure(format!("Runner {} timed out", name))
                        }
                    }
                }
                .boxed(),
            );
        }

        Ok(pending)
    }

    fn spawn_worker(&self, exe: &Path, runner_name: &str) -> Result<Child> {
        let mut cmd = Command::new(exe);
        cmd.arg(&self.scenario.path)
            .arg(runner_name)
            .arg("--run-id")
            .arg(&self.settings.run_id);
        if self.settings.debug {
            cmd.arg("--debug");
        }
        if self.settings.unknown_types == UnknownTypePolicy::Reject {
            cmd.arg("--strict-types");
        }

        // Stdout carries the outcome message, logs go straight to our stderr
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        debug!("Spawning worker {:?} for runner '{}'", exe, runner_name);
        cmd.spawn()
            .with_context(|| format!("Failed to spawn worker for runner '{}'", runner_name))
    }
}

/// Read a worker's stdout until it closes, then reap the process.
///
/// The first line that parses as a [`RunnerOutcome`] is the worker's
/// message; anything else is logged and ignored.
async fn wait_for_outcome(
    child: &mut Child,
    stdout: Option<ChildStdout>,
    name: &str,
) -> RunnerOutcome {
    let mut message = None;

    if let Some(stdout) = stdout {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if message.is_none() {
                        message = RunnerOutcome::from_json_line(&line);
                        if message.is_some() {
                            continue;
                        }
                    }
                    debug!("worker '{}' stdout: {}", name, line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed reading output of worker '{}': {}", name, e);
                    break;
                }
            }
        }
    }

    let status = child.wait().await;
    match (message, status) {
        (Some(outcome), _) => outcome,
        (None, Ok(status)) => RunnerOutcome::failure(format!(
            "Runner {} exited ({}) without reporting a result",
            name, status
        )),
        (None, Err(e)) => {
            RunnerOutcome::failure(format!("Runner {} could not be awaited: {}", name, e))
        }
    }
}

/// How a worker invocation ended, for the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The runner ran and its outcome (success or not) was reported
    Reported,
    /// The runner could not be found or decoded; a failure was reported
    Rejected,
}

/// Run a single named runner and write its outcome as one JSON line to `out`.
pub async fn run_worker<W: Write>(
    scenario: &Scenario,
    runner_name: &str,
    settings: &RunSettings,
    factory: &dyn ClientFactory,
    out: &mut W,
) -> Result<WorkerExit> {
    info!("Worker for runner '{}' (run {})", runner_name, settings.run_id);

    let Some((_, declaration)) = scenario.find_runner(runner_name) else {
        let outcome = RunnerOutcome::failure(format!(
            "Runner {} does not exist in {}",
            runner_name,
            scenario.path.display()
        ));
        send_outcome(out, &outcome)?;
        return Ok(WorkerExit::Rejected);
    };

    let runner = match create_runner(declaration, settings.unknown_types) {
        Ok(runner) => runner,
        Err(e) => {
            send_outcome(out, &RunnerOutcome::failure(e.to_string()))?;
            return Ok(WorkerExit::Rejected);
        }
    };

    let options: &ClientOptions = &scenario.options;
    let outcome = match runner.execute(factory, options).await {
        Ok(report) => RunnerOutcome::from_report(&report),
        Err(e) => {
            warn!("Runner '{}' failed: {}", runner_name, e);
            RunnerOutcome::from_error(&e)
        }
    };
    send_outcome(out, &outcome)?;
    Ok(WorkerExit::Reported)
}

fn send_outcome<W: Write>(out: &mut W, outcome: &RunnerOutcome) -> Result<()> {
    writeln!(out, "{}", outcome.to_json_line()?)?;
    out.flush().context("Failed to deliver runner outcome")?;
    Ok(())
}

/// Find the binary to run workers with.
///
/// Under `cargo test` the current executable is the test harness, not this
/// binary, so fall back to Cargo's binary path variable and then to the
/// debug build directory.
fn resolve_worker_exe(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let current_exe = std::env::current_exe().context("Failed to get current executable path")?;
    let current_name = current_exe.file_stem().and_then(|n| n.to_str());
    if current_name == Some(WORKER_BINARY) {
        return Ok(current_exe);
    }

    if let Ok(p) = std::env::var("CARGO_BIN_EXE_deepstream-bench") {
        let pbuf = PathBuf::from(p);
        if pbuf.exists() {
            return Ok(pbuf);
        }
    }

    let fallback = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join("debug")
        .join(format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX));
    if fallback.exists() {
        return Ok(fallback);
    }

    Err(anyhow!(
        "Could not resolve '{}' binary for worker processes. Build it with \
         `cargo build --bin {}` first.",
        WORKER_BINARY,
        WORKER_BINARY
    ))
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}
