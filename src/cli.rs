use crate::runners::UnknownTypePolicy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// deepstream benchmark runner - drive pub/sub workloads described in a JSON scenario
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Scenario file describing the runners
    pub scenario: PathBuf,

    /// Run only this runner and report back to a coordinator (worker mode)
    pub runner: Option<String>,

    /// How the coordinator executes runners
    #[clap(long, value_enum, default_value_t = ExecutionMode::Subprocess)]
    pub mode: ExecutionMode,

    /// Dump each runner's decoded configuration when describing it.
    ///
    /// `RUNNERS_DEBUG_MODE` is read as a toggle: empty, `0` and `false` are
    /// off, any other value is on.
    #[clap(
        long,
        env = "RUNNERS_DEBUG_MODE",
        action = clap::ArgAction::Set,
        value_parser = parse_toggle,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub debug: bool,

    /// Do not print progress dots while runners are working.
    ///
    /// `NON_VERBOSE_DOTS` follows the same toggle rules as
    /// `RUNNERS_DEBUG_MODE`, so `yes` turns the dots off.
    #[clap(
        long,
        env = "NON_VERBOSE_DOTS",
        action = clap::ArgAction::Set,
        value_parser = parse_toggle,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub quiet: bool,

    /// Fail on runners with a missing or unknown type instead of skipping them
    #[clap(long, default_value_t = false)]
    pub strict_types: bool,

    /// Give up on runners that have not reported after this long
    #[clap(long, value_parser = parse_duration, default_value = "10m")]
    pub worker_timeout: Duration,

    /// Pause between the last runner finishing and printing results
    #[clap(long, value_parser = parse_duration, default_value = "2s")]
    pub grace_period: Duration,

    /// Run identifier shared between a coordinator and its workers
    #[clap(long, hide = true)]
    pub run_id: Option<String>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// Where runners execute
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// All runners as tasks of this process
    #[clap(name = "in-process")]
    InProcess,

    /// One worker process per runner
    #[clap(name = "subprocess")]
    Subprocess,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::InProcess => write!(f, "in-process"),
            ExecutionMode::Subprocess => write!(f, "subprocess"),
        }
    }
}

/// Settings for one invocation, handed explicitly to the coordinator,
/// workers and runners
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSettings {
    pub mode: ExecutionMode,
    pub debug: bool,
    pub quiet: bool,
    pub unknown_types: UnknownTypePolicy,
    /// Deadline for every runner, measured from the start of execution
    pub worker_timeout: Duration,
    pub grace_period: Duration,
    pub progress_tick: Duration,
    pub run_id: String,
    /// Binary to spawn for workers; resolved from the current executable when unset
    pub worker_exe: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Subprocess,
            debug: false,
            quiet: false,
            unknown_types: UnknownTypePolicy::NoOp,
            worker_timeout: crate::defaults::WORKER_TIMEOUT,
            grace_period: crate::defaults::GRACE_PERIOD,
            progress_tick: crate::defaults::PROGRESS_TICK,
            run_id: crate::utils::generate_run_id(),
            worker_exe: None,
        }
    }
}

impl From<&Args> for RunSettings {
    fn from(args: &Args) -> Self {
        Self {
            mode: args.mode,
            debug: args.debug,
            quiet: args.quiet,
            unknown_types: if args.strict_types {
                UnknownTypePolicy::Reject
            } else {
                UnknownTypePolicy::NoOp
            },
            worker_timeout: args.worker_timeout,
            grace_period: args.grace_period,
            progress_tick: crate::defaults::PROGRESS_TICK,
            run_id: args
                .run_id
                .clone()
                .unwrap_or_else(crate::utils::generate_run_id),
            worker_exe: None,
        }
    }
}

/// Interpret an environment-style toggle. Empty, `0` and `false` are off,
/// anything else is on.
fn parse_toggle(s: &str) -> Result<bool, String> {
    let s = s.trim();
    Ok(!(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")))
}

/// Parse a duration such as `"500ms"`, `"2s"`, `"0.5s"`, `"10m"` or `"1h"`.
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    // (number, seconds per unit, units per second)
    let (num_str, mul, div) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1.0, 1000.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1.0, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0, 1.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600.0, 1.0)
    } else {
        (s, 1.0, 1.0)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    Duration::try_from_secs_f64(num * mul / div)
        .map_err(|e| format!("Duration '{}' is out of range: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("inf").is_err());
        assert!(parse_duration("1e30s").is_err());
        assert!(parse_duration("NaNms").is_err());
    }

    #[test]
    fn test_parse_toggle() {
        assert_eq!(parse_toggle("1"), Ok(true));
        assert_eq!(parse_toggle("yes"), Ok(true));
        assert_eq!(parse_toggle("0"), Ok(false));
        assert_eq!(parse_toggle("FALSE"), Ok(false));
        assert_eq!(parse_toggle(""), Ok(false));
    }

    #[test]
    fn test_coordinator_and_worker_arguments() {
        let args = Args::try_parse_from(["deepstream-bench", "scenario.json"]).unwrap();
        assert_eq!(args.scenario, PathBuf::from("scenario.json"));
        assert_eq!(args.runner, None);
        assert_eq!(args.mode, ExecutionMode::Subprocess);
        assert_eq!(args.grace_period, Duration::from_secs(2));

        let args = Args::try_parse_from([
            "deepstream-bench",
            "--mode",
            "in-process",
            "--strict-types",
            "--debug",
            "--grace-period",
            "0s",
            "scenario.json",
            "emitter",
        ])
        .unwrap();
        assert_eq!(args.runner.as_deref(), Some("emitter"));

        assert!(args.debug);

        let settings = RunSettings::from(&args);
        assert_eq!(settings.mode, ExecutionMode::InProcess);
        assert_eq!(settings.unknown_types, UnknownTypePolicy::Reject);
        assert_eq!(settings.grace_period, Duration::ZERO);
    }

    #[test]
    fn test_toggle_flags_and_defaults() {
        Args::command().debug_assert();

        let args = Args::try_parse_from(["deepstream-bench", "--quiet", "s.json"]).unwrap();
        assert!(args.quiet);
        assert_eq!(args.scenario, PathBuf::from("s.json"));

        let args =
            Args::try_parse_from(["deepstream-bench", "--debug=0", "--quiet=yes", "s.json"]).unwrap();
        assert!(!args.debug);
        assert!(args.quiet);

        let err = Args::try_parse_from(["deepstream-bench", "--grace-period", "1e30s", "s.json"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_too_many_positionals_rejected() {
        assert!(Args::try_parse_from(["deepstream-bench", "a", "b", "c"]).is_err());
        assert!(Args::try_parse_from(["deepstream-bench"]).is_err());
    }

    #[test]
    fn test_execution_mode_display() {
        assert_eq!(ExecutionMode::InProcess.to_string(), "in-process");
        assert_eq!(ExecutionMode::Subprocess.to_string(), "subprocess");
    }
}
