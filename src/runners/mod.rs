//! # Runners
//!
//! A runner is one configured workload exercising the pub/sub client. Each
//! `perf-*` declaration of a scenario becomes exactly one [`Runner`], decoded
//! once by [`create_runner`] into a variant-specific, strongly typed config.
//!
//! | `type`                       | Variant                         |
//! |------------------------------|---------------------------------|
//! | `single-user-event-emitter`  | [`RunnerKind::SingleEmitter`]   |
//! | `single-user-subscriber`     | [`RunnerKind::SingleSubscriber`]|
//! | `parallel-users-emit`        | [`RunnerKind::ParallelEmitters`]|
//! | `on-and-off-subscriber`      | [`RunnerKind::OnOffSubscriber`] |
//! | anything else                | [`RunnerKind::NoOp`]            |
//!
//! Every runner can describe itself through a line-logging callback and
//! execute against a [`ClientFactory`], producing a [`Report`].

use crate::{
    client::{ClientFactory, ClientOptions},
    error::{ClientError, ConfigError},
    logging::EVENT_PRINTER_TARGET,
    scenario::{RunnerDeclaration, Scenario},
    utils::{format_duration, format_message_rate},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub mod emitter;
pub mod on_off;
pub mod parallel;
pub mod subscriber;

pub use emitter::SingleEmitterConfig;
pub use on_off::OnOffSubscriberConfig;
pub use parallel::ParallelEmittersConfig;
pub use subscriber::SingleSubscriberConfig;

pub const SINGLE_EMITTER: &str = "single-user-event-emitter";
pub const SINGLE_SUBSCRIBER: &str = "single-user-subscriber";
pub const PARALLEL_EMITTERS: &str = "parallel-users-emit";
pub const ON_OFF_SUBSCRIBER: &str = "on-and-off-subscriber";

/// Sink for rendered lines.
pub type LineLogger<'a> = &'a mut dyn FnMut(&str);

/// What to do with a declaration whose `type` is missing or unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownTypePolicy {
    /// Run it as a no-op and log a warning
    #[default]
    NoOp,
    /// Fail with [`ConfigError::UnknownType`]
    Reject,
}

/// A decoded runner declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Runner {
    pub name: String,
    pub kind: RunnerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunnerKind {
    SingleEmitter(SingleEmitterConfig),
    SingleSubscriber(SingleSubscriberConfig),
    ParallelEmitters(ParallelEmittersConfig),
    OnOffSubscriber(OnOffSubscriberConfig),
    NoOp,
}

impl Runner {
    /// Human-readable name of the variant.
    pub fn title(&self) -> &'static str {
        match self.kind {
            RunnerKind::SingleEmitter(_) => "Single User Event Emitter",
            RunnerKind::SingleSubscriber(_) => "Single User Subscriber",
            RunnerKind::ParallelEmitters(_) => "Parallel Users Emit",
            RunnerKind::OnOffSubscriber(_) => "On And Off Subscriber",
            RunnerKind::NoOp => "Empty",
        }
    }

    /// Write a description of the runner, one line per call of `logger`.
    ///
    /// With `debug` set the decoded configuration is dumped as well.
    pub fn describe(&self, debug: bool, logger: LineLogger<'_>) {
        let purpose = match self.kind {
            RunnerKind::SingleEmitter(_) => {
                "Creates a single client that emits event at a regular pace"
            }
            RunnerKind::SingleSubscriber(_) => {
                "Creates a single client that subscribes to an event and does something with the data"
            }
            RunnerKind::ParallelEmitters(_) => {
                "Creates several clients that emit to a single event at a given frequency"
            }
            RunnerKind::OnOffSubscriber(_) => {
                "Creates a subscriber that repeatedly subscribes and unsubscribes"
            }
            RunnerKind::NoOp => {
                logger(self.title());
                return;
            }
        };

        logger(self.title());
        logger("");
        logger(purpose);

        if debug {
            let config = match &self.kind {
                RunnerKind::SingleEmitter(c) => serde_json::to_value(c),
                RunnerKind::SingleSubscriber(c) => serde_json::to_value(c),
                RunnerKind::ParallelEmitters(c) => serde_json::to_value(c),
                RunnerKind::OnOffSubscriber(c) => serde_json::to_value(c),
                RunnerKind::NoOp => Ok(Value::Null),
            };
            if let Ok(config) = config {
                log_data(logger, &config, "data", "");
            }
        }
    }

    /// Run the workload to completion.
    pub async fn execute(
        &self,
        factory: &dyn ClientFactory,
        options: &ClientOptions,
    ) -> Result<Report, ClientError> {
        info!("Runner '{}' starting ({})", self.name, self.title());
        let report = match &self.kind {
            RunnerKind::SingleEmitter(config) => emitter::run(config, factory, options).await?,
            RunnerKind::SingleSubscriber(config) => {
                subscriber::run(config, factory, options).await?
            }
            RunnerKind::ParallelEmitters(config) => parallel::run(config, factory, options).await?,
            RunnerKind::OnOffSubscriber(config) => on_off::run(config, factory, options).await?,
            RunnerKind::NoOp => Report::simple("empty"),
        };
        info!("Runner '{}' finished", self.name);
        Ok(report)
    }
}

/// Decode a declaration into a runner.
pub fn create_runner(
    declaration: &RunnerDeclaration,
    policy: UnknownTypePolicy,
) -> Result<Runner, ConfigError> {
    let kind = match declaration.kind() {
        Some(SINGLE_EMITTER) => RunnerKind::SingleEmitter(SingleEmitterConfig::decode(declaration)?),
        Some(SINGLE_SUBSCRIBER) => {
            RunnerKind::SingleSubscriber(SingleSubscriberConfig::decode(declaration)?)
        }
        Some(PARALLEL_EMITTERS) => {
            RunnerKind::ParallelEmitters(ParallelEmittersConfig::decode(declaration)?)
        }
        Some(ON_OFF_SUBSCRIBER) => {
            RunnerKind::OnOffSubscriber(OnOffSubscriberConfig::decode(declaration)?)
        }
        other => match policy {
            UnknownTypePolicy::NoOp => {
                warn!(
                    "Runner '{}' has unknown type {:?}, it will do nothing",
                    declaration.name, other
                );
                RunnerKind::NoOp
            }
            UnknownTypePolicy::Reject => {
                return Err(ConfigError::UnknownType {
                    runner: declaration.name.clone(),
                    kind: other.map(str::to_string),
                })
            }
        },
    };

    Ok(Runner {
        name: declaration.name.clone(),
        kind,
    })
}

/// Decode every declaration of a scenario, in order.
pub fn create_runners(
    scenario: &Scenario,
    policy: UnknownTypePolicy,
) -> Result<Vec<Runner>, ConfigError> {
    scenario
        .runners
        .iter()
        .map(|declaration| create_runner(declaration, policy))
        .collect()
}

/// Summary of a finished runner, rendered lazily.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    summary: String,
    elapsed: Option<Duration>,
    /// Messages emitted or received, used for the rate
    messages: Option<u64>,
}

impl Report {
    /// A single line with no timing information.
    pub fn simple(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            elapsed: None,
            messages: None,
        }
    }

    /// A summary plus the time the workload ran for.
    pub fn timed(summary: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            summary: summary.into(),
            elapsed: Some(elapsed),
            messages: None,
        }
    }

    /// A summary plus elapsed time and the message rate it implies.
    pub fn counted(summary: impl Into<String>, messages: u64, elapsed: Duration) -> Self {
        Self {
            summary: summary.into(),
            elapsed: Some(elapsed),
            messages: Some(messages),
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn describe(&self, logger: LineLogger<'_>) {
        logger(&self.summary);
        let Some(elapsed) = self.elapsed else {
            return;
        };
        match self.messages {
            Some(messages) if !elapsed.is_zero() => {
                let rate = messages as f64 / elapsed.as_secs_f64();
                logger(&format!(
                    "Elapsed {} ({})",
                    format_duration(elapsed),
                    format_message_rate(rate)
                ));
            }
            _ => logger(&format!("Elapsed {}", format_duration(elapsed))),
        }
    }

    /// The rendered report as owned lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.describe(&mut |line| lines.push(line.to_string()));
        lines
    }
}

/// What a subscriber does with each received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventHandlerKind {
    PrintData,
    Discard,
}

impl EventHandlerKind {
    pub fn from_name(runner: &str, name: &str) -> Result<Self, ConfigError> {
        match name {
            "print-data" => Ok(EventHandlerKind::PrintData),
            "discard" => Ok(EventHandlerKind::Discard),
            _ => Err(ConfigError::UnknownHandler {
                runner: runner.to_string(),
                handler: name.to_string(),
            }),
        }
    }

    pub fn handle(self, data: &Value) {
        if self == EventHandlerKind::PrintData {
            log_data(
                &mut |line| {
                    info!(target: EVENT_PRINTER_TARGET, "{:<20} {}", "EventPrinter |>", line)
                },
                data,
                "eventData",
                "",
            );
        }
    }
}

/// Recursively render a JSON value as indented `key = ...` lines.
///
/// Arrays and objects open with `key = [` / `key = {` and close on their own
/// line; nested entries are indented by three spaces per level. Scalars with
/// a key render as `key: <type> = <value>`, without a key as the bare value.
pub fn log_data(logger: LineLogger<'_>, data: &Value, key: &str, prefix: &str) {
    let nested = format!("{}   ", prefix);
    match data {
        Value::Array(items) => {
            logger(&format!("{}{} = [", prefix, key));
            for item in items {
                log_data(logger, item, "", &nested);
            }
            logger(&format!("{}]", prefix));
        }
        Value::Object(fields) => {
            logger(&format!("{}{} = {{", prefix, key));
            for (field, value) in fields {
                log_data(logger, value, field, &nested);
            }
            logger(&format!("{}}}", prefix));
        }
        scalar => {
            let rendered = match scalar {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if key.is_empty() {
                logger(&format!("{}{}", prefix, rendered));
            } else {
                logger(&format!(
                    "{}{}: {} = {}",
                    prefix,
                    key,
                    json_type_name(scalar),
                    rendered
                ));
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Sleep between two iterations of a paced loop. A zero interval still
/// yields so sibling tasks on the same worker get scheduled.
pub(crate) async fn pace(interval: Duration) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
    } else {
        sleep(interval).await;
    }
}

/// Decode the raw fields of a declaration into `T`.
pub(crate) fn decode_fields<T: DeserializeOwned>(
    declaration: &RunnerDeclaration,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(declaration.fields.clone())).map_err(|source| {
        ConfigError::InvalidDeclaration {
            runner: declaration.name.clone(),
            source,
        }
    })
}

/// A millisecond count written either as a JSON number or a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawMillis")]
pub(crate) struct Millis(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMillis {
    Number(u64),
    Text(String),
}

impl TryFrom<RawMillis> for Millis {
    type Error = String;

    fn try_from(raw: RawMillis) -> Result<Self, Self::Error> {
        match raw {
            RawMillis::Number(n) => Ok(Millis(n)),
            RawMillis::Text(text) => text
                .trim()
                .parse()
                .map(Millis)
                .map_err(|_| format!("\"{}\" is not a millisecond count", text)),
        }
    }
}
