//! Single client emitting one event at a fixed pace.

use super::{decode_fields, pace, Millis, Report};
use crate::{
    client::{connect_and_login, ClientFactory, ClientOptions},
    error::{ClientError, ConfigError},
    frequency::parse_frequency,
    scenario::RunnerDeclaration,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    event: String,
    frequency: String,
    #[serde(default)]
    data: Value,
    timeout_ms: Millis,
    wait_at_start_ms: Option<Millis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleEmitterConfig {
    pub event: String,
    pub data: Value,
    /// Pause between two emits, 0 for none
    pub frequency_ms: u64,
    pub timeout_ms: u64,
    pub wait_at_start_ms: u64,
}

impl SingleEmitterConfig {
    pub fn decode(declaration: &RunnerDeclaration) -> Result<Self, ConfigError> {
        let raw: RawConfig = decode_fields(declaration)?;
        let frequency_ms =
            parse_frequency(&raw.frequency).map_err(|source| ConfigError::Frequency {
                runner: declaration.name.clone(),
                source,
            })?;
        Ok(Self {
            event: raw.event,
            data: raw.data,
            frequency_ms,
            timeout_ms: raw.timeout_ms.0,
            wait_at_start_ms: raw.wait_at_start_ms.map_or(0, |m| m.0),
        })
    }
}

pub(crate) async fn run(
    config: &SingleEmitterConfig,
    factory: &dyn ClientFactory,
    options: &ClientOptions,
) -> Result<Report, ClientError> {
    if config.wait_at_start_ms > 0 {
        sleep(Duration::from_millis(config.wait_at_start_ms)).await;
    }
    let mut client = connect_and_login(factory, options).await?;

    let interval = Duration::from_millis(config.frequency_ms);
    let timeout = Duration::from_millis(config.timeout_ms);
    let start = Instant::now();
    let mut emitted: u64 = 0;

    let outcome: Result<(), ClientError> = async {
        while start.elapsed() < timeout {
            client.emit(&config.event, &config.data).await?;
            emitted += 1;
            pace(interval).await;
        }
        Ok(())
    }
    .await;
    let elapsed = start.elapsed();

    client.close().await?;
    outcome?;
    debug!("Emitted {} '{}' events in {:?}", emitted, config.event, elapsed);

    Ok(Report::counted(
        format!("Single User Event Emitter - Finished {} event emits", emitted),
        emitted,
        elapsed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalBus;
    use crate::runners::tests::declaration;
    use crate::runners::{create_runner, UnknownTypePolicy};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn config(frequency_ms: u64, timeout_ms: u64) -> SingleEmitterConfig {
        SingleEmitterConfig {
            event: "e".to_string(),
            data: json!({ "n": 1 }),
            frequency_ms,
            timeout_ms,
            wait_at_start_ms: 0,
        }
    }

    #[test]
    fn test_decode_defaults() {
        let decl = declaration(
            "demo",
            json!({ "type": "single-user-event-emitter", "event": "e", "frequency": "instant", "timeout-ms": 0 }),
        );
        let config = SingleEmitterConfig::decode(&decl).unwrap();
        assert_eq!(config.data, Value::Null);
        assert_eq!(config.wait_at_start_ms, 0);
        assert_eq!(config.frequency_ms, 0);
    }

    #[tokio::test]
    async fn test_instant_emitter_terminates_and_counts() {
        let bus = LocalBus::new();
        let listener = connect_and_login(&bus, &ClientOptions::new()).await.unwrap();
        let received = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&received);
        listener
            .subscribe(
                "e",
                Arc::new(move |_: &Value| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let report = run(&config(0, 1000), &bus, &ClientOptions::new())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_secs(5));

        let emitted = received.load(Ordering::SeqCst);
        assert!(emitted > 0);
        assert_eq!(
            report.summary(),
            format!("Single User Event Emitter - Finished {} event emits", emitted)
        );
    }

    #[tokio::test]
    async fn test_paced_emitter_respects_interval() {
        let bus = LocalBus::new();
        let report = run(&config(100, 450), &bus, &ClientOptions::new())
            .await
            .unwrap();
        // Emits at roughly 0, 100, 200, 300 and 400ms
        let count: u64 = report
            .summary()
            .split_whitespace()
            .nth(6)
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert!((3..=5).contains(&count), "unexpected emit count {}", count);
    }

    #[tokio::test]
    async fn test_zero_timeout_emits_nothing() {
        let bus = LocalBus::new();
        let report = run(&config(0, 0), &bus, &ClientOptions::new()).await.unwrap();
        assert_eq!(
            report.summary(),
            "Single User Event Emitter - Finished 0 event emits"
        );
    }

    #[tokio::test]
    async fn test_client_errors_propagate() {
        let bus = LocalBus::new();
        let mut bad = config(0, 100);
        bad.event = String::new();
        assert!(matches!(
            run(&bad, &bus, &ClientOptions::new()).await,
            Err(ClientError::InvalidEventName(_))
        ));

        let mut options = ClientOptions::new();
        options.insert("reject-login".to_string(), Value::Bool(true));
        assert!(matches!(
            run(&config(0, 100), &bus, &options).await,
            Err(ClientError::LoginRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_through_runner() {
        let decl = declaration(
            "demo",
            json!({ "type": "single-user-event-emitter", "event": "e", "frequency": "instant", "timeout-ms": 0 }),
        );
        let runner = create_runner(&decl, UnknownTypePolicy::NoOp).unwrap();
        let report = runner
            .execute(&LocalBus::new(), &ClientOptions::new())
            .await
            .unwrap();
        assert!(report.lines()[0].contains("Finished 0 event emits"));
    }
}
