//! Several clients emitting the same event in lockstep.

use super::{decode_fields, pace, Millis, Report};
use crate::{
    client::{connect_and_login, ClientFactory, ClientOptions},
    error::{ClientError, ConfigError},
    frequency::parse_frequency,
    scenario::RunnerDeclaration,
};
use futures::future::try_join_all;
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
    users: u64,
    #[serde(default)]
    data: Value,
    timeout_ms: Millis,
    wait_at_start_ms: Option<Millis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParallelEmittersConfig {
    pub event: String,
    pub data: Value,
    pub users: u64,
    /// Pause between two rounds, 0 for none
    pub frequency_ms: u64,
    pub timeout_ms: u64,
    pub wait_at_start_ms: u64,
}

impl ParallelEmittersConfig {
    pub fn decode(declaration: &RunnerDeclaration) -> Result<Self, ConfigError> {
        let raw: RawConfig = decode_fields(declaration)?;
        if raw.users == 0 {
            return Err(ConfigError::InvalidValue {
                runner: declaration.name.clone(),
                field: "users",
                reason: "must be at least 1".to_string(),
            });
        }
        let frequency_ms =
            parse_frequency(&raw.frequency).map_err(|source| ConfigError::Frequency {
                runner: declaration.name.clone(),
                source,
            })?;
        Ok(Self {
            event: raw.event,
            data: raw.data,
            users: raw.users,
            frequency_ms,
            timeout_ms: raw.timeout_ms.0,
            wait_at_start_ms: raw.wait_at_start_ms.map_or(0, |m| m.0),
        })
    }
}

pub(crate) async fn run(
    config: &ParallelEmittersConfig,
    factory: &dyn ClientFactory,
    options: &ClientOptions,
) -> Result<Report, ClientError> {
    if config.wait_at_start_ms > 0 {
        sleep(Duration::from_millis(config.wait_at_start_ms)).await;
    }

    let logins = (0..config.users).map(|_| connect_and_login(factory, options));
    let mut clients = try_join_all(logins).await?;
    debug!("{} clients logged in for '{}'", clients.len(), config.event);

    let interval = Duration::from_millis(config.frequency_ms);
    let timeout = Duration::from_millis(config.timeout_ms);
    let start = Instant::now();
    let mut emitted: u64 = 0;

    // A round only counts once every client's emit has gone through
    let outcome: Result<(), ClientError> = async {
        while start.elapsed() < timeout {
            try_join_all(
                clients
                    .iter()
                    .map(|client| client.emit(&config.event, &config.data)),
            )
            .await?;
            emitted += config.users;
            pace(interval).await;
        }
        Ok(())
    }
    .await;
    let elapsed = start.elapsed();

    try_join_all(clients.iter_mut().map(|client| client.close())).await?;
    outcome?;

    Ok(Report::counted(
        format!("Parallel Users Emit - Created {} events", emitted),
        emitted,
        elapsed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalBus;
    use crate::runners::tests::declaration;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_decode_requires_users() {
        let zero = declaration(
            "crowd",
            json!({ "type": "parallel-users-emit", "event": "e", "frequency": "instant", "users": 0, "timeout-ms": 1 }),
        );
        assert!(matches!(
            ParallelEmittersConfig::decode(&zero),
            Err(ConfigError::InvalidValue { field: "users", .. })
        ));

        let missing = declaration(
            "crowd",
            json!({ "type": "parallel-users-emit", "event": "e", "frequency": "instant", "timeout-ms": 1 }),
        );
        assert!(matches!(
            ParallelEmittersConfig::decode(&missing),
            Err(ConfigError::InvalidDeclaration { .. })
        ));
    }

    #[tokio::test]
    async fn test_counter_scales_with_users() {
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

        let config = ParallelEmittersConfig {
            event: "e".to_string(),
            data: Value::Null,
            users: 4,
            frequency_ms: 50,
            timeout_ms: 220,
            wait_at_start_ms: 0,
        };
        let report = run(&config, &bus, &ClientOptions::new()).await.unwrap();

        let delivered = received.load(Ordering::SeqCst);
        assert!(delivered > 0);
        assert_eq!(delivered % 4, 0);
        assert_eq!(
            report.summary(),
            format!("Parallel Users Emit - Created {} events", delivered)
        );
        // Only the listener is left once the emitters have closed
        assert_eq!(bus.subscriber_count("e"), 1);
    }

    #[tokio::test]
    async fn test_one_failed_login_fails_the_runner() {
        let bus = LocalBus::new();
        let mut options = ClientOptions::new();
        options.insert("reject-login".to_string(), Value::Bool(true));
        let config = ParallelEmittersConfig {
            event: "e".to_string(),
            data: Value::Null,
            users: 3,
            frequency_ms: 0,
            timeout_ms: 10,
            wait_at_start_ms: 0,
        };
        assert!(matches!(
            run(&config, &bus, &options).await,
            Err(ClientError::LoginRejected(_))
        ));
    }
}
