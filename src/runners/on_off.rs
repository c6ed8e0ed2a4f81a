//! Single client that keeps subscribing and unsubscribing.
//!
//! `timeout-ms` is used three ways: as the overall run time, as the time a
//! subscription is held, and as the pause after unsubscribing. One cycle
//! therefore takes twice the timeout and at most one cycle runs when the
//! timeout is non-zero.

use super::{decode_fields, EventHandlerKind, Millis, Report};
use crate::{
    client::{connect_and_login, ClientFactory, ClientOptions, EventCallback},
    error::{ClientError, ConfigError},
    frequency::parse_frequency,
    scenario::RunnerDeclaration,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    event: String,
    on_event: Option<String>,
    frequency: Option<String>,
    timeout_ms: Millis,
    wait_at_start_ms: Option<Millis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnOffSubscriberConfig {
    pub event: String,
    pub on_event: EventHandlerKind,
    /// Parsed for validation, the cycle length comes from the timeout
    pub frequency_ms: Option<u64>,
    pub timeout_ms: u64,
    pub wait_at_start_ms: u64,
}

impl OnOffSubscriberConfig {
    pub fn decode(declaration: &RunnerDeclaration) -> Result<Self, ConfigError> {
        let raw: RawConfig = decode_fields(declaration)?;
        let on_event = match raw.on_event.as_deref() {
            Some(name) => EventHandlerKind::from_name(&declaration.name, name)?,
            None => EventHandlerKind::Discard,
        };
        let frequency_ms = raw
            .frequency
            .as_deref()
            .map(parse_frequency)
            .transpose()
            .map_err(|source| ConfigError::Frequency {
                runner: declaration.name.clone(),
                source,
            })?;
        Ok(Self {
            event: raw.event,
            on_event,
            frequency_ms,
            timeout_ms: raw.timeout_ms.0,
            wait_at_start_ms: raw.wait_at_start_ms.map_or(0, |m| m.0),
        })
    }
}

pub(crate) async fn run(
    config: &OnOffSubscriberConfig,
    factory: &dyn ClientFactory,
    options: &ClientOptions,
) -> Result<Report, ClientError> {
    let mut client = connect_and_login(factory, options).await?;
    if config.wait_at_start_ms > 0 {
        sleep(Duration::from_millis(config.wait_at_start_ms)).await;
    }

    let handler = config.on_event;
    let callback: EventCallback = Arc::new(move |data: &Value| handler.handle(data));
    let timeout = Duration::from_millis(config.timeout_ms);
    let start = Instant::now();
    let mut cycles: u64 = 0;

    let outcome: Result<(), ClientError> = async {
        while start.elapsed() < timeout {
            let id = client.subscribe(&config.event, Arc::clone(&callback)).await?;
            sleep(timeout).await;
            client.unsubscribe(&config.event, id).await?;
            sleep(timeout).await;
            cycles += 1;
        }
        Ok(())
    }
    .await;
    let elapsed = start.elapsed();

    client.close().await?;
    outcome?;

    Ok(Report::timed(
        format!("Subscribed and unsubscribed {} times", cycles),
        elapsed,
    ))
}
