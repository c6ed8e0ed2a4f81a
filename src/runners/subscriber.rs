//! Single client subscribed to one event for a fixed time.

use super::{decode_fields, EventHandlerKind, Millis, Report};
use crate::{
    client::{connect_and_login, ClientFactory, ClientOptions, EventCallback},
    error::{ClientError, ConfigError},
    scenario::RunnerDeclaration,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    event: String,
    on_event: String,
    timeout_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleSubscriberConfig {
    pub event: String,
    pub on_event: EventHandlerKind,
    pub timeout_ms: u64,
}

impl SingleSubscriberConfig {
    pub fn decode(declaration: &RunnerDeclaration) -> Result<Self, ConfigError> {
        let raw: RawConfig = decode_fields(declaration)?;
        Ok(Self {
            on_event: EventHandlerKind::from_name(&declaration.name, &raw.on_event)?,
            event: raw.event,
            timeout_ms: raw.timeout_ms.0,
        })
    }
}

pub(crate) async fn run(
    config: &SingleSubscriberConfig,
    factory: &dyn ClientFactory,
    options: &ClientOptions,
) -> Result<Report, ClientError> {
    let mut client = connect_and_login(factory, options).await?;

    let received = Arc::new(AtomicU64::new(0));
    let handler = config.on_event;
    let callback: EventCallback = {
        let received = Arc::clone(&received);
        Arc::new(move |data: &Value| {
            received.fetch_add(1, Ordering::Relaxed);
            handler.handle(data);
        })
    };

    let start = Instant::now();
    let subscribed = client.subscribe(&config.event, callback).await;
    if subscribed.is_ok() {
        sleep(Duration::from_millis(config.timeout_ms)).await;
    }
    let elapsed = start.elapsed();

    client.close().await?;
    subscribed?;

    let received = received.load(Ordering::Relaxed);
    Ok(Report::counted(
        format!("Single User Subscriber - Counted {} emitted events", received),
        received,
        elapsed,
    ))
}
