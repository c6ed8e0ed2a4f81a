//! # Pub/Sub Client Boundary
//!
//! Runners never talk to a broker directly. They go through two traits:
//!
//! - [`ClientFactory`]: constructs and initializes a client from the
//!   scenario's opaque `options` object
//! - [`PubSubClient`]: the logged-in capability set the workloads drive
//!   (`login`, `emit`, `subscribe`, `unsubscribe`, `close`)
//!
//! The crate ships [`LocalBus`], a loopback broker living in the current
//! process. Every client created by one `LocalBus` shares its subscription
//! table, so emits from one runner reach subscribers of another when they
//! run in the same process.

use crate::error::ClientError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Scenario `options`, passed through untouched.
pub type ClientOptions = Map<String, Value>;

/// Callback invoked for every message received on a subscribed event.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one subscription so it can be removed again.
pub type SubscriptionId = u64;

/// A connected pub/sub client.
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Authenticate against the broker
    async fn login(&mut self) -> Result<(), ClientError>;

    /// Publish `data` on `event`
    async fn emit(&self, event: &str, data: &Value) -> Result<(), ClientError>;

    /// Register `callback` for `event`
    async fn subscribe(
        &self,
        event: &str,
        callback: EventCallback,
    ) -> Result<SubscriptionId, ClientError>;

    /// Remove a subscription created by [`PubSubClient::subscribe`]
    async fn unsubscribe(&self, event: &str, id: SubscriptionId) -> Result<(), ClientError>;

    /// Close the connection. Further calls fail with [`ClientError::Closed`].
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Creates clients from scenario options.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Construct and initialize a client; the caller still has to log in
    async fn connect(&self, options: &ClientOptions) -> Result<Box<dyn PubSubClient>, ClientError>;

    /// Name for logs and the runner banner
    fn name(&self) -> &'static str;
}

/// Construct, initialize and log in a client in one step.
pub async fn connect_and_login(
    factory: &dyn ClientFactory,
    options: &ClientOptions,
) -> Result<Box<dyn PubSubClient>, ClientError> {
    let mut client = factory.connect(options).await?;
    client.login().await?;
    Ok(client)
}

type SubscriptionTable = HashMap<String, Vec<(SubscriptionId, EventCallback)>>;

#[derive(Default)]
struct BusState {
    subscriptions: Mutex<SubscriptionTable>,
    next_id: AtomicU64,
}

/// In-process loopback broker.
///
/// Delivery is synchronous: `emit` invokes every matching callback before it
/// returns. Empty event names are rejected the way a real broker would.
/// Setting `"reject-login": true` in the options makes every login fail,
/// which is handy for exercising failure paths.
#[derive(Clone, Default)]
pub struct LocalBus {
    state: Arc<BusState>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.state
            .subscriptions
            .lock()
            .get(event)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl ClientFactory for LocalBus {
    async fn connect(&self, options: &ClientOptions) -> Result<Box<dyn PubSubClient>, ClientError> {
        let reject_login = options
            .get("reject-login")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Box::new(LocalClient {
            state: Arc::clone(&self.state),
            reject_login,
            logged_in: false,
            closed: false,
            owned: Mutex::new(Vec::new()),
        }))
    }

    fn name(&self) -> &'static str {
        "local loopback bus"
    }
}

struct LocalClient {
    state: Arc<BusState>,
    reject_login: bool,
    logged_in: bool,
    closed: bool,
    /// Subscriptions made through this client, dropped on close
    owned: Mutex<Vec<(String, SubscriptionId)>>,
}

impl LocalClient {
    fn check_ready(&self, event: &str) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        if !self.logged_in {
            return Err(ClientError::NotLoggedIn);
        }
        if event.is_empty() {
            return Err(ClientError::InvalidEventName(event.to_string()));
        }
        Ok(())
    }

    fn remove(&self, event: &str, id: SubscriptionId) -> bool {
        let mut table = self.state.subscriptions.lock();
        let Some(entries) = table.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            table.remove(event);
        }
        removed
    }
}

#[async_trait]
impl PubSubClient for LocalClient {
    async fn login(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        if self.reject_login {
            return Err(ClientError::LoginRejected(
                "local bus configured with reject-login".to_string(),
            ));
        }
        self.logged_in = true;
        Ok(())
    }

    async fn emit(&self, event: &str, data: &Value) -> Result<(), ClientError> {
        self.check_ready(event)?;
        // Clone the callbacks out so handlers run without the table lock held
        let callbacks: Vec<EventCallback> = self
            .state
            .subscriptions
            .lock()
            .get(event)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        trace!("emit {} to {} subscriber(s)", event, callbacks.len());
        for callback in callbacks {
            callback(data);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        event: &str,
        callback: EventCallback,
    ) -> Result<SubscriptionId, ClientError> {
        self.check_ready(event)?;
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state
            .subscriptions
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, callback));
        self.owned.lock().push((event.to_string(), id));
        Ok(id)
    }

    async fn unsubscribe(&self, event: &str, id: SubscriptionId) -> Result<(), ClientError> {
        self.check_ready(event)?;
        if !self.remove(event, id) {
            return Err(ClientError::UnknownSubscription {
                event: event.to_string(),
                id,
            });
        }
        self.owned
            .lock()
            .retain(|(owned_event, owned_id)| !(owned_event == event && *owned_id == id));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Ok(());
        }
        let owned = std::mem::take(&mut *self.owned.lock());
        for (event, id) in &owned {
            self.remove(event, *id);
        }
        debug!("Closed local client, dropped {} subscription(s)", owned.len());
        self.closed = true;
        Ok(())
    }
}
