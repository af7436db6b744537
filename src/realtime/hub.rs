//! Shared realtime connection with reference-counted lifetime.
//!
//! A [`RealtimeHub`] owns at most one connection loop. The first
//! [`Subscription`] starts it and dropping the last one stops it, so any
//! number of consumers share a single socket. The loop reconnects according
//! to a [`ReconnectPolicy`].
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> (delay) -> Connecting ...
//!                                                  \-> GaveUp (policy exhausted)
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures_util::StreamExt;
use serde::Serialize;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::frame::RealtimeMessage;
use super::transport::{Connector, WsConnector};

// ---

/// Callback invoked for every parsed message, in arrival order.
pub type Handler = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The reconnect policy ran out of attempts. A new first subscriber
    /// starts the loop again.
    GaveUp,
}

/// When and how often to reconnect after a close or failed connect.
///
/// The delay before reconnect attempt `n` (1-based, counted since the last
/// successful connect) is `initial_delay * multiplier^(n-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    /// Same delay every time, unlimited attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        // ---
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay.max(self.initial_delay))
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

struct Runner {
    generation: u64,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    handlers: Vec<(u64, Handler)>,
    next_id: u64,
    next_generation: u64,
    runner: Option<Runner>,
}

struct Shared {
    url: String,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    registry: Mutex<Registry>,
    state: watch::Sender<ConnectionState>,
    last_message: watch::Sender<Option<RealtimeMessage>>,
}

/// Handle to a shared realtime connection. Clones refer to the same hub.
#[derive(Clone)]
pub struct RealtimeHub {
    shared: Arc<Shared>,
}

impl fmt::Debug for RealtimeHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeHub")
            .field("url", &self.shared.url)
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl RealtimeHub {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self::with_connector(url, policy, WsConnector)
    }

    pub fn with_connector(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        connector: impl Connector,
    ) -> Self {
        // ---
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (last_message, _) = watch::channel(None);

        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                policy,
                connector: Arc::new(connector),
                registry: Mutex::new(Registry::default()),
                state,
                last_message,
            }),
        }
    }

    /// Register `handler` for every parsed message.
    ///
    /// The first live subscription starts the connection loop on the
    /// current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime while no loop is running.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        // ---
        let mut registry = self.shared.lock_registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, Arc::new(handler)));

        let running = registry
            .runner
            .as_ref()
            .is_some_and(|runner| !runner.task.is_finished());
        if !running {
            let generation = registry.next_generation;
            registry.next_generation += 1;
            let (shutdown, shutdown_rx) = oneshot::channel();
            let task = tokio::spawn(run(Arc::clone(&self.shared), generation, shutdown_rx));
            registry.runner = Some(Runner {
                generation,
                shutdown,
                task,
            });
            debug!(url = %self.shared.url, generation, "Realtime loop started");
        }

        Subscription {
            shared: Arc::clone(&self.shared),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock_registry().handlers.len()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Most recent parsed message. Earlier ones are not buffered.
    pub fn last_message(&self) -> Option<RealtimeMessage> {
        self.shared.last_message.borrow().clone()
    }
}

/// Live registration on a [`RealtimeHub`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    shared: Arc<Shared>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.remove(self.id);
    }
}

impl Shared {
    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop a handler; the last one out stops the loop before returning.
    fn remove(&self, id: u64) {
        // ---
        let mut registry = self.lock_registry();
        registry.handlers.retain(|(hid, _)| *hid != id);
        if !registry.handlers.is_empty() {
            return;
        }

        if let Some(runner) = registry.runner.take() {
            let _ = runner.shutdown.send(());
            runner.task.abort();
            self.set_state(ConnectionState::Disconnected);
            debug!(url = %self.url, "Realtime loop stopped, no subscribers left");
        }
    }

    /// State update from the loop of `generation`. Ignored unless that loop
    /// is the current runner, so a stopped or replaced loop cannot overwrite
    /// the state of its successor.
    fn set_loop_state(&self, generation: u64, state: ConnectionState) {
        let registry = self.lock_registry();
        if registry.runner.as_ref().map(|r| r.generation) == Some(generation) {
            self.set_state(state);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    fn dispatch(&self, text: &str) {
        // ---
        let message = match RealtimeMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed realtime frame: {e}");
                return;
            }
        };

        self.last_message.send_replace(Some(message.clone()));

        let handlers: Vec<Handler> = self
            .lock_registry()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&message);
        }
    }
}

async fn run(shared: Arc<Shared>, generation: u64, mut shutdown: oneshot::Receiver<()>) {
    // ---
    let mut attempt: u32 = 0;

    loop {
        shared.set_loop_state(generation, ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = &mut shutdown => break,
            result = shared.connector.connect(&shared.url) => result,
        };

        match connected {
            Ok(mut frames) => {
                attempt = 0;
                shared.set_loop_state(generation, ConnectionState::Connected);
                info!(url = %shared.url, "Realtime connected");

                loop {
                    let next = tokio::select! {
                        _ = &mut shutdown => {
                            shared.set_loop_state(generation, ConnectionState::Disconnected);
                            return;
                        }
                        next = frames.next() => next,
                    };

                    match next {
                        Some(Ok(text)) => shared.dispatch(&text),
                        Some(Err(e)) => {
                            warn!(url = %shared.url, "Realtime connection lost: {e}");
                            break;
                        }
                        None => {
                            info!(url = %shared.url, "Realtime connection closed");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(url = %shared.url, "Realtime {e}"),
        }

        shared.set_loop_state(generation, ConnectionState::Disconnected);

        attempt = attempt.saturating_add(1);
        if !shared.policy.allows(attempt) {
            warn!(url = %shared.url, attempts = attempt - 1, "Giving up on realtime reconnects");
            shared.set_loop_state(generation, ConnectionState::GaveUp);
            return;
        }

        let delay = shared.policy.delay_for(attempt);
        info!(url = %shared.url, attempt, "Reconnecting in {:?}", delay);

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.set_loop_state(generation, ConnectionState::Disconnected);
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::realtime::transport::{FrameStream, RealtimeError};
    use futures_util::future::{pending, BoxFuture};

    #[test]
    fn test_default_policy() {
        // ---
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(100), Duration::from_secs(5));
        assert!(policy.allows(u32::MAX));
    }

    #[test]
    fn test_backoff_curve_is_capped() {
        // ---
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2,
            max_attempts: Some(3),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
        assert_eq!(policy.delay_for(60), Duration::from_secs(10));
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
    }

    struct Stalled;

    impl Connector for Stalled {
        fn connect(&self, _url: &str) -> BoxFuture<'static, Result<FrameStream, RealtimeError>> {
            Box::pin(pending::<Result<FrameStream, RealtimeError>>())
        }
    }

    fn generation(hub: &RealtimeHub) -> Option<u64> {
        hub.shared.lock_registry().runner.as_ref().map(|r| r.generation)
    }

    #[tokio::test]
    async fn test_replaced_loop_cannot_write_state() {
        // ---
        let hub = RealtimeHub::with_connector("ws://stalled", ReconnectPolicy::default(), Stalled);

        let first = hub.subscribe(|_| {});
        let old = generation(&hub).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(hub.state(), ConnectionState::Connecting);

        first.unsubscribe();
        assert_eq!(generation(&hub), None);
        assert_eq!(hub.state(), ConnectionState::Disconnected);

        let _second = hub.subscribe(|_| {});
        let current = generation(&hub).unwrap();
        assert_ne!(old, current);
        tokio::task::yield_now().await;
        assert_eq!(hub.state(), ConnectionState::Connecting);

        // A late write from the first loop is dropped.
        hub.shared.set_loop_state(old, ConnectionState::Disconnected);
        assert_eq!(hub.state(), ConnectionState::Connecting);

        hub.shared.set_loop_state(current, ConnectionState::Connected);
        assert_eq!(hub.state(), ConnectionState::Connected);
    }
}
