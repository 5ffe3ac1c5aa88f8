//! Client facade: builder-style registration, session spawn, and handles
//! for observing and stopping the running session.
//!
//! # Example
//!
//! ```ignore
//! use homewire_client::{Client, MessageType, SessionEvent};
//!
//! let mut client = Client::builder()
//!     .token_provider(my_provider)
//!     .consume(&[MessageType::ValueStates], |msg| async move {
//!         for entry in msg.value_entries().unwrap_or_default() {
//!             println!("{} = {}", entry.uuid, entry.value);
//!         }
//!         Ok(())
//!     })
//!     .observe(&SessionEvent::ALL, |event| {
//!         println!("session: {:?}", event);
//!         Ok(())
//!     })
//!     .connect("admin", "secret", "192.168.1.10", true, 5)
//!     .await?;
//!
//! client.wait_until_closed().await;
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{Credentials, TokenProvider};
use crate::dispatch::{
    spawn_dispatch_task, ConsumerResult, EventNotifier, MessageRouter, ObserverResult,
    SessionEvent,
};
use crate::error::{HomewireError, Result};
use crate::protocol::{DecodedMessage, MessageType};
use crate::session::{SessionConfig, SessionRuntime, SessionState};
use crate::token::TokenManager;
use crate::transport::{Connector, TcpConnector};

/// Configures callbacks and collaborators before connecting.
///
/// All registrations happen up front; the session starts on
/// [`ClientBuilder::connect`] and the returned [`Client`] is a handle only.
pub struct ClientBuilder {
    router: MessageRouter,
    notifier: EventNotifier,
    connector: Arc<dyn Connector>,
    provider: Option<Arc<dyn TokenProvider>>,
    config: SessionConfig,
}

impl ClientBuilder {
    /// Start a builder with a TCP connector and default session config.
    pub fn new() -> Self {
        Self {
            router: MessageRouter::new(),
            notifier: EventNotifier::new(),
            connector: Arc::new(TcpConnector::new()),
            provider: None,
            config: SessionConfig::default(),
        }
    }

    /// Register an async consumer for the given message types.
    pub fn consume<F, Fut>(mut self, types: &[MessageType], consumer: F) -> Self
    where
        F: Fn(Arc<DecodedMessage>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ConsumerResult> + Send + 'static,
    {
        self.router.register(types, consumer);
        self
    }

    /// Register an observer for the given lifecycle events.
    pub fn observe<F>(mut self, events: &[SessionEvent], observer: F) -> Self
    where
        F: Fn(SessionEvent) -> ObserverResult + Send + Sync + 'static,
    {
        self.notifier.register(events, observer);
        self
    }

    /// Replace the transport connector (TCP by default).
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Set the token provider. Required before [`ClientBuilder::connect`].
    pub fn token_provider(mut self, provider: impl TokenProvider) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Override the session tunables.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn the session and dispatch tasks and return a handle.
    ///
    /// Returns as soon as the session task is running; connection progress
    /// is reported through registered observers and [`Client::state`].
    /// `max_reconnect_attempts` bounds consecutive failed attempts before
    /// the session closes for good.
    pub async fn connect(
        self,
        user: impl Into<String>,
        password: impl Into<String>,
        server_addr: impl Into<String>,
        receive_updates: bool,
        max_reconnect_attempts: u32,
    ) -> Result<Client> {
        let provider = self.provider.ok_or_else(|| {
            HomewireError::Request("no token provider configured".into())
        })?;

        let (dispatch_tx, dispatch_task) = spawn_dispatch_task(self.router, self.notifier);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (stop_tx, stop_rx) = watch::channel(false);
        let attempts = Arc::new(AtomicU32::new(0));
        let last_error = Arc::new(Mutex::new(None));

        let runtime = SessionRuntime {
            cfg: self.config,
            connector: self.connector,
            provider,
            credentials: Credentials::new(user, password),
            server_addr: server_addr.into(),
            receive_updates,
            max_reconnect_attempts,
            tokens: TokenManager::new(),
            dispatch_tx,
            state_tx,
            attempts: Arc::clone(&attempts),
            last_error: Arc::clone(&last_error),
            stop_rx,
        };
        let session_task = tokio::spawn(runtime.run());

        // Wait for the task to take its first transition so callers never
        // observe the placeholder Disconnected state.
        let mut first = state_rx.clone();
        let _ = first
            .wait_for(|state| *state != SessionState::Disconnected)
            .await;

        Ok(Client {
            state_rx,
            stop_tx,
            attempts,
            last_error,
            session_task: Some(session_task),
            dispatch_task: Some(dispatch_task),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running session.
///
/// Dropping the handle closes the stop channel, so the session shuts down
/// at its next suspension point. Call [`Client::stop`] to also wait for the
/// session and dispatch tasks to finish.
pub struct Client {
    state_rx: watch::Receiver<SessionState>,
    stop_tx: watch::Sender<bool>,
    attempts: Arc<AtomicU32>,
    last_error: Arc<Mutex<Option<Arc<HomewireError>>>>,
    session_task: Option<JoinHandle<()>>,
    dispatch_task: Option<JoinHandle<()>>,
}

impl Client {
    /// Start configuring a new client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// A watch receiver for awaiting state transitions.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Reconnect attempts since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The error that ended the most recent connection attempt, if any.
    pub fn last_error(&self) -> Option<Arc<HomewireError>> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }

    /// Request an orderly shutdown and wait for both tasks to finish.
    ///
    /// Idempotent; pending reconnect backoff is cancelled.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        self.join_tasks().await;
    }

    /// Wait until the session reaches `Closed` and the dispatch queue has
    /// drained.
    pub async fn wait_until_closed(&mut self) {
        self.join_tasks().await;
    }

    async fn join_tasks(&mut self) {
        if let Some(task) = self.session_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.dispatch_task.take() {
            let _ = task.await;
        }
    }
}
