//! Session state machine: transport lifecycle, authentication, keepalive,
//! and bounded reconnection.
//!
//! One task owns the whole lifecycle. It drives the connect/authenticate
//! sequence, reads transport bytes into the frame decoder, posts decoded
//! messages and lifecycle events onto the dispatch queue, and suspends only
//! at the transport read, the keepalive/backoff timers, and the credential
//! exchange. A stop request is observed at every one of those points.
//!
//! States: `Disconnected → Connecting → Authenticating → Connected`, with
//! `Reconnecting` between failed attempts and `Closed` terminal. The
//! reconnect attempt counter increments on each entry into `Reconnecting`,
//! resets on reaching `Connected`, and the session closes for good once it
//! reaches `max_reconnect_attempts`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, Instant};

use crate::auth::{auth_command, parse_auth_reply, Credentials, TokenProvider};
use crate::dispatch::{DispatchItem, SessionEvent};
use crate::error::{HomewireError, Result};
use crate::protocol::{encode_command, DecodeMode, DecodedMessage, FrameDecoder, MessageType};
use crate::token::TokenManager;
use crate::transport::{BoxedTransport, Connector};

/// Read buffer size for the transport loop.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Keepalive probe written while connected.
const KEEPALIVE_COMMAND: &str = "keepalive";

/// Command subscribing to server-pushed state updates.
const ENABLE_UPDATES_COMMAND: &str = "enablestatusupdate";

/// Session lifecycle state (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state, no connect requested yet.
    Disconnected,
    /// Transport connection in progress.
    Connecting,
    /// Transport up, token exchange in progress.
    Authenticating,
    /// Authenticated and processing frames.
    Connected,
    /// Between failed attempts.
    Reconnecting,
    /// Terminal: explicit stop or reconnect exhaustion.
    Closed,
}

/// Session tunables. The defaults suit a LAN hub.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between keepalive probes.
    pub keepalive_interval: Duration,
    /// Deadline for the keepalive acknowledgement after a probe.
    pub keepalive_timeout: Duration,
    /// Deadline for the in-band authentication reply.
    pub auth_timeout: Duration,
    /// Refresh the token once it expires within this margin.
    pub token_refresh_margin: Duration,
    /// Interval between token validity checks while connected.
    pub token_check_interval: Duration,
    /// Base delay between reconnect attempts (doubled per attempt).
    pub reconnect_delay: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_delay_cap: Duration,
    /// Frame decoder parsing strategy.
    pub decode_mode: DecodeMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(60),
            keepalive_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            token_refresh_margin: Duration::from_secs(300),
            token_check_interval: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(1),
            reconnect_delay_cap: Duration::from_secs(30),
            decode_mode: DecodeMode::Fast,
        }
    }
}

/// How one connection attempt ended.
enum Outcome {
    /// Stop was requested.
    Stopped { was_connected: bool },
    /// The attempt failed; the reconnect policy decides what happens next.
    Failed {
        error: HomewireError,
        was_connected: bool,
    },
}

/// Outcome of a cancellable lifecycle step.
enum StepOutcome {
    /// Step finished; frames that shared a read with the authentication
    /// reply are carried over for dispatch.
    Completed(Vec<DecodedMessage>),
    Stopped,
}

/// The running half of a session, owned by the spawned task.
pub(crate) struct SessionRuntime {
    pub(crate) cfg: SessionConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) provider: Arc<dyn TokenProvider>,
    pub(crate) credentials: Credentials,
    pub(crate) server_addr: String,
    pub(crate) receive_updates: bool,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) tokens: TokenManager,
    pub(crate) dispatch_tx: mpsc::Sender<DispatchItem>,
    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) attempts: Arc<AtomicU32>,
    pub(crate) last_error: Arc<Mutex<Option<Arc<HomewireError>>>>,
    pub(crate) stop_rx: watch::Receiver<bool>,
}

impl SessionRuntime {
    /// Drive the session until stop or reconnect exhaustion.
    pub(crate) async fn run(mut self) {
        let mut stop_rx = self.stop_rx.clone();

        loop {
            if *stop_rx.borrow() {
                self.set_state(SessionState::Closed);
                return;
            }

            self.set_state(SessionState::Connecting);

            match self.run_connection(&mut stop_rx).await {
                Outcome::Stopped { was_connected } => {
                    if was_connected {
                        self.emit(SessionEvent::ConnectionClosed).await;
                    }
                    self.set_state(SessionState::Closed);
                    return;
                }
                Outcome::Failed {
                    error,
                    was_connected,
                } => {
                    tracing::warn!(%error, "connection attempt failed");
                    if let Ok(mut slot) = self.last_error.lock() {
                        *slot = Some(Arc::new(error));
                    }

                    if was_connected {
                        self.emit(SessionEvent::ConnectionClosed).await;
                    }
                    self.set_state(SessionState::Reconnecting);
                    self.emit(SessionEvent::Reconnecting).await;

                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt >= self.max_reconnect_attempts {
                        tracing::error!(attempt, "reconnect attempts exhausted");
                        self.emit(SessionEvent::Failed).await;
                        self.set_state(SessionState::Closed);
                        return;
                    }

                    let delay = backoff_delay(&self.cfg, attempt);
                    tracing::debug!(attempt, ?delay, "scheduling reconnect");
                    tokio::select! {
                        _ = stop_rx.changed() => {
                            self.set_state(SessionState::Closed);
                            return;
                        }
                        _ = sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One full connect/authenticate/run cycle.
    async fn run_connection(&mut self, stop_rx: &mut watch::Receiver<bool>) -> Outcome {
        // CONNECTING
        let connect_fut = self.connector.connect(&self.server_addr);
        let mut transport = tokio::select! {
            _ = stop_rx.changed() => {
                return Outcome::Stopped { was_connected: false };
            }
            result = connect_fut => match result {
                Ok(transport) => transport,
                Err(error) => {
                    return Outcome::Failed { error, was_connected: false };
                }
            },
        };

        // AUTHENTICATING
        self.set_state(SessionState::Authenticating);
        let mut decoder = FrameDecoder::with_mode(self.cfg.decode_mode);
        let pending = match self.authenticate(&mut transport, &mut decoder, stop_rx).await {
            Ok(StepOutcome::Stopped) => {
                let _ = transport.shutdown().await;
                return Outcome::Stopped {
                    was_connected: false,
                };
            }
            Ok(StepOutcome::Completed(pending)) => pending,
            Err(error) => {
                let _ = transport.shutdown().await;
                return Outcome::Failed {
                    error,
                    was_connected: false,
                };
            }
        };

        // CONNECTED
        self.set_state(SessionState::Connected);
        self.attempts.store(0, Ordering::SeqCst);
        self.emit(SessionEvent::Connected).await;

        if self.receive_updates {
            if let Err(e) = write_command(&mut transport, ENABLE_UPDATES_COMMAND).await {
                let _ = transport.shutdown().await;
                return Outcome::Failed {
                    error: e,
                    was_connected: true,
                };
            }
        }

        let outcome = self
            .run_connected(&mut transport, &mut decoder, pending, stop_rx)
            .await;
        let _ = transport.shutdown().await;
        match outcome {
            Ok(()) => Outcome::Stopped {
                was_connected: true,
            },
            Err(error) => Outcome::Failed {
                error,
                was_connected: true,
            },
        }
    }

    /// Obtain a token and confirm it over the live connection.
    ///
    /// The server answers the token command with a JSON document in a text
    /// frame; anything other than a 2xx code is an authentication failure.
    /// Frames decoded from the same read after the success reply are
    /// returned so the connected loop dispatches them; none are lost to
    /// transport segmentation.
    async fn authenticate(
        &mut self,
        transport: &mut BoxedTransport,
        decoder: &mut FrameDecoder,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<StepOutcome> {
        let token = if self.tokens.has_token() {
            self.provider.refresh(self.tokens.token()).await?
        } else {
            self.provider
                .acquire(&self.credentials, &self.server_addr)
                .await?
        };
        if self.tokens.has_token() {
            self.tokens.update(token);
        } else {
            self.tokens.reissue(token);
        }
        if self.tokens.seconds_to_expire() <= 0 {
            return Err(HomewireError::Authentication(
                "acquired token is already expired".into(),
            ));
        }

        write_command(transport, &auth_command(self.tokens.token())).await?;

        let deadline = Instant::now() + self.cfg.auth_timeout;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                _ = stop_rx.changed() => return Ok(StepOutcome::Stopped),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(HomewireError::Transport(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "no authentication reply before deadline",
                    )));
                }
                read = transport.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(HomewireError::ConnectionClosed);
                    }
                    let mut msgs = decoder.feed(&buf[..n]).map_err(escalate_protocol)?.into_iter();
                    while let Some(msg) = msgs.next() {
                        // Frames other than the text reply can arrive early;
                        // they are not state updates yet and are dropped.
                        let Some(payload) = (msg.msg_type == MessageType::Text)
                            .then(|| msg.payload())
                            .flatten()
                        else {
                            continue;
                        };
                        let reply = parse_auth_reply(payload).map_err(|e| {
                            HomewireError::Authentication(format!(
                                "unparseable auth reply: {}",
                                e
                            ))
                        })?;
                        if !reply.is_success() {
                            return Err(HomewireError::Authentication(format!(
                                "server replied with code {}",
                                reply.code
                            )));
                        }
                        if let Some(confirmed) = reply.into_token() {
                            self.tokens.update(confirmed);
                        }
                        if self.tokens.seconds_to_expire() <= 0 {
                            return Err(HomewireError::Authentication(
                                "confirmed token is already expired".into(),
                            ));
                        }
                        return Ok(StepOutcome::Completed(msgs.collect()));
                    }
                }
            }
        }
    }

    /// Steady-state loop: read frames, probe keepalive, refresh the token.
    ///
    /// `Ok(())` means a stop was requested; any error routes the session to
    /// the reconnect policy.
    async fn run_connected(
        &mut self,
        transport: &mut BoxedTransport,
        decoder: &mut FrameDecoder,
        pending: Vec<DecodedMessage>,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        // Frames that shared a read with the authentication reply.
        for msg in pending {
            let out_of_service = msg.msg_type == MessageType::OutOfService;
            self.post_message(msg).await;
            if out_of_service {
                tracing::warn!("server went out of service");
                return Err(HomewireError::ConnectionClosed);
            }
        }

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let mut keepalive = interval_at(
            Instant::now() + self.cfg.keepalive_interval,
            self.cfg.keepalive_interval,
        );
        let mut token_check = interval_at(
            Instant::now() + self.cfg.token_check_interval,
            self.cfg.token_check_interval,
        );
        let mut keepalive_pending = false;
        let keepalive_deadline = sleep(Duration::ZERO);
        tokio::pin!(keepalive_deadline);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => return Ok(()),

                read = transport.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(HomewireError::ConnectionClosed);
                    }
                    for msg in decoder.feed(&buf[..n]).map_err(escalate_protocol)? {
                        if msg.msg_type == MessageType::Keepalive {
                            keepalive_pending = false;
                        }
                        let out_of_service = msg.msg_type == MessageType::OutOfService;
                        self.post_message(msg).await;
                        if out_of_service {
                            tracing::warn!("server went out of service");
                            return Err(HomewireError::ConnectionClosed);
                        }
                    }
                }

                _ = keepalive.tick() => {
                    write_command(transport, KEEPALIVE_COMMAND).await?;
                    if !keepalive_pending {
                        keepalive_pending = true;
                        keepalive_deadline
                            .as_mut()
                            .reset(Instant::now() + self.cfg.keepalive_timeout);
                    }
                }

                _ = &mut keepalive_deadline, if keepalive_pending => {
                    return Err(HomewireError::KeepaliveTimeout);
                }

                _ = token_check.tick() => {
                    if self.tokens.needs_refresh(self.cfg.token_refresh_margin) {
                        let refreshed = self.provider.refresh(self.tokens.token()).await?;
                        self.tokens.update(refreshed);
                        write_command(transport, &auth_command(self.tokens.token())).await?;
                        tracing::debug!("token refreshed in-band");
                    }
                }
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(?state, "session state");
        let _ = self.state_tx.send(state);
    }

    async fn post_message(&self, msg: DecodedMessage) {
        if self
            .dispatch_tx
            .send(DispatchItem::Message(msg))
            .await
            .is_err()
        {
            tracing::warn!("dispatch queue closed, dropping message");
        }
    }

    async fn emit(&self, event: SessionEvent) {
        if self
            .dispatch_tx
            .send(DispatchItem::Event(event))
            .await
            .is_err()
        {
            tracing::warn!(?event, "dispatch queue closed, dropping event");
        }
    }
}

/// Capped exponential delay before reconnect attempt `attempt`.
fn backoff_delay(cfg: &SessionConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    cfg.reconnect_delay
        .saturating_mul(1u32 << exp)
        .min(cfg.reconnect_delay_cap)
}

/// Write one command frame and flush it.
async fn write_command(transport: &mut BoxedTransport, cmd: &str) -> Result<()> {
    transport.write_all(&encode_command(cmd)).await?;
    transport.flush().await?;
    Ok(())
}

/// Decoder failures during a live session are a transport problem: the
/// stream is unrecoverable and the connection must be rebuilt.
fn escalate_protocol(e: HomewireError) -> HomewireError {
    match e {
        HomewireError::Protocol(msg) => HomewireError::Transport(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            msg,
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let cfg = SessionConfig {
            reconnect_delay: Duration::from_secs(1),
            reconnect_delay_cap: Duration::from_secs(30),
            ..SessionConfig::default()
        };

        assert_eq!(backoff_delay(&cfg, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(&cfg, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(&cfg, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(&cfg, 6), Duration::from_secs(30)); // capped at 32 -> 30
        assert_eq!(backoff_delay(&cfg, 60), Duration::from_secs(30));
    }

    #[test]
    fn test_escalate_protocol_to_transport() {
        let escalated = escalate_protocol(HomewireError::Protocol("resync failed".into()));
        assert!(matches!(escalated, HomewireError::Transport(_)));

        let untouched = escalate_protocol(HomewireError::ConnectionClosed);
        assert!(matches!(untouched, HomewireError::ConnectionClosed));
    }

    #[test]
    fn test_default_config_is_sane() {
        let cfg = SessionConfig::default();
        assert!(cfg.keepalive_timeout < cfg.keepalive_interval);
        assert!(cfg.reconnect_delay <= cfg.reconnect_delay_cap);
    }
}
