//! Channel manager: lifecycle of one duplex server channel.
//!
//! A single driver task owns the socket. For every connection it runs one
//! pump that both reads inbound frames and writes outbound actions, so the two
//! halves of the socket live and die together. After an abnormal close the
//! driver waits for the [`ReconnectTimer`] and dials again; a normal close
//! (code 1000) or teardown ends it.

use super::reconnect::ReconnectTimer;
use crate::error::{RejectReason, SessionError};
use crate::messaging::{ActionKind, OutboundAction};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn, Instrument, Span};
use url::Url;

/// Close code for an intentional shutdown. Anything else triggers a reconnect.
pub const NORMAL_CLOSE: u16 = 1000;

/// Code recorded when the peer sent a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Lifecycle state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
    ReconnectWait,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Connecting => "CONNECTING",
            ChannelState::Open => "OPEN",
            ChannelState::Closing => "CLOSING",
            ChannelState::Closed => "CLOSED",
            ChannelState::ReconnectWait => "RECONNECT_WAIT",
        };
        f.write_str(name)
    }
}

/// Timing and retry settings for a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Fixed wait between an abnormal close and the next dial
    pub reconnect_delay: Duration,
    /// Consecutive reconnects allowed without reaching OPEN; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    pub connect_timeout: Duration,
    /// How long teardown waits for the close handshake before aborting
    pub close_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: None,
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
        }
    }
}

/// Consumer of inbound text frames.
#[async_trait]
pub trait FrameHandler: Send + Sync + 'static {
    /// Handles one text frame. A returned action is written back on the
    /// channel immediately, ahead of any later inbound frame.
    async fn handle_frame(&self, text: &str) -> Option<OutboundAction>;

    /// Called when an open or opening channel is lost abnormally.
    async fn on_link_lost(&self, _loss: LinkLoss) {}
}

/// How an attempt ended when it was not a normal close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkLoss {
    /// The peer's close code, `None` when the transport dropped without one
    pub code: Option<u16>,
    /// Whether the attempt reached OPEN before it ended
    pub was_open: bool,
    /// `None` when no further reconnect will happen
    pub retry_in: Option<Duration>,
}

struct Inner {
    config: ChannelConfig,
    endpoint: Url,
    handler: Arc<dyn FrameHandler>,
    state: watch::Sender<ChannelState>,
    outbound: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    reconnect: ReconnectTimer,
    closing: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Owns the duplex channel for one server view.
pub struct ChannelManager {
    inner: Arc<Inner>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelManager {
    /// Creates a manager for `endpoint`. Nothing is dialed until [`Self::connect`].
    ///
    /// # Arguments
    /// * `endpoint` - Full channel URL, see [`super::channel_url`]
    /// * `config` - Timing and retry settings
    /// * `handler` - Receiver of every inbound text frame
    pub fn new(endpoint: Url, config: ChannelConfig, handler: Arc<dyn FrameHandler>) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        let (shutdown, _) = watch::channel(false);
        let reconnect = ReconnectTimer::new(config.reconnect_delay);

        Self {
            inner: Arc::new(Inner {
                config,
                endpoint,
                handler,
                state,
                outbound: RwLock::new(None),
                reconnect,
                closing: AtomicBool::new(false),
                shutdown,
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.inner.reconnect.is_pending()
    }

    /// Opens the channel and waits for the first handshake to settle.
    ///
    /// # Returns
    /// `Ok` once the channel is OPEN. If the first attempt fails the error is
    /// returned, but the driver keeps running and a reconnect is already
    /// scheduled. Calling this while a driver is running is a no-op.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let mut driver = self.driver.lock().await;
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Channel driver already running, ignoring connect");
            return Ok(());
        }

        self.inner.closing.store(false, Ordering::SeqCst);
        self.inner.shutdown.send_replace(false);
        self.inner.set_state(ChannelState::Connecting);

        let (first_tx, first_rx) = oneshot::channel();
        let inner = self.inner.clone();
        *driver = Some(tokio::spawn(
            inner.drive(Some(first_tx)).instrument(Span::current()),
        ));
        drop(driver);

        match first_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(SessionError::Connection(format!(
                "Failed to open channel to {}: {}",
                self.inner.endpoint.host_str().unwrap_or("unknown host"),
                reason
            ))),
            Err(_) => Err(SessionError::Connection(
                "Channel closed before it opened".to_string(),
            )),
        }
    }

    /// Sends one action. Nothing is buffered: unless the channel is OPEN the
    /// action is rejected and dropped.
    pub async fn send(&self, action: ActionKind, data: Option<String>) -> Result<(), SessionError> {
        self.send_action(OutboundAction::new(action, data)).await
    }

    pub async fn send_action(&self, action: OutboundAction) -> Result<(), SessionError> {
        let state = self.state();
        if state != ChannelState::Open {
            return Err(SessionError::ActionRejected(RejectReason::ChannelNotOpen(state)));
        }

        let outbound = self.inner.outbound.read().await;
        let Some(tx) = outbound.as_ref() else {
            return Err(SessionError::ActionRejected(RejectReason::ChannelNotOpen(
                self.state(),
            )));
        };
        tx.send(Message::Text(action.to_json().into()))
            .map_err(|_| SessionError::Connection("Channel closed while sending".to_string()))?;
        debug!("📤 Sent {:?}", action.action);
        Ok(())
    }

    /// Tears the channel down.
    ///
    /// Cancels any pending reconnect, sends a normal close and waits up to the
    /// configured close timeout for the handshake before aborting the driver.
    /// Ends in CLOSED.
    pub async fn close(&self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.reconnect.cancel();

        let handle = self.driver.lock().await.take();
        if let Some(mut handle) = handle {
            if self.state() != ChannelState::Closed {
                self.inner.set_state(ChannelState::Closing);
            }
            self.inner.shutdown.send_replace(true);

            if timeout(self.inner.config.close_timeout, &mut handle).await.is_err() {
                warn!("⏱️ Close handshake timed out, aborting channel task");
                handle.abort();
            }
        }

        *self.inner.outbound.write().await = None;
        self.inner.set_state(ChannelState::Closed);
        info!("🔌 Channel closed");
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.inner.closing.store(true, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);
        self.inner.reconnect.cancel();
        if let Some(handle) = self.driver.get_mut().take() {
            handle.abort();
        }
    }
}

impl Inner {
    fn set_state(&self, state: ChannelState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Channel state {} -> {}", previous, state);
        }
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Resolves once teardown has been requested.
    async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
        // The borrow guard from `wait_for` is not Send; drop it here
        let _ = shutdown.wait_for(|stop| *stop).await;
    }

    /// Connect, pump, and reconnect until a normal close or teardown.
    ///
    /// `first` reports the outcome of the first dial. A failure is reported
    /// only after the reconnect has been scheduled.
    async fn drive(self: Arc<Self>, mut first: Option<oneshot::Sender<Result<(), String>>>) {
        let mut shutdown = self.shutdown.subscribe();
        let (wake_tx, mut wake_rx) = mpsc::unbounded_channel();
        let mut attempts: u32 = 0;

        loop {
            if self.is_closing() {
                break;
            }
            self.set_state(ChannelState::Connecting);

            let (close_code, failure) = match self.run_once(&mut shutdown, &mut first).await {
                Ok(code) => {
                    attempts = 0;
                    (code, None)
                }
                Err(e) => {
                    warn!("❌ {}", e);
                    (None, Some(e.to_string()))
                }
            };

            if self.is_closing() || close_code == Some(NORMAL_CLOSE) {
                break;
            }

            attempts += 1;
            if let Some(max) = self.config.max_reconnect_attempts {
                if attempts > max {
                    warn!("🛑 Giving up after {} reconnect attempt(s)", max);
                    self.handler
                        .on_link_lost(LinkLoss {
                            code: close_code,
                            was_open: failure.is_none(),
                            retry_in: None,
                        })
                        .await;
                    break;
                }
            }

            self.set_state(ChannelState::ReconnectWait);
            warn!(
                "🔁 Channel lost ({}), reconnecting in {:?}",
                close_code.map_or_else(|| "no close frame".to_string(), |c| format!("code {c}")),
                self.config.reconnect_delay
            );
            self.handler
                .on_link_lost(LinkLoss {
                    code: close_code,
                    was_open: failure.is_none(),
                    retry_in: Some(self.config.reconnect_delay),
                })
                .await;
            self.reconnect.schedule(wake_tx.clone());
            if let (Some(reason), Some(tx)) = (failure, first.take()) {
                let _ = tx.send(Err(reason));
            }

            tokio::select! {
                _ = wake_rx.recv() => {}
                _ = Self::shutdown_requested(&mut shutdown) => break,
            }
        }

        // Teardown may have raced a schedule made while the handler ran
        self.reconnect.cancel();
        *self.outbound.write().await = None;
        self.set_state(ChannelState::Closed);
    }

    /// Dials once and pumps the connection until it ends.
    ///
    /// # Returns
    /// The close code that ended an established connection, `None` if the
    /// transport dropped without one.
    async fn run_once(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        first: &mut Option<oneshot::Sender<Result<(), String>>>,
    ) -> Result<Option<u16>, SessionError> {
        let dial = timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(self.endpoint.as_str()),
        );
        let (ws_stream, _) = tokio::select! {
            result = dial => match result {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(SessionError::Connection(format!("Handshake failed: {e}"))),
                Err(_) => return Err(SessionError::Connection(format!(
                    "Handshake timed out after {:?}",
                    self.config.connect_timeout
                ))),
            },
            _ = Self::shutdown_requested(shutdown) => return Ok(Some(NORMAL_CLOSE)),
        };

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.write().await = Some(tx);
        self.set_state(ChannelState::Open);
        info!("✅ Channel open");
        if let Some(tx) = first.take() {
            let _ = tx.send(Ok(()));
        }

        let mut close_code = None;
        let mut close_sent = false;

        loop {
            tokio::select! {
                Some(message) = rx.recv() => {
                    if let Err(e) = sink.send(message).await {
                        warn!("Failed to write to channel: {}", e);
                        break;
                    }
                }
                _ = Self::shutdown_requested(shutdown), if !close_sent => {
                    close_sent = true;
                    self.outbound.write().await.take();
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "session closed".into(),
                    };
                    if sink.send(Message::Close(Some(frame))).await.is_err() {
                        break;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.handler.handle_frame(text.as_str()).await {
                            if let Err(e) = sink.send(Message::Text(reply.to_json().into())).await {
                                warn!("Failed to reply on channel: {}", e);
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                        info!("📡 Peer closed channel with code {}", code);
                        close_code = Some(code);
                    }
                    // Transport-level ping/pong is answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Channel read ended: {}", e);
                        break;
                    }
                    None => break,
                },
            }
        }

        *self.outbound.write().await = None;
        Ok(close_code)
    }
}
