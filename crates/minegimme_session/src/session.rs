//! Server session: one live view of one remote server.
//!
//! Opening a session wires the stores, the dispatcher, the channel and the
//! file coordinator together and dials the channel. Closing it tears the
//! channel down with a normal close so no reconnect follows.

use crate::config::SessionConfig;
use crate::connection::{channel_url, ChannelManager, ChannelState};
use crate::console::{AutoScroll, ConsoleBuffer};
use crate::error::{RejectReason, SessionError};
use crate::files::{FileBackend, FileOperationCoordinator, FileTree, HttpFileBackend};
use crate::messaging::{ActionKind, Dispatcher, LifecycleAction, SessionEvent};
use crate::status::StatusStore;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

pub struct ServerSession<B: FileBackend> {
    id: Uuid,
    target: String,
    config: SessionConfig,
    console: Arc<RwLock<ConsoleBuffer>>,
    status: Arc<RwLock<StatusStore>>,
    tree: Arc<RwLock<FileTree>>,
    dispatcher: Arc<Dispatcher>,
    channel: ChannelManager,
    files: FileOperationCoordinator<B>,
    span: Span,
}

impl ServerSession<HttpFileBackend> {
    /// Builds a session whose file operations go to the MineGimme REST API at
    /// `config.api_base`. The channel is not dialed yet.
    pub fn with_http_backend(
        config: SessionConfig,
        target: &str,
        token: &str,
    ) -> Result<Self, SessionError> {
        let backend = HttpFileBackend::new(&config.api_base, target, token, config.request_timeout())
            .map_err(|e| SessionError::remote("configure", e))?;
        Self::new(config, target, token, Arc::new(backend))
    }
}

impl<B: FileBackend + 'static> ServerSession<B> {
    /// Builds every component of the session without dialing.
    ///
    /// # Arguments
    /// * `config` - Session settings
    /// * `target` - Server identifier
    /// * `token` - Credential embedded in the channel address
    /// * `backend` - Remote file operations for this server
    pub fn new(
        config: SessionConfig,
        target: &str,
        token: &str,
        backend: Arc<B>,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let span = info_span!("session", target = %target, session_id = %id);
        let endpoint = channel_url(&config.api_base, target, token)?;

        let console = Arc::new(RwLock::new(ConsoleBuffer::new()));
        let status = Arc::new(RwLock::new(StatusStore::new()));
        let tree = Arc::new(RwLock::new(FileTree::new()));
        let dispatcher = Arc::new(Dispatcher::new(
            console.clone(),
            status.clone(),
            tree.clone(),
        ));
        let channel = ChannelManager::new(endpoint, config.channel_config(), dispatcher.clone());
        let files = FileOperationCoordinator::new(backend, config.editor.clone());

        Ok(Self {
            id,
            target: target.to_string(),
            config,
            console,
            status,
            tree,
            dispatcher,
            channel,
            files,
            span,
        })
    }

    /// Builds the session and dials the channel.
    ///
    /// A failed first dial is returned as an error and the session is dropped
    /// with it. Use [`Self::new`] followed by [`Self::connect`] to keep the
    /// session and its scheduled reconnect alive instead.
    pub async fn open(
        config: SessionConfig,
        target: &str,
        token: &str,
        backend: Arc<B>,
    ) -> Result<Self, SessionError> {
        let session = Self::new(config, target, token, backend)?;
        session.connect().await?;
        Ok(session)
    }

    pub async fn connect(&self) -> Result<(), SessionError> {
        info!(parent: &self.span, "🔌 Opening session");
        self.channel.connect().instrument(self.span.clone()).await
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn console(&self) -> &Arc<RwLock<ConsoleBuffer>> {
        &self.console
    }

    pub fn status(&self) -> &Arc<RwLock<StatusStore>> {
        &self.status
    }

    pub fn tree(&self) -> &Arc<RwLock<FileTree>> {
        &self.tree
    }

    pub fn files(&self) -> &FileOperationCoordinator<B> {
        &self.files
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.dispatcher.subscribe()
    }

    /// A fresh tail-follow policy using the configured tolerance.
    pub fn autoscroll(&self) -> AutoScroll {
        AutoScroll::new(self.config.autoscroll_tolerance)
    }

    pub async fn start(&self) -> Result<(), SessionError> {
        self.lifecycle(LifecycleAction::Start).await
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.lifecycle(LifecycleAction::Stop).await
    }

    pub async fn restart(&self) -> Result<(), SessionError> {
        self.lifecycle(LifecycleAction::Restart).await
    }

    /// Claims the in-flight flag, then sends the action.
    ///
    /// The flag is claimed under one write lock so two callers cannot both
    /// pass the check. It stays set until the server reports online or
    /// offline, unless the send itself fails.
    async fn lifecycle(&self, action: LifecycleAction) -> Result<(), SessionError> {
        let state = self.channel.state();
        if state != ChannelState::Open {
            return Err(SessionError::ActionRejected(RejectReason::ChannelNotOpen(state)));
        }

        self.status.write().await.begin_action(action)?;
        if let Err(e) = self.channel.send(action.into(), None).await {
            self.status.write().await.abandon_action(action);
            return Err(e);
        }

        info!(parent: &self.span, "⚙️ Requested {} ({})", action, action.flag_label());
        Ok(())
    }

    /// Sends a console command. Blank input is ignored.
    pub async fn command(&self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.channel
            .send(ActionKind::Command, Some(text.to_string()))
            .await
    }

    /// Tears the session down with a normal close.
    pub async fn close(&self) {
        self.channel.close().instrument(self.span.clone()).await;
        info!(parent: &self.span, "👋 Session closed");
    }
}
