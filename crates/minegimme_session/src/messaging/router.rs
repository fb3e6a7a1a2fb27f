//! Envelope dispatcher.
//!
//! Routes every decoded envelope to exactly one state owner, in arrival order,
//! and republishes what it applied as a [`SessionEvent`].

use super::types::{Envelope, OutboundAction};
use crate::connection::{FrameHandler, LinkLoss};
use crate::console::{ConsoleBuffer, ConsoleRecord};
use crate::files::{FileChange, FileTree};
use crate::status::{ServerSnapshot, ServerStatus, StatusStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

/// Capacity of the session event channel. Slow observers skip ahead.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Session Events
// ============================================================================

/// Notification of a state change applied by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Console(ConsoleRecord),
    SnapshotReplaced(ServerSnapshot),
    StatusChanged(ServerStatus),
    PlayersChanged(Vec<String>),
    /// The server refuses to start until its EULA is accepted
    EulaRequired,
    Error(String),
    FilesReplaced { entries: usize },
    FilesChanged(Vec<FileChange>),
    LinkLost(LinkLoss),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Applies envelopes to the console buffer, status store and file tree.
pub struct Dispatcher {
    console: Arc<RwLock<ConsoleBuffer>>,
    status: Arc<RwLock<StatusStore>>,
    tree: Arc<RwLock<FileTree>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Dispatcher {
    pub fn new(
        console: Arc<RwLock<ConsoleBuffer>>,
        status: Arc<RwLock<StatusStore>>,
        tree: Arc<RwLock<FileTree>>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            console,
            status,
            tree,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; the stores already hold the state
        let _ = self.events.send(event);
    }

    /// Applies one envelope. Returns the reply to write back, if any.
    pub async fn dispatch(&self, envelope: Envelope) -> Option<OutboundAction> {
        debug!("📨 Dispatching '{}'", envelope.kind());

        match envelope {
            Envelope::Console(record) => {
                self.console.write().await.push(record.clone());
                self.publish(SessionEvent::Console(record));
            }
            Envelope::Info(snapshot) => {
                self.status.write().await.replace(snapshot.clone());
                self.publish(SessionEvent::SnapshotReplaced(snapshot));
            }
            Envelope::Status(status) => {
                self.status.write().await.set_status(status);
                self.publish(SessionEvent::StatusChanged(status));
            }
            Envelope::PlayerUpdate(players) => {
                self.status.write().await.set_players(players.clone());
                self.publish(SessionEvent::PlayersChanged(players));
            }
            Envelope::NeedEula => {
                self.status.write().await.raise_eula_gate();
                self.publish(SessionEvent::EulaRequired);
            }
            Envelope::Error(message) => {
                warn!("Server reported error: {}", message);
                self.status.write().await.set_error(message.clone());
                self.publish(SessionEvent::Error(message));
            }
            Envelope::Ping => return Some(OutboundAction::pong()),
            Envelope::FileInit(entries) => {
                self.tree.write().await.replace_all(&entries);
                self.publish(SessionEvent::FilesReplaced {
                    entries: entries.len(),
                });
            }
            Envelope::FileUpdate(update) => {
                self.tree
                    .write()
                    .await
                    .apply_changes(&update.changes, &update.listing);
                self.publish(SessionEvent::FilesChanged(update.changes));
            }
        }

        None
    }
}

#[async_trait]
impl FrameHandler for Dispatcher {
    async fn handle_frame(&self, text: &str) -> Option<OutboundAction> {
        match Envelope::decode(text) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(e) => {
                warn!("⚠️ Discarding inbound frame: {}", e);
                None
            }
        }
    }

    async fn on_link_lost(&self, loss: LinkLoss) {
        let what = if loss.was_open {
            "connection lost"
        } else {
            "connection failed"
        };
        let cause = match loss.code {
            Some(code) => format!("{what} (code {code})"),
            None if loss.was_open => format!("{what} (no close frame)"),
            None => what.to_string(),
        };
        let text = match loss.retry_in {
            Some(delay) => format!("{cause}, reconnecting in {}s", delay.as_secs_f32()),
            None => format!("{cause}, giving up"),
        };

        let record = self.console.write().await.push_local("system", text);
        self.publish(SessionEvent::Console(record));
        self.publish(SessionEvent::LinkLost(loss));
    }
}
