//! Error types for the session core.
//!
//! Every error here is local to a single session: none of them tear the session
//! down, and none of them terminate the process. Callers decide whether to show,
//! log or ignore them.

use crate::connection::ChannelState;
use crate::messaging::LifecycleAction;
use thiserror::Error;

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The duplex channel could not be opened or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An inbound frame could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An outbound action was refused before it reached the channel.
    #[error("Action rejected: {0}")]
    ActionRejected(RejectReason),

    /// A call on the external file backend failed.
    #[error("Remote {operation} failed: {source}")]
    RemoteOperation {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// Attempted to save an editor buffer that was opened read-only.
    #[error("Buffer for '{0}' is read-only")]
    ReadOnlyBuffer(String),

    /// A rename target that cannot name a sibling entry.
    #[error("Invalid file name: '{0}'")]
    InvalidName(String),

    /// A file-only operation was asked to act on a directory.
    #[error("'{0}' is a directory")]
    NotAFile(String),
}

impl SessionError {
    /// Wraps a backend failure with the name of the operation that issued it.
    pub fn remote(operation: &'static str, source: BackendError) -> Self {
        Self::RemoteOperation { operation, source }
    }
}

/// Why an outbound action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("channel is {0}, not open")]
    ChannelNotOpen(ChannelState),

    #[error("'{0}' is still in flight")]
    ActionInFlight(LifecycleAction),
}

/// Decoding failures for inbound envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unknown envelope type '{0}'")]
    UnknownType(String),

    #[error("Invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

/// Failures reported by a [`crate::files::FileBackend`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server responded {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}
