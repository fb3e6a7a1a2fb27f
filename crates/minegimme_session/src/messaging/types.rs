//! Wire message definitions for the server channel.
//!
//! Inbound frames are tagged envelopes of the form `{"type": ..., "data": ...}`.
//! Outbound frames are actions of the form `{"action": ..., "data"?: ...}`.

use crate::console::ConsoleRecord;
use crate::error::ProtocolError;
use crate::files::{FileChange, ListingEntry};
use crate::status::{InfoPayload, ServerSnapshot, ServerStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A decoded inbound message.
///
/// # Example Frames
///
/// ```json
/// {"type": "console", "data": {"text": "Done (3.2s)!", "type": "success", "timestamp": "12:00:01"}}
/// {"type": "status", "data": "online"}
/// {"type": "file_update", "changes": [{"event": "added", "path": "world/level.dat"}], "data": [...]}
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Console(ConsoleRecord),
    Info(ServerSnapshot),
    Status(ServerStatus),
    PlayerUpdate(Vec<String>),
    NeedEula,
    Error(String),
    Ping,
    FileInit(Vec<ListingEntry>),
    FileUpdate(FileUpdate),
}

/// Incremental filesystem change list plus the refreshed listing that
/// accompanies it on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdate {
    /// Changes in the order they must be applied
    pub changes: Vec<FileChange>,
    /// Flat listing sent alongside the changes; used for entry metadata only
    pub listing: Vec<ListingEntry>,
}

/// Raw frame shape before the payload is interpreted.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    changes: Option<Value>,
}

impl Envelope {
    /// Decodes a text frame into an envelope.
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::InvalidJson`] when the frame is not a JSON object with a `type`
    /// * [`ProtocolError::UnknownType`] when the tag is not one this client understands
    /// * [`ProtocolError::InvalidPayload`] when `data` does not match the tag
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;

        let envelope = match raw.kind.as_str() {
            "console" => Envelope::Console(payload("console", raw.data)?),
            "info" => {
                let info: InfoPayload = payload("info", raw.data)?;
                Envelope::Info(info.into())
            }
            "status" => Envelope::Status(payload("status", raw.data)?),
            "player_update" => Envelope::PlayerUpdate(payload("player_update", raw.data)?),
            "need_eula" => Envelope::NeedEula,
            "error" => Envelope::Error(match raw.data {
                Value::String(message) => message,
                Value::Null => "unknown error".to_string(),
                other => other.to_string(),
            }),
            "ping" => Envelope::Ping,
            "file_init" => Envelope::FileInit(payload("file_init", raw.data)?),
            "file_update" => Envelope::FileUpdate(match raw.changes {
                Some(changes) => FileUpdate {
                    changes: payload("file_update", changes)?,
                    listing: match raw.data {
                        Value::Null => Vec::new(),
                        data => payload("file_update", data)?,
                    },
                },
                // Bare form: the change list travels in `data`
                None => FileUpdate {
                    changes: payload("file_update", raw.data)?,
                    listing: Vec::new(),
                },
            }),
            _ => return Err(ProtocolError::UnknownType(raw.kind)),
        };

        Ok(envelope)
    }

    /// The wire tag of this envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Console(_) => "console",
            Envelope::Info(_) => "info",
            Envelope::Status(_) => "status",
            Envelope::PlayerUpdate(_) => "player_update",
            Envelope::NeedEula => "need_eula",
            Envelope::Error(_) => "error",
            Envelope::Ping => "ping",
            Envelope::FileInit(_) => "file_init",
            Envelope::FileUpdate(_) => "file_update",
        }
    }
}

fn payload<T: DeserializeOwned>(kind: &'static str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

/// Verb of an outbound action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
    Pong,
    Command,
}

/// A message sent from this client to the server.
///
/// ```json
/// {"action": "command", "data": "say hello"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAction {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl OutboundAction {
    pub fn new(action: ActionKind, data: Option<String>) -> Self {
        Self { action, data }
    }

    /// Keepalive reply to a server `ping`.
    pub fn pong() -> Self {
        Self::new(ActionKind::Pong, None)
    }

    pub fn to_json(&self) -> String {
        // A struct of an enum and an optional string always serializes
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Server lifecycle actions guarded by the in-flight flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    /// Label shown while the action is in flight.
    pub fn flag_label(self) -> &'static str {
        match self {
            LifecycleAction::Start => "starting",
            LifecycleAction::Stop => "stopping",
            LifecycleAction::Restart => "restarting",
        }
    }
}

impl From<LifecycleAction> for ActionKind {
    fn from(action: LifecycleAction) -> Self {
        match action {
            LifecycleAction::Start => ActionKind::Start,
            LifecycleAction::Stop => ActionKind::Stop,
            LifecycleAction::Restart => ActionKind::Restart,
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        };
        f.write_str(name)
    }
}
