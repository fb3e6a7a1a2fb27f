//! Status store: the latest known state of the remote server.
//!
//! An `info` message replaces the snapshot wholesale; `status` and
//! `player_update` patch single fields. The store also carries the in-flight
//! lifecycle flag, the session error slot and the EULA gate.

use crate::error::{RejectReason, SessionError};
use crate::messaging::LifecycleAction;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Run state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
    Starting,
    Stopping,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServerStatus {
    /// Online and offline are settled states; they end any in-flight action.
    pub fn is_settled(self) -> bool {
        matches!(self, ServerStatus::Online | ServerStatus::Offline)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
            ServerStatus::Starting => "starting",
            ServerStatus::Stopping => "stopping",
            ServerStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Resource metrics, kept as the display strings the server formats them as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(alias = "cpu_usage", default, deserialize_with = "lenient_string")]
    pub cpu: String,
    #[serde(alias = "memory_usage", default, deserialize_with = "lenient_string")]
    pub memory: String,
    /// `online/limit`, e.g. `3/20`
    #[serde(alias = "playerCount", default, deserialize_with = "lenient_string")]
    pub player_count: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uptime: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tps: String,
}

/// Accepts strings, numbers or null for display-only metric fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Addresses players use to reach the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub private_addr: Option<String>,
    pub public_addr: Option<String>,
    pub port: u16,
}

/// Full server snapshot as last reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub name: String,
    pub status: ServerStatus,
    pub server_type: String,
    pub version: String,
    pub metrics: Metrics,
    pub players: Vec<String>,
    pub max_players: u32,
    pub connection: ConnectionInfo,
}

/// Wire shape of an `info` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: ServerStatus,
    #[serde(default, rename = "type")]
    server_type: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    max_players: u32,
    #[serde(default)]
    players: Option<Vec<String>>,
    #[serde(default)]
    ip: Option<IpPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IpPayload {
    #[serde(default)]
    private: Option<String>,
    #[serde(default)]
    public: Option<String>,
}

impl From<InfoPayload> for ServerSnapshot {
    fn from(info: InfoPayload) -> Self {
        let ip = info.ip.unwrap_or_default();
        Self {
            name: info.name,
            status: info.status,
            server_type: info.server_type,
            version: info.version,
            metrics: info.metrics,
            players: info.players.unwrap_or_default(),
            max_players: info.max_players,
            connection: ConnectionInfo {
                private_addr: ip.private,
                public_addr: ip.public,
                port: info.port,
            },
        }
    }
}

/// Holder of the server snapshot and session-level flags.
#[derive(Debug, Clone)]
pub struct StatusStore {
    snapshot: ServerSnapshot,
    loading: bool,
    pending_action: Option<LifecycleAction>,
    error: Option<String>,
    eula_required: bool,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self {
            snapshot: ServerSnapshot::default(),
            loading: true,
            pending_action: None,
            error: None,
            eula_required: false,
        }
    }
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &ServerSnapshot {
        &self.snapshot
    }

    /// True until the first `info` arrives.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn replace(&mut self, snapshot: ServerSnapshot) {
        self.snapshot = snapshot;
        self.loading = false;
    }

    /// Patches the run state. A settled state clears the in-flight action.
    pub fn set_status(&mut self, status: ServerStatus) {
        self.snapshot.status = status;
        if status.is_settled() {
            self.pending_action = None;
        }
    }

    /// Patches the roster and keeps the player-count numerator in step.
    pub fn set_players(&mut self, players: Vec<String>) {
        let limit = self
            .snapshot
            .metrics
            .player_count
            .split_once('/')
            .map(|(_, limit)| limit.to_string())
            .unwrap_or_else(|| self.snapshot.max_players.to_string());
        self.snapshot.metrics.player_count = format!("{}/{}", players.len(), limit);
        self.snapshot.players = players;
    }

    pub fn pending_action(&self) -> Option<LifecycleAction> {
        self.pending_action
    }

    /// Marks `action` as in flight.
    ///
    /// # Errors
    ///
    /// [`SessionError::ActionRejected`] when another action is already in flight.
    pub fn begin_action(&mut self, action: LifecycleAction) -> Result<(), SessionError> {
        if let Some(current) = self.pending_action {
            return Err(SessionError::ActionRejected(RejectReason::ActionInFlight(
                current,
            )));
        }
        self.pending_action = Some(action);
        Ok(())
    }

    /// Drops the in-flight flag for an action that never reached the channel.
    pub(crate) fn abandon_action(&mut self, action: LifecycleAction) {
        if self.pending_action == Some(action) {
            self.pending_action = None;
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn raise_eula_gate(&mut self) {
        self.eula_required = true;
    }

    /// Returns whether the EULA gate was raised, lowering it in the process.
    pub fn take_eula_gate(&mut self) -> bool {
        std::mem::take(&mut self.eula_required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_json() -> Value {
        serde_json::json!({
            "name": "survival",
            "status": "offline",
            "type": "paper",
            "version": "1.20.4",
            "metrics": {
                "cpu_usage": "0.0%",
                "memory_usage": "0.0 MB",
                "player_count": "0/20",
                "uptime": "Offline",
                "tps": "N/A"
            },
            "port": 25565,
            "maxPlayers": 20,
            "players": [],
            "ip": {"private": "192.168.1.4:25565", "public": "203.0.113.9:25565"}
        })
    }

    #[test]
    fn test_info_conversion() {
        let info: InfoPayload = serde_json::from_value(info_json()).unwrap();
        let snapshot = ServerSnapshot::from(info);

        assert_eq!(snapshot.name, "survival");
        assert_eq!(snapshot.server_type, "paper");
        assert_eq!(snapshot.metrics.player_count, "0/20");
        assert_eq!(snapshot.connection.port, 25565);
        assert_eq!(
            snapshot.connection.public_addr.as_deref(),
            Some("203.0.113.9:25565")
        );
    }

    #[test]
    fn test_unknown_status_value() {
        let status: ServerStatus = serde_json::from_value(serde_json::json!("crashed")).unwrap();
        assert_eq!(status, ServerStatus::Unknown);
    }

    #[test]
    fn test_replace_clears_loading() {
        let mut store = StatusStore::new();
        assert!(store.is_loading());
        store.replace(ServerSnapshot::default());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_online_clears_pending_action() {
        let mut store = StatusStore::new();
        store.begin_action(LifecycleAction::Start).unwrap();
        assert_eq!(store.pending_action().map(|a| a.flag_label()), Some("starting"));

        store.set_status(ServerStatus::Starting);
        assert!(store.pending_action().is_some());

        store.set_status(ServerStatus::Online);
        assert!(store.pending_action().is_none());
    }

    #[test]
    fn test_second_action_rejected_while_in_flight() {
        let mut store = StatusStore::new();
        store.begin_action(LifecycleAction::Stop).unwrap();

        let err = store.begin_action(LifecycleAction::Start).unwrap_err();
        assert!(matches!(
            err,
            SessionError::ActionRejected(RejectReason::ActionInFlight(LifecycleAction::Stop))
        ));
    }

    #[test]
    fn test_player_update_patches_roster_and_count() {
        let mut store = StatusStore::new();
        let info: InfoPayload = serde_json::from_value(info_json()).unwrap();
        store.replace(info.into());

        store.set_players(vec!["alex".into(), "steve".into()]);
        assert_eq!(store.snapshot().players.len(), 2);
        assert_eq!(store.snapshot().metrics.player_count, "2/20");
        assert_eq!(store.snapshot().name, "survival");
    }

    #[test]
    fn test_eula_gate_is_one_shot() {
        let mut store = StatusStore::new();
        store.raise_eula_gate();
        assert!(store.take_eula_gate());
        assert!(!store.take_eula_gate());
    }
}
