//! Session configuration.

use crate::connection::ChannelConfig;
use crate::files::EditorPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default REST base of a MineGimme backend.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:25401/api/v1/servers";

/// Settings for one live server session.
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// REST base URL; the channel address is derived from it
    pub api_base: String,
    /// Fixed delay before reconnecting after an abnormal close, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Consecutive reconnects allowed without reaching OPEN (unset retries forever)
    pub max_reconnect_attempts: Option<u32>,
    pub connect_timeout_ms: u64,
    /// Bound on the close handshake during teardown
    pub close_timeout_ms: u64,
    /// Timeout for each file backend request
    pub request_timeout_ms: u64,
    /// Console auto-scroll tolerance in display units
    pub autoscroll_tolerance: f32,
    pub editor: EditorPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: None,
            connect_timeout_ms: 10_000,
            close_timeout_ms: 2000,
            request_timeout_ms: 30_000,
            autoscroll_tolerance: crate::console::DEFAULT_AUTOSCROLL_TOLERANCE,
            editor: EditorPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Checks the settings for values the session cannot work with.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is usable, or a message naming the problem.
    pub fn validate(&self) -> Result<(), String> {
        let base = url::Url::parse(&self.api_base)
            .map_err(|e| format!("Invalid api_base '{}': {}", self.api_base, e))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(format!(
                "api_base must use http or https, got '{}'",
                base.scheme()
            ));
        }

        if self.reconnect_delay_ms == 0 {
            return Err("reconnect_delay_ms must be greater than 0".to_string());
        }
        if self.connect_timeout_ms == 0 || self.close_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err("Timeouts must be greater than 0".to_string());
        }
        if self.autoscroll_tolerance.is_nan() || self.autoscroll_tolerance < 0.0 {
            return Err("autoscroll_tolerance must be a non-negative number".to_string());
        }

        self.editor.validate()
    }
}
