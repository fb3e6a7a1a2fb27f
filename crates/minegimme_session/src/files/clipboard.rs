//! Single-slot clipboard for copy and cut.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub action: ClipboardAction,
    pub source_path: String,
}

/// Holds at most one pending copy or cut. Setting it replaces whatever was there.
#[derive(Debug, Default, Clone)]
pub struct Clipboard {
    slot: Option<ClipboardEntry>,
}

impl Clipboard {
    pub fn set(&mut self, action: ClipboardAction, source_path: impl Into<String>) {
        self.slot = Some(ClipboardEntry {
            action,
            source_path: source_path.into(),
        });
    }

    pub fn peek(&self) -> Option<&ClipboardEntry> {
        self.slot.as_ref()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// Clears the slot only if it still holds `entry`. Returns whether it did.
    pub fn clear_if(&mut self, entry: &ClipboardEntry) -> bool {
        if self.slot.as_ref() == Some(entry) {
            self.slot = None;
            true
        } else {
            false
        }
    }
}
