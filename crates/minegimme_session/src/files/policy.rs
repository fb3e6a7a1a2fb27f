//! Which files open in the text editor and which are downloaded instead.

use super::node::FileNode;
use serde::{Deserialize, Serialize};

/// Default size limit for opening a file as editable text (5 MiB).
pub const DEFAULT_MAX_EDITABLE_BYTES: u64 = 5 * 1024 * 1024;

/// Rules deciding whether a file is text-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPolicy {
    /// Lowercase extensions, without the dot
    pub extensions: Vec<String>,
    pub max_bytes: u64,
}

impl Default for EditorPolicy {
    fn default() -> Self {
        Self {
            extensions: [
                "txt",
                "log",
                "cfg",
                "conf",
                "json",
                "yml",
                "yaml",
                "properties",
                "csv",
                "md",
                "xml",
                "toml",
                "ini",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_bytes: DEFAULT_MAX_EDITABLE_BYTES,
        }
    }
}

impl EditorPolicy {
    /// True for files with a listed extension whose known size is within the limit.
    ///
    /// Directories are never editable. A file of unknown size is treated as
    /// binary, since there is no way to tell it fits.
    pub fn is_text_editable(&self, node: &FileNode) -> bool {
        if node.is_dir() {
            return false;
        }
        let Some(ext) = node.extension() else {
            return false;
        };
        if !self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext)) {
            return false;
        }
        matches!(node.size, Some(size) if size <= self.max_bytes)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("editor max_bytes must be greater than 0".to_string());
        }
        if self.extensions.iter().any(|ext| ext.is_empty() || ext.starts_with('.')) {
            return Err("editor extensions must be non-empty and given without the dot".to_string());
        }
        Ok(())
    }
}
