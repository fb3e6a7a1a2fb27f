//! File tree node types, wire listing entries and path helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// One row of a flat remote listing.
///
/// ```json
/// {"path": "world/level.dat", "name": "level.dat", "type": "file", "size": 2048, "modified": "2024-05-01T10:00:00"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: FileKind,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified: Option<String>,
}

impl ListingEntry {
    pub fn file(path: &str, size: u64, modified: &str) -> Self {
        Self {
            path: path.to_string(),
            name: basename(path).to_string(),
            kind: FileKind::File,
            size: Some(size),
            modified: Some(modified.to_string()),
        }
    }

    pub fn directory(path: &str, modified: &str) -> Self {
        Self {
            path: path.to_string(),
            name: basename(path).to_string(),
            kind: FileKind::Directory,
            size: None,
            modified: Some(modified.to_string()),
        }
    }
}

/// Kind of incremental change reported by the remote watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One entry of a `file_update` change list.
///
/// The watcher only reports `{event, path}`; entry metadata, when present,
/// comes from the listing that travels with the update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(rename = "event", alias = "kind")]
    pub kind: ChangeKind,
    pub path: String,
    #[serde(default, rename = "type")]
    pub entry_kind: Option<FileKind>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified: Option<String>,
}

impl FileChange {
    pub fn new(kind: ChangeKind, path: &str) -> Self {
        Self {
            kind,
            path: path.to_string(),
            entry_kind: None,
            size: None,
            modified: None,
        }
    }
}

/// A node of the reconstructed tree. Only directories have children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    /// Normalized path from the tree root; empty for the root itself
    pub path: String,
    pub name: String,
    pub kind: FileKind,
    /// Byte size, files only
    pub size: Option<u64>,
    pub modified: Option<String>,
    pub children: BTreeMap<String, FileNode>,
}

impl FileNode {
    pub(crate) fn root() -> Self {
        Self::directory(String::new(), String::new(), None)
    }

    pub(crate) fn directory(path: String, name: String, modified: Option<String>) -> Self {
        Self {
            path,
            name,
            kind: FileKind::Directory,
            size: None,
            modified,
            children: BTreeMap::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// File extension, lowercased, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Splits a remote path into its meaningful segments.
///
/// Both `/` and `\` separate segments; empty and `.` segments are dropped.
pub fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect()
}

/// Canonical form of a path: segments joined with `/`, no leading or trailing separator.
pub fn normalize(path: &str) -> String {
    segments(path).join("/")
}

/// Last segment of a path, or the empty string for the root.
pub fn basename(path: &str) -> &str {
    segments(path).last().copied().unwrap_or("")
}

/// Parent path, or the empty string for top-level entries.
pub fn parent(path: &str) -> String {
    let segs = segments(path);
    match segs.split_last() {
        Some((_, parents)) => parents.join("/"),
        None => String::new(),
    }
}

/// Joins a directory and a child name; an empty directory is the root.
pub fn join(dir: &str, name: &str) -> String {
    let dir = normalize(dir);
    if dir.is_empty() {
        normalize(name)
    } else {
        format!("{dir}/{}", normalize(name))
    }
}
