//! File operation coordinator.
//!
//! Turns user intents into [`FileBackend`] calls. The coordinator reads the
//! tree but never writes it: the authoritative result of every operation comes
//! back later as a `file_update` on the channel.

use super::backend::FileBackend;
use super::clipboard::{Clipboard, ClipboardAction, ClipboardEntry};
use super::node::{basename, join, normalize, parent, FileNode};
use super::policy::EditorPolicy;
use crate::error::SessionError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Stand-in for the tree root when addressing uploads.
///
/// The upload route cannot express an empty target segment, so the root is
/// sent as this reserved name instead.
pub const ROOT_UPLOAD_SENTINEL: &str = "current_directory_super_long_because_empty_string_is_bad_and_also_if_there_were_someone_stupid_enough_to_name_a_folder_like_this_we_need_to_handle_it_properly";

/// Maps an upload directory to its wire form.
pub fn upload_target(dir: &str) -> String {
    let dir = normalize(dir);
    if dir.is_empty() {
        ROOT_UPLOAD_SENTINEL.to_string()
    } else {
        dir
    }
}

/// Archive name for a selection: the first path with `.zip` appended, unless it
/// already carries that extension.
pub fn archive_name(paths: &[String]) -> Option<String> {
    let first = basename(paths.first()?).to_string();
    if first.is_empty() {
        return None;
    }
    if first.to_lowercase().ends_with(".zip") {
        Some(first)
    } else {
        Some(format!("{first}.zip"))
    }
}

/// Text content fetched for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorBuffer {
    pub path: String,
    pub content: String,
    read_only: bool,
}

impl EditorBuffer {
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Result of opening a file node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Text file loaded into a buffer.
    Editor(EditorBuffer),
    /// Not text-editable; offer a download of this path instead.
    Download(String),
}

/// Proof that a delete was explicitly prepared.
///
/// Only [`FileOperationCoordinator::prepare_delete`] can build one.
#[derive(Debug)]
pub struct DeleteConfirmation {
    path: String,
}

impl DeleteConfirmation {
    pub fn path(&self) -> &str {
        &self.path
    }
}

pub struct FileOperationCoordinator<B: FileBackend> {
    backend: Arc<B>,
    clipboard: Mutex<Clipboard>,
    policy: EditorPolicy,
}

impl<B: FileBackend> FileOperationCoordinator<B> {
    pub fn new(backend: Arc<B>, policy: EditorPolicy) -> Self {
        Self {
            backend,
            clipboard: Mutex::new(Clipboard::default()),
            policy,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn policy(&self) -> &EditorPolicy {
        &self.policy
    }

    /// Opens a node: text-editable files are fetched into a writable buffer,
    /// anything else is routed to download.
    ///
    /// # Errors
    ///
    /// * [`SessionError::NotAFile`] for directories
    /// * [`SessionError::RemoteOperation`] when the content fetch fails
    pub async fn open(&self, node: &FileNode) -> Result<OpenOutcome, SessionError> {
        if node.is_dir() {
            return Err(SessionError::NotAFile(node.path.clone()));
        }
        if !self.policy.is_text_editable(node) {
            debug!("📦 '{}' is not text-editable, routing to download", node.path);
            return Ok(OpenOutcome::Download(node.path.clone()));
        }
        let buffer = self.fetch(&node.path, false).await?;
        Ok(OpenOutcome::Editor(buffer))
    }

    /// Fetches a text file into a buffer that [`Self::save`] will refuse.
    pub async fn open_read_only(&self, node: &FileNode) -> Result<EditorBuffer, SessionError> {
        if node.is_dir() {
            return Err(SessionError::NotAFile(node.path.clone()));
        }
        self.fetch(&node.path, true).await
    }

    async fn fetch(&self, path: &str, read_only: bool) -> Result<EditorBuffer, SessionError> {
        let content = self
            .backend
            .read(path)
            .await
            .map_err(|e| SessionError::remote("read", e))?;
        Ok(EditorBuffer {
            path: path.to_string(),
            content,
            read_only,
        })
    }

    /// Replaces the remote file with the buffer's full content.
    pub async fn save(&self, buffer: &EditorBuffer) -> Result<(), SessionError> {
        if buffer.read_only {
            return Err(SessionError::ReadOnlyBuffer(buffer.path.clone()));
        }
        self.backend
            .write(&buffer.path, &buffer.content)
            .await
            .map_err(|e| SessionError::remote("write", e))?;
        info!("💾 Saved '{}'", buffer.path);
        Ok(())
    }

    /// Renames `node` within its directory.
    ///
    /// Returns `false` without contacting the backend when the name is unchanged.
    pub async fn rename(&self, node: &FileNode, new_name: &str) -> Result<bool, SessionError> {
        let new_name = new_name.trim();
        if new_name.is_empty()
            || new_name == "."
            || new_name == ".."
            || new_name.contains(['/', '\\'])
        {
            return Err(SessionError::InvalidName(new_name.to_string()));
        }
        if new_name == node.name {
            return Ok(false);
        }

        let destination = join(&parent(&node.path), new_name);
        self.backend
            .move_entry(&node.path, &destination)
            .await
            .map_err(|e| SessionError::remote("rename", e))?;
        info!("✏️ Renamed '{}' to '{}'", node.path, destination);
        Ok(true)
    }

    pub async fn copy(&self, node: &FileNode) {
        self.clipboard.lock().await.set(ClipboardAction::Copy, &node.path);
    }

    pub async fn cut(&self, node: &FileNode) {
        self.clipboard.lock().await.set(ClipboardAction::Cut, &node.path);
    }

    pub async fn clipboard(&self) -> Option<ClipboardEntry> {
        self.clipboard.lock().await.peek().cloned()
    }

    /// Pastes the clipboard entry into `target_dir`.
    ///
    /// Copies stay on the clipboard; a cut is cleared once the move succeeds.
    /// Returns the destination path, or `None` when the clipboard is empty.
    ///
    /// The clipboard is not locked during the remote call. A copy or cut made
    /// meanwhile replaces the slot and survives this paste.
    pub async fn paste(&self, target_dir: &str) -> Result<Option<String>, SessionError> {
        let Some(entry) = self.clipboard.lock().await.peek().cloned() else {
            return Ok(None);
        };

        let destination = join(target_dir, basename(&entry.source_path));
        match entry.action {
            ClipboardAction::Copy => {
                self.backend
                    .copy(&entry.source_path, &destination)
                    .await
                    .map_err(|e| SessionError::remote("copy", e))?;
            }
            ClipboardAction::Cut => {
                self.backend
                    .move_entry(&entry.source_path, &destination)
                    .await
                    .map_err(|e| SessionError::remote("move", e))?;
                if !self.clipboard.lock().await.clear_if(&entry) {
                    debug!("Clipboard changed during paste, keeping the newer entry");
                }
            }
        }

        info!("📋 Pasted '{}' into '{}'", entry.source_path, destination);
        Ok(Some(destination))
    }

    /// Bundles `paths` into one archive named after the first of them.
    ///
    /// Returns the archive name, or `None` for an empty selection.
    pub async fn archive(&self, paths: &[String]) -> Result<Option<String>, SessionError> {
        let Some(name) = archive_name(paths) else {
            return Ok(None);
        };
        self.backend
            .archive(paths, &name)
            .await
            .map_err(|e| SessionError::remote("archive", e))?;
        info!("🗜️ Archived {} path(s) into '{}'", paths.len(), name);
        Ok(Some(name))
    }

    pub async fn unarchive(&self, path: &str) -> Result<(), SessionError> {
        self.backend
            .unarchive(path)
            .await
            .map_err(|e| SessionError::remote("unarchive", e))
    }

    /// First step of a delete. Nothing is sent until the returned token is
    /// passed to [`Self::confirm_delete`].
    pub fn prepare_delete(&self, node: &FileNode) -> DeleteConfirmation {
        DeleteConfirmation {
            path: node.path.clone(),
        }
    }

    pub async fn confirm_delete(&self, confirmation: DeleteConfirmation) -> Result<(), SessionError> {
        self.backend
            .delete(&confirmation.path)
            .await
            .map_err(|e| SessionError::remote("delete", e))?;
        info!("🗑️ Deleted '{}'", confirmation.path);
        Ok(())
    }

    /// Uploads `bytes` as `file_name` into `target_dir`; an empty directory is the root.
    pub async fn upload(
        &self,
        target_dir: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), SessionError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(SessionError::InvalidName(file_name.to_string()));
        }
        let target = upload_target(target_dir);
        self.backend
            .upload(&target, file_name, bytes)
            .await
            .map_err(|e| SessionError::remote("upload", e))
    }

    pub async fn download(&self, path: &str) -> Result<Vec<u8>, SessionError> {
        self.backend
            .download(path)
            .await
            .map_err(|e| SessionError::remote("download", e))
    }
}
