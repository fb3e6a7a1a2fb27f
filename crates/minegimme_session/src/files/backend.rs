//! Abstraction over the remote file operations service.

use crate::error::BackendError;
use async_trait::async_trait;

/// Remote file operations for a single server.
///
/// Paths are relative to the server root and use `/` as separator. Every
/// method either completes on the remote side or returns an error; the file
/// tree is never patched from here, since the resulting change arrives on the
/// channel as a `file_update`.
#[async_trait]
pub trait FileBackend: Send + Sync {
    /// Reads a text file.
    async fn read(&self, path: &str) -> Result<String, BackendError>;

    /// Overwrites a text file.
    async fn write(&self, path: &str, content: &str) -> Result<(), BackendError>;

    /// Uploads `bytes` as `file_name` into the directory `target`.
    ///
    /// `target` is already mapped to its wire form, see
    /// [`crate::files::upload_target`].
    async fn upload(&self, target: &str, file_name: &str, bytes: Vec<u8>) -> Result<(), BackendError>;

    /// Fetches the raw bytes of a file.
    async fn download(&self, path: &str) -> Result<Vec<u8>, BackendError>;

    async fn delete(&self, path: &str) -> Result<(), BackendError>;

    async fn copy(&self, source: &str, destination: &str) -> Result<(), BackendError>;

    /// Moves or renames an entry.
    async fn move_entry(&self, source: &str, destination: &str) -> Result<(), BackendError>;

    /// Creates an archive named `name` holding `paths`.
    async fn archive(&self, paths: &[String], name: &str) -> Result<(), BackendError>;

    /// Extracts an archive next to itself.
    async fn unarchive(&self, path: &str) -> Result<(), BackendError>;
}
