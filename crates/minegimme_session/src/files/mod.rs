//! Remote filesystem mirror and the operations layered on top of it.
//!
//! * [`FileTree`] rebuilds the directory hierarchy from `file_init` and
//!   `file_update` envelopes.
//! * [`FileOperationCoordinator`] issues user intents against a [`FileBackend`].

pub mod backend;
pub mod clipboard;
pub mod coordinator;
pub mod http;
pub mod node;
pub mod policy;
pub mod tree;

pub use backend::FileBackend;
pub use clipboard::{Clipboard, ClipboardAction, ClipboardEntry};
pub use coordinator::{
    archive_name, upload_target, DeleteConfirmation, EditorBuffer, FileOperationCoordinator,
    OpenOutcome, ROOT_UPLOAD_SENTINEL,
};
pub use http::HttpFileBackend;
pub use node::{ChangeKind, FileChange, FileKind, FileNode, ListingEntry};
pub use policy::{EditorPolicy, DEFAULT_MAX_EDITABLE_BYTES};
pub use tree::FileTree;
