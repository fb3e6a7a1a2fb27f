//! # MineGimme Session
//!
//! Live session core for operating one MineGimme game server: the duplex
//! channel to the backend, the console log, the server status snapshot and a
//! client-side mirror of the server's files.
//!
//! ## Architecture
//!
//! State flows one way. The [`connection::ChannelManager`] hands every inbound
//! frame to the [`messaging::Dispatcher`], which applies it to exactly one of
//! the [`console::ConsoleBuffer`], the [`status::StatusStore`] or the
//! [`files::FileTree`]. The [`files::FileOperationCoordinator`] reads the tree
//! and writes only through a [`files::FileBackend`]; the result of its calls
//! comes back over the channel.
//!
//! ## Example
//!
//! ```no_run
//! use minegimme_session::{ServerSession, SessionConfig};
//!
//! # async fn run() -> Result<(), minegimme_session::SessionError> {
//! let session = ServerSession::with_http_backend(SessionConfig::default(), "survival", "token")?;
//! session.connect().await?;
//! session.command("say hello").await?;
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod files;
pub mod messaging;
pub mod session;
pub mod status;

pub use config::SessionConfig;
pub use connection::{ChannelConfig, ChannelManager, ChannelState, FrameHandler, LinkLoss};
pub use console::{AutoScroll, ConsoleBuffer, ConsoleRecord};
pub use error::{BackendError, ProtocolError, RejectReason, SessionError};
pub use messaging::{ActionKind, Dispatcher, Envelope, LifecycleAction, OutboundAction, SessionEvent};
pub use session::ServerSession;
pub use status::{ServerSnapshot, ServerStatus, StatusStore};
