//! Channel protocol: envelope types and the dispatcher that applies them.

pub mod router;
pub mod types;

pub use router::{Dispatcher, SessionEvent, EVENT_CHANNEL_CAPACITY};
pub use types::{ActionKind, Envelope, FileUpdate, LifecycleAction, OutboundAction};
