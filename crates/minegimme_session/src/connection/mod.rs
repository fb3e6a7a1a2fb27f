//! Session channel: address derivation, reconnect timing and the manager that
//! owns the socket.

pub mod address;
pub mod manager;
pub mod reconnect;

pub use address::channel_url;
pub use manager::{
    ChannelConfig, ChannelManager, ChannelState, FrameHandler, LinkLoss, NORMAL_CLOSE,
};
pub use reconnect::ReconnectTimer;
