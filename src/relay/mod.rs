//! Ядро ретранслятора: подписчики, каналы и реестр каналов.

pub mod channel;
pub mod connection;
pub mod registry;

pub use channel::Channel;
pub use connection::{
    close_outcome, Connection, ConnectionId, FrameSink, FrameSource, Inbound, CLOSE_ABNORMAL,
    CLOSE_GOING_AWAY, CLOSE_NORMAL, CLOSE_NO_STATUS,
};
pub use registry::{is_valid_channel_name, Registry, RegistryStats};
