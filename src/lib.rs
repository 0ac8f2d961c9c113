/// Distribution backends: trait, in-memory bus, RESP (Redis) client.
pub mod backend;
/// Server configuration loading.
pub mod config;
/// Common error types: transport, backend, frame codec, configuration.
pub mod error;
/// WebSocket → HTTP forwarding utility.
pub mod forward;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Network stack: axum HTTP server, WebSocket adapter, metrics.
pub mod network;
/// Relay core: connections, channels, channel registry.
pub mod relay;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Backends and subscriptions.
pub use backend::{Backend, MemoryBackend, RespBackend, RespConfig, Subscription};
/// config
pub use config::{BackendSettings, Settings, SettingsOverrides};
/// Operation errors and result types.
pub use error::{
    BackendError, ConfigError, EpherResult, ForwardError, FrameError, StackError, TransportError,
};
/// Logging initialisation.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Network server.
pub use network::{server, AppState, RelayMetrics};
/// Relay API.
pub use relay::{Channel, Connection, ConnectionId, FrameSink, FrameSource, Inbound, Registry};
