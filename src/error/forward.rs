use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Ошибки утилиты пересылки WebSocket → HTTP.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to read config file {}: {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ParseConfig(#[from] serde_json::Error),

    #[error("invalid route #{index}: {reason}")]
    InvalidRoute { index: usize, reason: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket closed with code {code}")]
    Closed { code: u16 },
}

impl ForwardError {
    /// `true` для ошибок конфигурации, после которых запускаться нельзя.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ReadConfig { .. } | Self::ParseConfig(_) | Self::InvalidRoute { .. }
        )
    }
}
