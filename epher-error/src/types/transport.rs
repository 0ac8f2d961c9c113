use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки потока подписчика (WebSocket или его тестовая замена).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Пир закрыл соединение с кодом, отличным от штатного.
    #[error("connection closed with code {code}: {reason}")]
    Closed { code: u16, reason: String },
    /// Поток оборвался без close-фрейма.
    #[error("connection dropped without a close frame")]
    Eof,
    /// Ошибка чтения или записи.
    #[error("transport I/O error: {reason}")]
    Io { reason: String },
}

impl TransportError {
    pub fn io(reason: impl ToString) -> Self {
        Self::Io {
            reason: reason.to_string(),
        }
    }
}

impl ErrorExt for TransportError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed { .. } => StatusCode::ConnectionClosed,
            Self::Eof => StatusCode::UnexpectedEof,
            Self::Io { .. } => StatusCode::Io,
        }
    }

}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err)
    }
}
