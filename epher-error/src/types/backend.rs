use thiserror::Error;

use crate::{ErrorExt, FrameError, StatusCode};

/// Ошибки backend-а распределения сообщений между инстансами.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Не удалось подключиться к backend-у.
    #[error("failed to connect to backend at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },
    /// Ошибка ввода-вывода на уже установленном соединении.
    #[error("backend I/O error: {reason}")]
    Io { reason: String },
    /// Нарушение протокола (неожиданный или битый ответ).
    #[error("backend protocol error: {reason}")]
    Protocol { reason: String },
    /// Backend ответил ошибкой.
    #[error("backend rejected the command: {reason}")]
    Rejected { reason: String },
    /// Backend временно недоступен.
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },
    /// Подписка или соединение уже закрыты.
    #[error("backend subscription closed")]
    Closed,
}

impl ErrorExt for BackendError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ConnectionFailed { .. } | Self::Unavailable { .. } => {
                StatusCode::BackendUnavailable
            }
            Self::Io { .. } => StatusCode::Io,
            Self::Protocol { .. } => StatusCode::BackendProtocol,
            Self::Rejected { .. } => StatusCode::BackendRejected,
            Self::Closed => StatusCode::ConnectionClosed,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<FrameError> for BackendError {
    fn from(err: FrameError) -> Self {
        BackendError::Protocol {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_codes() {
        let err = BackendError::ConnectionFailed {
            address: "redis:6379".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BackendUnavailable);
        assert!(err.status_code().is_retryable());
        assert!(BackendError::Closed.status_code().is_retryable());

        let rejected = BackendError::Rejected {
            reason: "ERR wrong number of arguments".to_string(),
        };
        assert_eq!(rejected.status_code(), StatusCode::BackendRejected);
        assert!(!rejected.status_code().is_retryable());

        let garbage = BackendError::Protocol {
            reason: "unexpected reply".to_string(),
        };
        assert!(!garbage.status_code().is_retryable());
    }

    #[test]
    fn test_conversions() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(BackendError::from(io), BackendError::Io { .. }));

        let frame = FrameError::InvalidData("bad type byte".to_string());
        assert!(matches!(
            BackendError::from(frame),
            BackendError::Protocol { .. }
        ));
    }
}
