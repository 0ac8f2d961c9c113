use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки кодирования/декодирования RESP-фреймов.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("invalid frame data: {0}")]
    InvalidData(String),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("frame line is not valid UTF-8")]
    InvalidUtf8,
    #[error("frame too large ({len} > {max})")]
    TooLarge { len: usize, max: usize },
    #[error("max array depth exceeded ({max})")]
    DepthLimit { max: usize },
}

impl ErrorExt for FrameError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidData(_) => StatusCode::InvalidFrame,
            Self::InvalidInteger(_) => StatusCode::InvalidInteger,
            Self::InvalidUtf8 => StatusCode::InvalidUtf8,
            Self::TooLarge { .. } => StatusCode::SizeLimit,
            Self::DepthLimit { .. } => StatusCode::DepthLimit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_is_not_retryable() {
        let err = FrameError::TooLarge { len: 10, max: 5 };
        assert_eq!(err.to_string(), "frame too large (10 > 5)");
        assert_eq!(err.status_code(), StatusCode::SizeLimit);
        assert!(!FrameError::InvalidUtf8.status_code().is_retryable());
    }
}
