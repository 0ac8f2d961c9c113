use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки загрузки и проверки настроек.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {reason}")]
    Load { reason: String },
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Load { .. } => StatusCode::ConfigLoad,
            Self::Invalid { .. } => StatusCode::ConfigInvalid,
        }
    }
}
