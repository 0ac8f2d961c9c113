use std::error::Error;

use crate::StatusCode;

/// Доменная ошибка ретранслятора: обычная ошибка плюс код статуса.
pub trait ErrorExt: Error + Send + Sync + 'static {
    fn status_code(&self) -> StatusCode;
}
