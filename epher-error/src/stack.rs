use std::{error::Error, fmt, io, panic::Location, sync::Arc};

use crate::{ErrorExt, StatusCode, TransportError};

/// Доменная ошибка с цепочкой контекстов, накопленных по пути наверх.
///
/// Код статуса всегда берётся у исходной ошибки.
#[derive(Clone)]
pub struct StackError {
    source: Arc<dyn ErrorExt>,
    contexts: Vec<ErrorContext>,
}

/// Одно звено контекста и место, где его добавили.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: &'static Location<'static>,
}

impl StackError {
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            source: Arc::new(err),
            contexts: Vec::new(),
        }
    }

    #[track_caller]
    pub fn context(
        mut self,
        message: impl Into<String>,
    ) -> Self {
        self.contexts.push(ErrorContext {
            message: message.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.source.status_code()
    }

    /// Контексты от самого внутреннего к внешнему.
    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for ctx in self.contexts.iter().rev() {
            write!(f, "{}: ", ctx.message)?;
        }
        write!(f, "{}", self.source)
    }
}

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let at: Vec<String> = self
            .contexts
            .iter()
            .map(|ctx| format!("{} @ {}:{}", ctx.message, ctx.location.file(), ctx.location.line()))
            .collect();
        f.debug_struct("StackError")
            .field("code", &self.status_code().to_string())
            .field("source", &self.source.to_string())
            .field("contexts", &at)
            .finish()
    }
}

impl Error for StackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

// Ошибки ввода-вывода при запуске (bind, accept) идут как транспортные.
impl From<io::Error> for StackError {
    fn from(err: io::Error) -> Self {
        Self::new(TransportError::from(err))
    }
}

/// Добавляет контекст к ошибке, превращая её в [`StackError`].
pub trait ResultExt<T> {
    /// Контекст строится только при ошибке.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<StackError>,
{
    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(err.into().context(f())),
        }
    }
}
