use std::{fs, io};

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{fmt, registry::LookupSpan, Layer};

use crate::logging::config::FileSinkConfig;

/// Файловый слой с суточной ротацией.
///
/// Запись идёт через фоновый поток; `WorkerGuard` нужно держать до
/// завершения процесса, иначе хвост лога потеряется.
pub fn layer<S>(config: &FileSinkConfig) -> io::Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fs::create_dir_all(&config.dir)?;

    let appender = daily(&config.dir, &config.prefix);
    let (writer, guard) = non_blocking(appender);

    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();

    Ok((layer, guard))
}
