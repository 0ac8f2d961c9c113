use tracing_subscriber::{fmt, registry::LookupSpan, Layer};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Консольный слой в формате из конфигурации.
pub fn layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target);

    match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    }
}
