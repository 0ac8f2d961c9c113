//! Логирование на базе `tracing`.
//!
//! Консольный слой (pretty, compact или json) плюс необязательный файловый
//! слой с суточной ротацией. Фильтр собирается из `RUST_LOG`, а при его
//! отсутствии из конфигурации.

pub mod config;
mod filters;
pub mod handle;
pub mod sinks;

pub use config::{FileSinkConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

type FilteredRegistry = Layered<EnvFilter, Registry>;

/// Инициализация логирования с конфигурацией.
///
/// Устанавливает глобальный subscriber; повторный вызов вернёт ошибку.
pub fn init_logging(
    mut config: LoggingConfig
) -> Result<LoggingHandle, Box<dyn std::error::Error + Send + Sync>> {
    config.apply_env_overrides();
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<FilteredRegistry> + Send + Sync>> = Vec::new();

    // Console layer
    layers.push(sinks::console::layer(&config));

    // File layer
    let file_guard = if config.file.enabled {
        let (file_layer, guard) = sinks::file::layer(&config.file)?;
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        file_enabled = config.file.enabled,
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
