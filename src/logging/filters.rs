use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Собирает фильтр событий.
///
/// Если задан `RUST_LOG`, он имеет приоритет над конфигурацией. Некорректная
/// директива из конфигурации заменяется на `info`.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use tracing_subscriber::{fmt, prelude::*, registry::Registry};

    use super::*;

    // Мини-буферный writer для тестов
    #[derive(Clone)]
    struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_with(filter: EnvFilter) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = fmt::layer()
            .with_ansi(false)
            .with_writer(VecMakeWriter(buffer.clone()))
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("info message");
            tracing::warn!("warn message");
        });

        let out = buffer.lock().unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Уровень из конфигурации отсекает более подробные события.
    #[test]
    #[serial]
    fn test_config_level_filters_events() {
        env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "warn".to_string(),
            ..Default::default()
        };

        let out = capture_with(build_filter_from_config(&config));
        assert!(out.contains("warn message"));
        assert!(!out.contains("info message"));
    }

    /// `RUST_LOG` важнее уровня из конфигурации.
    #[test]
    #[serial]
    fn test_rust_log_wins() {
        env::set_var("RUST_LOG", "info");
        let config = LoggingConfig {
            level: "error".to_string(),
            ..Default::default()
        };

        let filter = build_filter_from_config(&config);
        env::remove_var("RUST_LOG");

        let out = capture_with(filter);
        assert!(out.contains("info message"));
    }

    /// Некорректная директива не роняет процесс, а даёт `info`.
    #[test]
    #[serial]
    fn test_invalid_directive_falls_back_to_info() {
        env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            directives: vec!["epher=loud".to_string()],
            ..Default::default()
        };

        let out = capture_with(build_filter_from_config(&config));
        assert!(out.contains("info message"));
    }
}
