use std::{path::PathBuf, str::FromStr};

use epher_error::ConfigError;
use serde::{Deserialize, Serialize};

/// Уровни, которые принимает поле `level`.
const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Формат вывода в консоль.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Многострочный человекочитаемый вывод.
    Pretty,
    /// Однострочный вывод.
    #[default]
    Compact,
    /// JSON-строка на событие.
    Json,
}

/// Настройки файлового синка.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub enabled: bool,
    /// Каталог для файлов; создаётся при старте.
    pub dir: PathBuf,
    /// Префикс имени файла. Файлы ротируются раз в сутки.
    pub prefix: String,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: trace, debug, info, warn, error, off.
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    /// Дополнительные директивы `EnvFilter`, например `hyper=warn`.
    pub directives: Vec<String>,
    pub file: FileSinkConfig,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("logs"),
            prefix: "epher.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            directives: Vec::new(),
            file: FileSinkConfig::default(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid {
                field: "logging.format".to_string(),
                reason: format!("unknown format `{other}` (expected pretty, compact or json)"),
            }),
        }
    }
}

impl LoggingConfig {
    /// Строка директив для `EnvFilter`: уровень, затем дополнительные
    /// директивы через запятую.
    pub fn build_filter_directive(&self) -> String {
        std::iter::once(self.level.trim().to_ascii_lowercase())
            .chain(
                self.directives
                    .iter()
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Применяет `EPHER_LOG_LEVEL` и `EPHER_LOG_FORMAT`.
    ///
    /// Некорректный формат из окружения игнорируется.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("EPHER_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.level = level;
            }
        }
        if let Ok(format) = std::env::var("EPHER_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.trim().to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid {
                field: "logging.level".to_string(),
                reason: format!("unknown level `{}`", self.level),
            });
        }
        if self.file.enabled && self.file.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "logging.file.prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
