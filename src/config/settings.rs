use std::{net::SocketAddr, path::Path, time::Duration};

use ::config::{Config, Environment, File};
use epher_error::ConfigError;
use serde::{Deserialize, Serialize};

use crate::{
    backend::RespConfig,
    logging::{LogFormat, LoggingConfig},
};

/// Адрес по умолчанию, как у исходного сервиса: все интерфейсы, порт 9090.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:9090";

/// Настройки сервера ретрансляции.
///
/// Источники в порядке приоритета: флаги командной строки, переменные
/// окружения `EPHER_*` (вложенность через `__`, например
/// `EPHER_BACKEND__REDIS_ADDR`), файл конфигурации, значения по умолчанию.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Адрес HTTP-сервера. Допускается форма `:9090`.
    pub listen: String,
    pub backend: BackendSettings,
    pub logging: LoggingConfig,
}

/// Настройки backend-а распределения.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// `host:port` Redis-сервера. Пусто: работа без backend-а.
    pub redis_addr: Option<String>,
    pub redis_password: Option<String>,
    pub redis_db: i64,
    pub connect_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    pub subscription_capacity: usize,
}

/// Значения из командной строки, перекрывающие остальные источники.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub listen: Option<String>,
    pub redis_addr: Option<String>,
    pub redis_password: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            backend: BackendSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            redis_addr: None,
            redis_password: None,
            redis_db: 0,
            connect_timeout_ms: 5_000,
            reconnect_delay_ms: 1_000,
            subscription_capacity: crate::backend::DEFAULT_SUBSCRIPTION_CAPACITY,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Settings {
    /// Загружает настройки из значений по умолчанию, файла (если указан)
    /// и переменных окружения.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("listen", DEFAULT_LISTEN)
            .map_err(load_error)?
            .set_default("logging.level", "info")
            .map_err(load_error)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let cfg = builder
            .add_source(
                Environment::with_prefix("EPHER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_error)?;

        cfg.try_deserialize().map_err(load_error)
    }

    /// Применяет значения из командной строки.
    pub fn apply_overrides(
        &mut self,
        overrides: SettingsOverrides,
    ) {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if let Some(addr) = overrides.redis_addr {
            self.backend.redis_addr = Some(addr);
        }
        if let Some(password) = overrides.redis_password {
            self.backend.redis_password = Some(password);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
    }

    /// Разбирает адрес прослушивания. `:9090` означает все интерфейсы.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = self.listen.trim();
        let normalized = if raw.starts_with(':') {
            format!("0.0.0.0{raw}")
        } else {
            raw.to_string()
        };

        normalized.parse().map_err(|e| ConfigError::Invalid {
            field: "listen".to_string(),
            reason: format!("`{raw}` is not an ip:port address ({e})"),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        self.backend.validate()?;
        self.logging.validate()
    }
}

impl BackendSettings {
    /// Адрес Redis, если он задан и не пуст.
    pub fn redis_addr(&self) -> Option<&str> {
        self.redis_addr
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
    }

    pub fn is_distributed(&self) -> bool {
        self.redis_addr().is_some()
    }

    /// Параметры RESP-клиента; `None` без адреса.
    pub fn resp_config(&self) -> Option<RespConfig> {
        let address = self.redis_addr()?;
        let mut config = RespConfig::new(address);
        config.password = self
            .redis_password
            .clone()
            .filter(|p| !p.is_empty());
        config.database = self.redis_db;
        config.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        config.reconnect_delay = Duration::from_millis(self.reconnect_delay_ms);
        config.channel_capacity = self.subscription_capacity;
        Some(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(addr) = self.redis_addr() {
            let port_ok = addr
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false);
            if !port_ok {
                return Err(invalid(
                    "backend.redis_addr",
                    format!("`{addr}` must be host:port"),
                ));
            }
        }
        if self.redis_db < 0 {
            return Err(invalid("backend.redis_db", "must not be negative"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("backend.connect_timeout_ms", "must be positive"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(invalid("backend.reconnect_delay_ms", "must be positive"));
        }
        if self.subscription_capacity == 0 {
            return Err(invalid("backend.subscription_capacity", "must be positive"));
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Внутренние функции
////////////////////////////////////////////////////////////////////////////////

fn load_error(err: ::config::ConfigError) -> ConfigError {
    ConfigError::Load {
        reason: err.to_string(),
    }
}

fn invalid(
    field: &str,
    reason: impl Into<String>,
) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
