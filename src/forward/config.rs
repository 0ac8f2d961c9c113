use std::{fmt::Write, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ForwardError;

/// Файл маршрутов утилиты пересылки.
///
/// ```json
/// { "routes": [ { "ws_address": "ws://host:9090/subscribe/room1",
///                 "http_url": "http://backend/hook",
///                 "forward_response": true } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardConfig {
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// Один маршрут: WebSocket-источник → HTTP-приёмник.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub ws_address: String,
    pub http_url: String,
    /// Отправлять тело HTTP-ответа обратно в WebSocket.
    #[serde(default)]
    pub forward_response: bool,
}

impl ForwardConfig {
    /// Читает и проверяет файл маршрутов.
    pub fn load(path: &Path) -> Result<Self, ForwardError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ForwardError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ForwardError> {
        let config: ForwardConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверяет схемы адресов.
    ///
    /// Сборка идёт без TLS, поэтому `wss://` и `https://` отклоняются
    /// сразу, а не на первом подключении.
    pub fn validate(&self) -> Result<(), ForwardError> {
        for (index, route) in self.routes.iter().enumerate() {
            check_scheme(index, "ws_address", &route.ws_address, "ws://", "wss://")?;
            check_scheme(index, "http_url", &route.http_url, "http://", "https://")?;
        }
        Ok(())
    }
}

fn check_scheme(
    index: usize,
    field: &str,
    url: &str,
    plain: &str,
    secure: &str,
) -> Result<(), ForwardError> {
    let lower = url.trim().to_ascii_lowercase();
    let reason = if lower.starts_with(secure) {
        format!("{field} `{url}` uses {secure}, TLS is not supported")
    } else if !lower.starts_with(plain) || lower.len() == plain.len() {
        format!("{field} `{url}` is not a {plain} URL")
    } else {
        return Ok(());
    };
    Err(ForwardError::InvalidRoute { index, reason })
}

/// Таблица маршрутов для лога запуска, по строке на маршрут.
pub fn describe_routes(routes: &[Route]) -> String {
    let mut out = String::new();
    for route in routes {
        let forwarding = if route.forward_response {
            "enabled"
        } else {
            "disabled"
        };
        let _ = writeln!(
            out,
            "{} -> {} (forwarding: {forwarding})",
            route.ws_address, route.http_url
        );
    }
    out
}
