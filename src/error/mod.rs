//! Ошибки приложения.
//!
//! Доменные ошибки ретранслятора живут в крейте `epher-error` и
//! переэкспортируются отсюда. Ошибки утилиты пересылки описаны локально,
//! потому что завязаны на типы `reqwest` и `tokio-tungstenite`.

pub mod forward;

pub use epher_error::*;
pub use forward::ForwardError;
