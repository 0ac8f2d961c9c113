//! Сетевой слой: HTTP-сервер на axum.
//!
//! ## Подмодули
//!
//! - `server`: состояние, маршруты и запуск сервера.
//! - `handlers`: обработчики подписки, публикации, метрик и health.
//! - `ws`: адаптер WebSocket-соединения к потокам подписчика.
//! - `metrics`: счётчики в текстовом формате Prometheus.
//! - `banner`: баннер при старте.

pub mod banner;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod ws;

pub use metrics::RelayMetrics;
pub use server::{router, serve, AppState};
