use std::{
    fmt::Write,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::relay::RegistryStats;

/// Счётчики HTTP-слоя.
///
/// Рендерятся в текстовом формате Prometheus вместе с gauge-ами реестра.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Все запросы на публикацию
    publish_total: AtomicU64,
    /// Публикации в несуществующий канал
    publish_no_listener_total: AtomicU64,
    /// Неудачные WebSocket-апгрейды
    upgrade_failures_total: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self) {
        self.publish_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_listener(&self) {
        self.publish_no_listener_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upgrade_failure(&self) {
        self.upgrade_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_total(&self) -> u64 {
        self.publish_total.load(Ordering::Relaxed)
    }

    pub fn publish_no_listener_total(&self) -> u64 {
        self.publish_no_listener_total.load(Ordering::Relaxed)
    }

    /// Текст для `GET /metrics`.
    pub fn render(
        &self,
        stats: RegistryStats,
    ) -> String {
        let mut out = String::with_capacity(1024);
        write_metric(
            &mut out,
            "all_publish_ops_total",
            "counter",
            "The total number of publish operations",
            self.publish_total(),
        );
        write_metric(
            &mut out,
            "no_listener_publish_ops_total",
            "counter",
            "The number of publish operations to a channel without listeners",
            self.publish_no_listener_total(),
        );
        write_metric(
            &mut out,
            "websocket_upgrade_failures_total",
            "counter",
            "The number of failed WebSocket upgrades",
            self.upgrade_failures_total.load(Ordering::Relaxed),
        );
        write_metric(
            &mut out,
            "listener_num",
            "gauge",
            "The number of connected subscribers",
            stats.subscribers as u64,
        );
        write_metric(
            &mut out,
            "room_num",
            "gauge",
            "The number of live channels",
            stats.channels as u64,
        );
        out
    }
}

fn write_metric(
    out: &mut String,
    name: &str,
    kind: &str,
    help: &str,
    value: u64,
) {
    // Запись в String не может завершиться ошибкой.
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}
