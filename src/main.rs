//! Сервер ретрансляции epher.
//!
//! Подписчики подключаются по WebSocket к `/subscribe/{room}`, издатели
//! отправляют `POST /publish/{room}`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use epher::{
    config::{Settings, SettingsOverrides},
    error::StackError,
    logging::{init_logging, LogFormat},
    network::server,
};

/// Аргументы командной строки сервера.
#[derive(Parser)]
#[command(name = "epher")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time fan-out relay over WebSocket", long_about = None)]
struct Cli {
    /// Адрес прослушивания
    #[arg(
        short,
        long,
        env = "EPHER_LISTEN",
        help = "HTTP listen address, e.g. 0.0.0.0:9090 or :9090"
    )]
    listen: Option<String>,
    /// Адрес Redis
    #[arg(
        long = "redis-addr",
        env = "EPHER_REDIS_ADDR",
        help = "Redis host:port; empty runs without a distribution backend"
    )]
    redis_addr: Option<String>,
    #[arg(
        long = "redis-pass",
        env = "EPHER_REDIS_PASS",
        hide_env_values = true,
        help = "Redis password"
    )]
    redis_pass: Option<String>,
    /// Файл конфигурации (TOML)
    #[arg(short, long, help = "Path to a TOML settings file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Log level: trace, debug, info, warn, error")]
    log_level: Option<String>,
    #[arg(long, help = "Log format: pretty, compact, json")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    settings.apply_overrides(SettingsOverrides {
        listen: cli.listen,
        redis_addr: cli.redis_addr,
        redis_password: cli.redis_pass,
        log_level: cli.log_level,
        log_format: cli.log_format,
    });
    settings.validate().context("Invalid settings")?;

    let logging = init_logging(settings.logging.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))?;

    let result = server::run(settings).await;
    if let Err(err) = &result {
        match err.downcast_ref::<StackError>() {
            Some(stack) => {
                tracing::error!(error = %stack, code = %stack.status_code(), "Relay server failed")
            }
            None => tracing::error!(error = %err, "Relay server failed"),
        }
    }

    logging.shutdown();
    result
}
