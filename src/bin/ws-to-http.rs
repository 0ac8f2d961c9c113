//! Пересылка сообщений из WebSocket-каналов на HTTP-адреса.
//!
//! Маршруты описываются JSON-файлом, см. [`epher::forward::ForwardConfig`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use epher::{
    forward::{self, ForwardConfig},
    logging::{init_logging, LoggingConfig},
};

#[derive(Parser)]
#[command(name = "ws-to-http")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forward WebSocket messages to HTTP endpoints", long_about = None)]
struct Cli {
    /// Файл маршрутов
    #[arg(
        long = "config-file",
        alias = "configFile",
        default_value = "config.json",
        help = "Path to the JSON routes file"
    )]
    config_file: PathBuf,
    #[arg(long, default_value = "info", help = "Log level")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = init_logging(LoggingConfig {
        level: cli.log_level,
        ..Default::default()
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))?;

    let config = ForwardConfig::load(&cli.config_file)
        .with_context(|| format!("Failed to load {}", cli.config_file.display()))?;

    let failed = forward::run(config).await;

    logging.shutdown();
    if failed > 0 {
        anyhow::bail!("{failed} route(s) ended with an error");
    }
    Ok(())
}
