//! Утилита пересылки: читает сообщения из WebSocket-каналов и отправляет
//! их POST-запросами на HTTP-адреса. С реестром состояния не делит.

pub mod config;
pub mod route;

use reqwest::Client;
use tokio::task::JoinSet;
use tracing::{error, info};

pub use config::{describe_routes, ForwardConfig, Route};
pub use route::{run_route, send_http_payload};

/// Запускает все маршруты параллельно и ждёт завершения каждого.
///
/// Возвращает количество маршрутов, завершившихся ошибкой.
pub async fn run(config: ForwardConfig) -> usize {
    let client = Client::new();
    info!(routes = config.routes.len(), "Connecting to endpoints");
    info!("Routes:\n{}", describe_routes(&config.routes));

    let mut tasks = JoinSet::new();
    for route in config.routes {
        let client = client.clone();
        tasks.spawn(async move {
            let result = run_route(&route, &client).await;
            (route, result)
        });
    }

    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((route, Err(err))) => {
                failed += 1;
                error!(ws = %route.ws_address, error = %err, "Routing error");
            }
            Err(err) => {
                failed += 1;
                error!(error = %err, "Route task failed");
            }
        }
    }

    info!(failed, "Stopped");
    failed
}
