use std::{future::Future, io, net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use epher_error::{EpherResult, ResultExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::{banner, handlers, metrics::RelayMetrics};
use crate::{
    backend::{Backend, RespBackend},
    config::{BackendSettings, Settings},
    relay::Registry,
};

/// Общее состояние HTTP-обработчиков.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub metrics: Arc<RelayMetrics>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            metrics: Arc::new(RelayMetrics::new()),
        }
    }
}

/// Маршруты сервера.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/subscribe/{room}", get(handlers::subscribe))
        .route("/publish/{room}", post(handlers::publish))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Обслуживает соединения до срабатывания `shutdown`.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Подключает backend согласно настройкам.
///
/// Без адреса Redis возвращает `None`. Недоступный при старте Redis
/// считается ошибкой запуска.
pub async fn connect_backend(settings: &BackendSettings) -> EpherResult<Option<Arc<dyn Backend>>> {
    let Some(config) = settings.resp_config() else {
        return Ok(None);
    };

    let address = config.address.clone();
    let backend = RespBackend::connect(config)
        .await
        .with_context(|| format!("Redis at {address} is unreachable"))?;
    Ok(Some(Arc::new(backend)))
}

/// Запускает сервер и работает до Ctrl+C или SIGTERM.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let addr: SocketAddr = settings.listen_addr()?;

    let backend = connect_backend(&settings.backend).await?;
    let backend_label = backend
        .as_ref()
        .map(|b| b.describe())
        .unwrap_or_else(|| "local".to_string());

    let registry = Arc::new(Registry::new(backend));
    let state = AppState::new(registry);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local_addr = listener.local_addr()?;

    banner::print_banner(&local_addr, &backend_label);
    banner::print_startup_log();
    info!(listen = %local_addr, backend = %backend_label, "Relay server started");

    serve(listener, state, shutdown_signal()).await?;

    info!("Relay server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
