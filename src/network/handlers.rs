use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, warn};

use super::{server::AppState, ws};
use crate::relay::{is_valid_channel_name, Connection};

/// Тело ответа на публикацию в канал без подписчиков.
pub const NO_ROOM: &str = "no_room";
/// Тело ответа на неудачный WebSocket-апгрейд.
pub const UPGRADE_FAILED: &str = "websocket_upgrade_failed";

/// `GET /subscribe/{room}`: апгрейд до WebSocket и подписка на канал.
pub async fn subscribe(
    State(state): State<AppState>,
    Path(room): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_valid_channel_name(&room) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(channel = %room, error = %rejection, "WebSocket upgrade failed");
            state.metrics.record_upgrade_failure();
            return (StatusCode::INTERNAL_SERVER_ERROR, UPGRADE_FAILED).into_response();
        }
    };

    let metrics = state.metrics.clone();
    upgrade
        .on_failed_upgrade(move |err| {
            warn!(error = %err, "WebSocket handshake did not complete");
            metrics.record_upgrade_failure();
        })
        .on_upgrade(move |socket| serve_socket(state, room, socket))
}

async fn serve_socket(
    state: AppState,
    room: String,
    socket: WebSocket,
) {
    let (sink, source) = ws::split(socket);
    let conn = Arc::new(Connection::new(sink, source));
    let conn_id = conn.id();
    info!(channel = %room, conn_id, "Subscriber connected");

    match state.registry.serve(&room, conn).await {
        Ok(()) => info!(channel = %room, conn_id, "Subscriber disconnected"),
        Err(err) => warn!(channel = %room, conn_id, error = %err, "Subscriber connection closed abnormally"),
    }
}

/// `POST /publish/{room}`: тело запроса уходит всем подписчикам канала.
pub async fn publish(
    State(state): State<AppState>,
    Path(room): Path<String>,
    body: Bytes,
) -> Response {
    if !is_valid_channel_name(&room) {
        return StatusCode::NOT_FOUND.into_response();
    }

    state.metrics.record_publish();
    if state.registry.publish(&room, body).await {
        StatusCode::OK.into_response()
    } else {
        debug!(channel = %room, "No listener for channel");
        state.metrics.record_no_listener();
        (StatusCode::SERVICE_UNAVAILABLE, NO_ROOM).into_response()
    }
}

/// `GET /metrics` в текстовом формате Prometheus.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics.render(state.registry.stats());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
