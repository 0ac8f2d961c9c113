use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        error::{Error as WsError, ProtocolError},
        Message,
    },
};
use tracing::{debug, info, warn};

use super::config::Route;
use crate::{
    error::ForwardError,
    relay::{CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL, CLOSE_NO_STATUS},
};

/// Обслуживает один маршрут до закрытия WebSocket.
///
/// Каждое входящее сообщение отправляется POST-запросом на `http_url`.
/// Ошибка HTTP логируется, и маршрут продолжает работу. Штатное закрытие
/// (1000 или 1001) завершает маршрут успешно. Обрыв потока без
/// close-фрейма считается закрытием с кодом 1006.
pub async fn run_route(
    route: &Route,
    client: &Client,
) -> Result<(), ForwardError> {
    let (stream, _) = connect_async(route.ws_address.as_str()).await?;
    let (mut write, mut read) = stream.split();
    info!(ws = %route.ws_address, http = %route.http_url, "Route connected");

    while let Some(message) = read.next().await {
        let message = match message {
            Ok(message) => message,
            Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => break,
            Err(WsError::Io(err)) if err.kind() == std::io::ErrorKind::ConnectionReset => break,
            Err(err) => return Err(err.into()),
        };
        let payload: Bytes = match message {
            Message::Text(text) => text.into(),
            Message::Binary(data) => data,
            Message::Close(frame) => {
                let code = frame.map(|f| u16::from(f.code));
                debug!(ws = %route.ws_address, ?code, "Route closed by peer");
                let _ = write.close().await;
                return close_result(code);
            }
            _ => continue,
        };

        let response = match send_http_payload(client, &route.http_url, payload).await {
            Ok(response) => response,
            Err(err) => {
                warn!(http = %route.http_url, error = %err, "HTTP send failed");
                continue;
            }
        };

        if route.forward_response {
            let text = String::from_utf8_lossy(&response).into_owned();
            if let Err(err) = write.send(Message::text(text)).await {
                warn!(ws = %route.ws_address, error = %err, "WebSocket write failed");
            }
        }
    }

    debug!(ws = %route.ws_address, "Route stream ended without close frame");
    Err(ForwardError::Closed {
        code: CLOSE_ABNORMAL,
    })
}

/// POST с телом `data`; возвращает тело ответа независимо от статуса.
pub async fn send_http_payload(
    client: &Client,
    url: &str,
    data: Bytes,
) -> Result<Bytes, ForwardError> {
    let response = client.post(url).body(data).send().await?;
    debug!(url, status = %response.status(), "HTTP payload delivered");
    Ok(response.bytes().await?)
}

fn close_result(code: Option<u16>) -> Result<(), ForwardError> {
    match code {
        Some(CLOSE_NORMAL) | Some(CLOSE_GOING_AWAY) => Ok(()),
        Some(code) => Err(ForwardError::Closed { code }),
        None => Err(ForwardError::Closed {
            code: CLOSE_NO_STATUS,
        }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Some(1000), true)]
    #[case(Some(1001), true)]
    #[case(Some(1011), false)]
    #[case(None, false)]
    fn test_close_result(
        #[case] code: Option<u16>,
        #[case] clean: bool,
    ) {
        assert_eq!(close_result(code).is_ok(), clean);
    }

    #[tokio::test]
    async fn test_unreachable_ws_is_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let route = Route {
            ws_address: format!("ws://{addr}/subscribe/room1"),
            http_url: "http://127.0.0.1:1/hook".to_string(),
            forward_response: false,
        };
        let err = run_route(&route, &Client::new()).await.unwrap_err();
        assert!(matches!(err, ForwardError::WebSocket(_)));
    }
}
