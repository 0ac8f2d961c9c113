//! Адаптер WebSocket-соединения axum к потокам подписчика.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use epher_error::TransportError;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::relay::{FrameSink, FrameSource, Inbound};

/// Пишущая половина WebSocket.
pub struct WsSink(SplitSink<WebSocket, Message>);

/// Читающая половина WebSocket.
pub struct WsSource(SplitStream<WebSocket>);

/// Делит сокет на половины для [`Connection`](crate::relay::Connection).
pub fn split(socket: WebSocket) -> (WsSink, WsSource) {
    let (sink, stream) = socket.split();
    (WsSink(sink), WsSource(stream))
}

/// Сообщение для подписчика: текстовое, если payload является UTF-8,
/// иначе бинарное.
pub fn outbound_message(payload: Bytes) -> Message {
    match std::str::from_utf8(&payload) {
        Ok(text) => Message::Text(text.into()),
        Err(_) => Message::Binary(payload),
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(
        &mut self,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        self.0
            .send(outbound_message(payload))
            .await
            .map_err(TransportError::io)
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Inbound, TransportError>> {
        let event = match self.0.next().await? {
            Ok(Message::Close(frame)) => Ok(Inbound::Close(frame.map(|f| f.code))),
            Ok(_) => Ok(Inbound::Data),
            Err(err) => Err(TransportError::io(err)),
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_message_kind() {
        match outbound_message(Bytes::from_static(b"hello")) {
            Message::Text(text) => assert_eq!(text.as_str(), "hello"),
            other => panic!("expected text message, got {other:?}"),
        }

        let binary = Bytes::from_static(&[0xff, 0x00, 0xfe]);
        match outbound_message(binary.clone()) {
            Message::Binary(data) => assert_eq!(data, binary),
            other => panic!("expected binary message, got {other:?}"),
        }
    }
}
