//! Backend поверх Redis-совместимого сервера (протокол RESP2).
//!
//! Публикация идёт через одно общее командное соединение, которое
//! переподключается лениво при следующей публикации после сбоя. Каждая
//! подписка держит своё соединение в режиме `SUBSCRIBE` и сама
//! переподключается с паузой `reconnect_delay`, пока ошибка повторяемая.
//! Отказ сервера закрывает подписку насовсем.

pub mod client;
pub mod decoder;
pub mod frame;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use epher_error::{BackendError, ErrorExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use client::RespConnection;
pub use decoder::RespDecoder;
pub use frame::RespFrame;

use super::{Backend, Subscription, SubscriptionFeed, DEFAULT_SUBSCRIPTION_CAPACITY};

/// Параметры подключения к RESP-серверу.
#[derive(Debug, Clone)]
pub struct RespConfig {
    /// `host:port`
    pub address: String,
    pub password: Option<String>,
    pub database: i64,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub channel_capacity: usize,
}

impl RespConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: None,
            database: 0,
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            channel_capacity: DEFAULT_SUBSCRIPTION_CAPACITY,
        }
    }
}

/// Backend на Redis pub/sub.
pub struct RespBackend {
    config: RespConfig,
    publisher: Mutex<Option<RespConnection>>,
}

impl RespBackend {
    /// Подключается и проверяет сервер командой `PING`.
    ///
    /// Ошибка здесь означает, что сервер недоступен при старте.
    pub async fn connect(config: RespConfig) -> Result<Self, BackendError> {
        let mut conn = RespConnection::connect(&config).await?;
        conn.ping().await?;
        info!(address = %config.address, "Redis backend is reachable");

        Ok(Self {
            config,
            publisher: Mutex::new(Some(conn)),
        })
    }

    pub fn config(&self) -> &RespConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for RespBackend {
    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BackendError> {
        let mut guard = self.publisher.lock().await;

        // На время обмена соединение вынуто: если future отменят посреди
        // запроса, следующая публикация откроет новое.
        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => RespConnection::connect(&self.config).await?,
        };

        let command = RespFrame::command([
            Bytes::from_static(b"PUBLISH"),
            Bytes::copy_from_slice(topic.as_bytes()),
            payload,
        ]);
        match conn.request(&command).await {
            Ok(RespFrame::Integer(receivers)) => {
                debug!(topic, receivers, "Published to Redis");
                *guard = Some(conn);
                Ok(())
            }
            Ok(other) => Err(BackendError::Protocol {
                reason: format!("unexpected PUBLISH reply: {other:?}"),
            }),
            Err(err @ BackendError::Rejected { .. }) => {
                *guard = Some(conn);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn subscribe(
        &self,
        topic: &str,
    ) -> Result<Subscription, BackendError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| BackendError::Unavailable {
                reason: e.to_string(),
            })?;

        let (subscription, feed) = Subscription::channel(self.config.channel_capacity);
        runtime.spawn(run_subscriber(self.config.clone(), topic.to_string(), feed));
        Ok(subscription)
    }

    fn describe(&self) -> String {
        format!("redis://{}", self.config.address)
    }
}

/// Причина завершения одной сессии подписки.
enum SessionEnd {
    /// Подписка закрыта, выходим совсем.
    Closed,
    /// Соединение потеряно, переподключаемся.
    Lost(BackendError),
}

async fn run_subscriber(
    config: RespConfig,
    topic: String,
    feed: SubscriptionFeed,
) {
    loop {
        if feed.is_closed() {
            break;
        }

        let end = tokio::select! {
            biased;
            _ = feed.cancelled() => SessionEnd::Closed,
            end = subscribe_session(&config, &topic, &feed) => end,
        };

        feed.set_ready(false);
        match end {
            SessionEnd::Closed => break,
            SessionEnd::Lost(err) if !err.status_code().is_retryable() => {
                error!(
                    topic = %topic,
                    address = %config.address,
                    error = %err,
                    code = %err.status_code(),
                    "Redis subscription refused, giving up"
                );
                feed.close();
                break;
            }
            SessionEnd::Lost(err) => {
                warn!(
                    topic = %topic,
                    address = %config.address,
                    error = %err,
                    retry_in = ?config.reconnect_delay,
                    "Redis subscription lost"
                );
            }
        }

        tokio::select! {
            biased;
            _ = feed.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
    debug!(topic = %topic, "Redis subscription finished");
}

async fn subscribe_session(
    config: &RespConfig,
    topic: &str,
    feed: &SubscriptionFeed,
) -> SessionEnd {
    let mut conn = match RespConnection::connect(config).await {
        Ok(conn) => conn,
        Err(err) => return SessionEnd::Lost(err),
    };

    if let Err(err) = conn
        .send(&RespFrame::command(["SUBSCRIBE".to_string(), topic.to_string()]))
        .await
    {
        return SessionEnd::Lost(err);
    }

    loop {
        let frame = match conn.read_frame().await {
            Ok(frame) => frame,
            Err(err) => return SessionEnd::Lost(err),
        };

        match classify_push(&frame, topic) {
            Push::Subscribed => {
                debug!(topic, "Redis subscription confirmed");
                feed.set_ready(true);
            }
            Push::Message(payload) => {
                if !feed.push(payload).await {
                    return SessionEnd::Closed;
                }
            }
            Push::Other => {}
            Push::Error(reason) => return SessionEnd::Lost(BackendError::Rejected { reason }),
        }
    }
}

/// Сообщение сервера в режиме подписки.
#[derive(Debug, PartialEq, Eq)]
enum Push {
    Subscribed,
    Message(Bytes),
    Error(String),
    Other,
}

fn classify_push(
    frame: &RespFrame,
    topic: &str,
) -> Push {
    if let RespFrame::Error(reason) = frame {
        return Push::Error(reason.clone());
    }
    let Some(items) = frame.as_array() else {
        return Push::Other;
    };
    let same_topic = |f: &RespFrame| f.as_bytes().as_deref() == Some(topic.as_bytes());

    match items {
        [kind, channel, _count] if kind.eq_ignore_case("subscribe") && same_topic(channel) => {
            Push::Subscribed
        }
        [kind, channel, payload] if kind.eq_ignore_case("message") && same_topic(channel) => {
            match payload {
                RespFrame::Bulk(Some(data)) => Push::Message(data.clone()),
                _ => Push::Other,
            }
        }
        _ => Push::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_push() {
        let topic = "epher:room1";

        let confirm = RespFrame::Array(Some(vec![
            RespFrame::Bulk(Some(Bytes::from_static(b"subscribe"))),
            RespFrame::Bulk(Some(Bytes::from_static(b"epher:room1"))),
            RespFrame::Integer(1),
        ]));
        assert_eq!(classify_push(&confirm, topic), Push::Subscribed);

        let message = RespFrame::command(["message", "epher:room1", "hi"]);
        assert_eq!(
            classify_push(&message, topic),
            Push::Message(Bytes::from_static(b"hi"))
        );

        let foreign = RespFrame::command(["message", "epher:room2", "hi"]);
        assert_eq!(classify_push(&foreign, topic), Push::Other);

        assert_eq!(
            classify_push(&RespFrame::Error("NOAUTH".into()), topic),
            Push::Error("NOAUTH".into())
        );
        assert_eq!(classify_push(&RespFrame::Integer(1), topic), Push::Other);
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = RespConfig::new(addr.to_string());
        config.connect_timeout = Duration::from_millis(500);
        let err = RespBackend::connect(config).await.err().unwrap();
        assert!(matches!(err, BackendError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_describe() {
        let config = RespConfig::new("127.0.0.1:6379");
        let backend = RespBackend {
            config,
            publisher: Mutex::new(None),
        };
        assert_eq!(backend.describe(), "redis://127.0.0.1:6379");
    }
}
