use async_trait::async_trait;
use bytes::Bytes;
use epher_error::TransportError;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Идентификатор подписчика.
pub type ConnectionId = u64;

/// Штатное закрытие соединения.
pub const CLOSE_NORMAL: u16 = 1000;
/// Пир уходит (закрыта вкладка, остановлен процесс).
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close-фрейм пришёл без кода статуса.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Соединение оборвалось без close-фрейма.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Входящее событие из потока подписчика.
///
/// Содержимое данных подписчика ретранслятору не нужно, поэтому
/// `Data` не несёт payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Любое сообщение с данными (текст, бинарь, ping/pong).
    Data,
    /// Close-фрейм. `None`, если пир не указал код.
    Close(Option<u16>),
}

/// Пишущая половина двунаправленного потока подписчика.
#[async_trait]
pub trait FrameSink: Send {
    /// Отправляет одно сообщение с данными.
    async fn send_frame(
        &mut self,
        payload: Bytes,
    ) -> Result<(), TransportError>;
}

/// Читающая половина двунаправленного потока подписчика.
#[async_trait]
pub trait FrameSource: Send {
    /// Следующее входящее событие. `None` означает конец потока.
    async fn next_frame(&mut self) -> Option<Result<Inbound, TransportError>>;
}

/// Один подписанный клиент.
///
/// Владеет обеими половинами потока. Запись сериализуется внутренним
/// мьютексом, поэтому `send` можно вызывать из нескольких задач сразу:
/// каждое сообщение уходит целиком, без перемешивания байтов.
pub struct Connection {
    id: ConnectionId,
    sink: Mutex<Box<dyn FrameSink>>,
    source: Mutex<Box<dyn FrameSource>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Connection {
    /// Создаёт соединение со случайным неотрицательным 63-битным id.
    pub fn new(
        sink: impl FrameSink + 'static,
        source: impl FrameSource + 'static,
    ) -> Self {
        Self::with_id(random_id(), sink, source)
    }

    /// Создаёт соединение с заданным id.
    pub fn with_id(
        id: ConnectionId,
        sink: impl FrameSink + 'static,
        source: impl FrameSource + 'static,
    ) -> Self {
        Self {
            id,
            sink: Mutex::new(Box::new(sink)),
            source: Mutex::new(Box::new(source)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Отправляет одно сообщение подписчику.
    ///
    /// Одновременные вызовы выстраиваются в очередь на мьютексе записи.
    pub async fn send(
        &self,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send_frame(payload).await.inspect_err(|err| {
            debug!(conn_id = self.id, error = %err, "Send to subscriber failed");
        })
    }

    /// Читает и отбрасывает входящие сообщения до закрытия потока.
    ///
    /// Возвращает `Ok(())` на штатное закрытие (1000 или 1001) и ошибку
    /// во всех остальных случаях: другой код, close-фрейм без кода, обрыв
    /// потока без close-фрейма, ошибка чтения.
    pub async fn read_loop(&self) -> Result<(), TransportError> {
        let mut source = self.source.lock().await;

        loop {
            match source.next_frame().await {
                Some(Ok(Inbound::Data)) => {
                    trace!(conn_id = self.id, "Discarding inbound message");
                }
                Some(Ok(Inbound::Close(code))) => return close_outcome(code),
                Some(Err(err)) => return Err(err),
                None => return Err(TransportError::Eof),
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Debug for Connection {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Внутренние функции и методы
////////////////////////////////////////////////////////////////////////////////

fn random_id() -> ConnectionId {
    rand::random::<u64>() >> 1
}

/// Классифицирует close-фрейм.
pub fn close_outcome(code: Option<u16>) -> Result<(), TransportError> {
    match code {
        Some(CLOSE_NORMAL) | Some(CLOSE_GOING_AWAY) => Ok(()),
        Some(code) => Err(TransportError::Closed {
            code,
            reason: "unexpected close code".to_string(),
        }),
        None => Err(TransportError::Closed {
            code: CLOSE_NO_STATUS,
            reason: "close frame without status".to_string(),
        }),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
