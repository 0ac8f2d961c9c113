//! Backend распределения сообщений между инстансами ретранслятора.
//!
//! Каждый канал, созданный при настроенном backend-е, публикует сообщения
//! в топик `epher:<канал>` и держит подписку на тот же топик, доставляя
//! всё пришедшее своим локальным подписчикам. Так сообщение, опубликованное
//! на любом инстансе, доходит до подписчиков на всех инстансах.

pub mod memory;
pub mod resp;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use epher_error::BackendError;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

pub use memory::MemoryBackend;
pub use resp::{RespBackend, RespConfig};

/// Префикс топика backend-а для канала.
pub const TOPIC_PREFIX: &str = "epher:";

/// Ёмкость очереди между продюсером подписки и мостом канала.
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 1024;

/// Имя топика backend-а для канала.
pub fn topic_for(channel: &str) -> String {
    format!("{TOPIC_PREFIX}{channel}")
}

/// Общий сервис publish/subscribe, разделяемый инстансами.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Публикует сообщение в топик. Успех означает, что backend принял
    /// сообщение, а не что его кто-то получил.
    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BackendError>;

    /// Открывает подписку на топик.
    ///
    /// Метод синхронный: продюсер запускается фоновой задачей текущего
    /// tokio-рантайма, поэтому вызов допустим под синхронной блокировкой.
    fn subscribe(
        &self,
        topic: &str,
    ) -> Result<Subscription, BackendError>;

    /// Короткое описание для логов и баннера.
    fn describe(&self) -> String;
}

/// Подписка на топик: поток сообщений плюс закрываемый хэндл.
#[derive(Debug)]
pub struct Subscription {
    stream: SubscriptionStream,
    handle: SubscriptionHandle,
}

/// Поток сообщений подписки.
///
/// Заканчивается после закрытия хэндла или после завершения продюсера.
#[derive(Debug)]
pub struct SubscriptionStream {
    rx: mpsc::Receiver<Bytes>,
    token: CancellationToken,
}

/// Хэндл подписки. Дешево клонируется.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    token: CancellationToken,
    ready: Arc<AtomicBool>,
}

/// Сторона продюсера: её держит задача backend-а, читающая топик.
#[derive(Debug)]
pub struct SubscriptionFeed {
    tx: mpsc::Sender<Bytes>,
    handle: SubscriptionHandle,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Subscription {
    /// Создаёт пару "подписка + продюсер" с очередью заданной ёмкости.
    pub fn channel(capacity: usize) -> (Subscription, SubscriptionFeed) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = SubscriptionHandle {
            token: CancellationToken::new(),
            ready: Arc::new(AtomicBool::new(false)),
        };
        let subscription = Subscription {
            stream: SubscriptionStream {
                rx,
                token: handle.token.clone(),
            },
            handle: handle.clone(),
        };
        (subscription, SubscriptionFeed { tx, handle })
    }

    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    pub fn into_parts(self) -> (SubscriptionStream, SubscriptionHandle) {
        (self.stream, self.handle)
    }
}

impl SubscriptionStream {
    /// Следующее сообщение; `None` после закрытия подписки.
    pub async fn next(&mut self) -> Option<Bytes> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            msg = self.rx.recv() => msg,
        }
    }
}

impl SubscriptionHandle {
    /// Закрывает подписку. Повторный вызов ничего не делает.
    pub fn close(&self) {
        self.ready.store(false, Ordering::Release);
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `true`, пока backend подтверждает активную подписку на топик.
    pub fn is_ready(&self) -> bool {
        !self.is_closed() && self.ready.load(Ordering::Acquire)
    }
}

impl SubscriptionFeed {
    /// Передаёт сообщение в поток подписки.
    ///
    /// Возвращает `false`, если подписка закрыта и продюсеру пора выходить.
    pub async fn push(
        &self,
        payload: Bytes,
    ) -> bool {
        tokio::select! {
            biased;
            _ = self.handle.token.cancelled() => false,
            sent = self.tx.send(payload) => sent.is_ok(),
        }
    }

    /// Отмечает, активна ли подписка на стороне backend-а.
    pub fn set_ready(
        &self,
        ready: bool,
    ) {
        self.handle.ready.store(ready, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed() || self.tx.is_closed()
    }

    /// Закрывает подписку со стороны продюсера, когда backend сдался.
    ///
    /// Поток подписки заканчивается, хэндл считается закрытым.
    pub fn close(&self) {
        self.handle.close();
    }

    /// Future, завершающийся при закрытии подписки.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.handle.token.cancelled()
    }
}

// Без продюсера подписка мертва: хэндл тоже закрывается.
impl Drop for SubscriptionFeed {
    fn drop(&mut self) {
        self.handle.close();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
