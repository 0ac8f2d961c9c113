use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use bytes::Bytes;
use epher_error::TransportError;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::connection::{Connection, ConnectionId};
use crate::backend::{topic_for, Backend, SubscriptionHandle, SubscriptionStream};

/// Именованная группа подписчиков.
///
/// Без backend-а `broadcast` сразу доставляет сообщение локальным
/// подписчикам. С backend-ом канал публикует сообщение в свой топик и
/// получает его обратно через мост, который доставляет всё пришедшее из
/// топика локальным подписчикам.
pub struct Channel {
    name: Arc<str>,
    subscribers: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    bridge: Option<Bridge>,
}

/// Связь канала с топиком backend-а.
struct Bridge {
    backend: Arc<dyn Backend>,
    topic: String,
    /// `None`, пока мост не запущен или уже остановлен.
    handle: Mutex<Option<SubscriptionHandle>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Channel {
    /// Создаёт канал. При наличии backend-а сразу запускает мост.
    ///
    /// Если подписка на топик не открылась, канал работает только с
    /// локальными подписчиками.
    pub fn new(
        name: &str,
        backend: Option<Arc<dyn Backend>>,
    ) -> Arc<Self> {
        let channel = Arc::new(Self {
            name: Arc::from(name),
            subscribers: RwLock::new(HashMap::new()),
            bridge: backend.map(|backend| Bridge {
                backend,
                topic: topic_for(name),
                handle: Mutex::new(None),
            }),
        });
        channel.start_bridge();
        channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Добавляет подписчика. Повторное добавление того же id заменяет запись.
    pub fn add(
        &self,
        conn: Arc<Connection>,
    ) {
        self.subscribers.write().insert(conn.id(), conn);
    }

    /// Удаляет подписчика; отсутствующий id игнорируется.
    pub fn remove(
        &self,
        id: ConnectionId,
    ) {
        self.subscribers.write().remove(&id);
    }

    pub fn count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn contains(
        &self,
        id: ConnectionId,
    ) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// `true`, если backend подтвердил подписку моста на топик.
    pub fn is_bridged(&self) -> bool {
        self.bridge
            .as_ref()
            .and_then(|bridge| bridge.handle.lock().as_ref().map(|h| h.is_ready()))
            .unwrap_or(false)
    }

    /// `true`, пока мост запущен и его подписка не закрыта.
    ///
    /// Подтверждения от backend-а при этом может ещё не быть: подписка
    /// открывается или переподключается.
    pub fn has_bridge(&self) -> bool {
        self.bridge
            .as_ref()
            .and_then(|bridge| bridge.handle.lock().as_ref().map(|h| !h.is_closed()))
            .unwrap_or(false)
    }

    /// Рассылает сообщение всем подписчикам канала.
    ///
    /// Пока мост запущен, сообщение уходит в backend, и успех публикации
    /// считается успехом рассылки. Если публикация не удалась, моста нет
    /// или его подписка закрыта, сообщение доставляется локально.
    ///
    /// Пока подписка моста открывается или переподключается, опубликованное
    /// сообщение получат подписчики других инстансов, но не этого.
    pub async fn broadcast(
        &self,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        if let Some(bridge) = &self.bridge {
            if self.has_bridge() {
                match bridge.backend.publish(&bridge.topic, payload.clone()).await {
                    Ok(()) => return Ok(()),
                    Err(err) => {
                        warn!(
                            channel = %self.name,
                            topic = %bridge.topic,
                            error = %err,
                            "Backend publish failed, delivering locally"
                        );
                    }
                }
            }
        }

        self.local_deliver(payload).await
    }

    /// Отправляет сообщение каждому локальному подписчику по очереди.
    ///
    /// Список подписчиков снимается под блокировкой, отправка идёт без неё.
    /// Первая ошибка отправки прерывает рассылку: оставшиеся подписчики
    /// сообщение не получат.
    pub async fn local_deliver(
        &self,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let snapshot: Vec<Arc<Connection>> = self.subscribers.read().values().cloned().collect();
        trace!(channel = %self.name, subscribers = snapshot.len(), "Delivering locally");

        for conn in snapshot {
            if let Err(err) = conn.send(payload.clone()).await {
                debug!(
                    channel = %self.name,
                    conn_id = conn.id(),
                    error = %err,
                    "Local delivery aborted"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Запускает мост, если он настроен и ещё не запущен.
    pub fn start_bridge(self: &Arc<Self>) {
        let Some(bridge) = &self.bridge else {
            return;
        };

        let mut handle = bridge.handle.lock();
        if handle.is_some() {
            return;
        }

        match bridge.backend.subscribe(&bridge.topic) {
            Ok(subscription) => {
                let (stream, sub_handle) = subscription.into_parts();
                tokio::spawn(run_bridge(Arc::downgrade(self), stream));
                *handle = Some(sub_handle);
                debug!(channel = %self.name, topic = %bridge.topic, "Bridge started");
            }
            Err(err) => {
                warn!(
                    channel = %self.name,
                    topic = %bridge.topic,
                    error = %err,
                    "Backend subscription failed, channel stays local"
                );
            }
        }
    }

    /// Останавливает мост. Повторный вызов ничего не делает.
    pub fn stop_bridge(&self) {
        let Some(bridge) = &self.bridge else {
            return;
        };

        if let Some(handle) = bridge.handle.lock().take() {
            handle.close();
            debug!(channel = %self.name, topic = %bridge.topic, "Bridge stopped");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Debug for Channel {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("subscribers", &self.count())
            .field("bridge", &self.has_bridge())
            .field("bridged", &self.is_bridged())
            .finish()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.stop_bridge();
    }
}

/// Единственный потребитель топика канала: всё, что пришло из backend-а,
/// уходит локальным подписчикам.
async fn run_bridge(
    channel: Weak<Channel>,
    mut stream: SubscriptionStream,
) {
    while let Some(payload) = stream.next().await {
        let Some(channel) = channel.upgrade() else {
            break;
        };
        if let Err(err) = channel.local_deliver(payload).await {
            debug!(channel = %channel.name, error = %err, "Bridged delivery incomplete");
        }
    }
    trace!("Bridge loop finished");
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
