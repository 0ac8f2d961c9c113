use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use epher_error::TransportError;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{
    channel::Channel,
    connection::{Connection, ConnectionId},
};
use crate::backend::Backend;

/// Проверяет имя канала: непустое, только `[a-zA-Z0-9]`.
pub fn is_valid_channel_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Реестр каналов одного процесса.
///
/// Канал существует ровно тогда, когда у него есть хотя бы один
/// подписчик: первый подписчик создаёт канал, последний отписавшийся
/// удаляет его. Создание, удаление и изменение состава подписчиков идут
/// под записывающей блокировкой реестра, публикация берёт только
/// читающую и отпускает её до начала отправки.
pub struct Registry {
    channels: RwLock<HashMap<Arc<str>, Arc<Channel>>>,
    backend: Option<Arc<dyn Backend>>,
}

/// Снимок состояния реестра для метрик.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub channels: usize,
    pub subscribers: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Registry {
    /// Создаёт пустой реестр. `None` означает работу без backend-а.
    pub fn new(backend: Option<Arc<dyn Backend>>) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Реестр без backend-а.
    pub fn local() -> Self {
        Self::new(None)
    }

    pub fn backend(&self) -> Option<&Arc<dyn Backend>> {
        self.backend.as_ref()
    }

    /// Добавляет подписчика в канал, создавая канал при необходимости.
    pub fn subscribe(
        &self,
        name: &str,
        conn: Arc<Connection>,
    ) {
        let mut channels = self.channels.write();
        let channel = channels
            .entry(Arc::from(name))
            .or_insert_with(|| {
                info!(channel = name, "Channel created");
                Channel::new(name, self.backend.clone())
            })
            .clone();
        channel.add(conn);
        debug!(channel = name, subscribers = channel.count(), "Subscriber added");
    }

    /// Убирает подписчика из канала и удаляет опустевший канал.
    ///
    /// Неизвестный канал игнорируется. Перед удалением канала его мост
    /// останавливается.
    pub fn unsubscribe(
        &self,
        name: &str,
        id: ConnectionId,
    ) {
        let mut channels = self.channels.write();
        let Some(channel) = channels.get(name).cloned() else {
            return;
        };

        channel.remove(id);
        if channel.count() == 0 {
            channel.stop_bridge();
            channels.remove(name);
            info!(channel = name, "Channel removed");
        } else {
            debug!(channel = name, subscribers = channel.count(), "Subscriber removed");
        }
    }

    /// Публикует сообщение в канал.
    ///
    /// Возвращает `false`, если канала нет. `true` означает только, что
    /// канал существовал: частичные сбои доставки наружу не выходят.
    pub async fn publish(
        &self,
        name: &str,
        payload: Bytes,
    ) -> bool {
        let Some(channel) = self.channel(name) else {
            return false;
        };

        if let Err(err) = channel.broadcast(payload).await {
            debug!(channel = name, error = %err, "Broadcast incomplete");
        }
        true
    }

    /// Держит подписчика в канале, пока клиент не закроет поток.
    ///
    /// Отписка выполняется при любом исходе, в том числе при отмене
    /// future.
    pub async fn serve(
        &self,
        name: &str,
        conn: Arc<Connection>,
    ) -> Result<(), TransportError> {
        let id = conn.id();
        self.subscribe(name, conn.clone());
        let _guard = Membership {
            registry: self,
            name,
            id,
        };

        conn.read_loop().await
    }

    pub fn channel(
        &self,
        name: &str,
    ) -> Option<Arc<Channel>> {
        self.channels.read().get(name).cloned()
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.channels.read().contains_key(name)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.channels.read().values().map(|c| c.count()).sum()
    }

    pub fn stats(&self) -> RegistryStats {
        let channels = self.channels.read();
        RegistryStats {
            channels: channels.len(),
            subscribers: channels.values().map(|c| c.count()).sum(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::local()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Registry")
            .field("channels", &stats.channels)
            .field("subscribers", &stats.subscribers)
            .field("distributed", &self.backend.is_some())
            .finish()
    }
}

/// Отписывает подписчика при выходе из области видимости.
struct Membership<'a> {
    registry: &'a Registry,
    name: &'a str,
    id: ConnectionId,
}

impl Drop for Membership<'_> {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.name, self.id);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
