use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use epher_error::BackendError;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{Backend, Subscription, SubscriptionFeed, DEFAULT_SUBSCRIPTION_CAPACITY};

type TopicKey = Arc<str>;

/// Backend в памяти процесса.
///
/// Раздаёт сообщения всем реестрам, которые держат `Arc` на один и тот же
/// экземпляр. Используется для встраивания нескольких ретрансляторов в
/// один процесс и в тестах распределённого режима.
///
/// Поддерживает:
/// - точные подписки по имени топика;
/// - автоматическое удаление топиков без подписчиков;
/// - статистику публикаций и выключатель для имитации отказа.
pub struct MemoryBackend {
    /// Топик → `Sender`
    topics: Arc<DashMap<TopicKey, broadcast::Sender<Bytes>>>,
    /// Ёмкость буфера каждого `broadcast::channel`
    capacity: usize,
    /// Общее количество принятых публикаций
    publish_count: AtomicUsize,
    /// Пока `true`, `publish` отвечает `Unavailable`
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            publish_count: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Количество живых подписок на топик.
    pub fn subscriber_count(
        &self,
        topic: &str,
    ) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn publish_count(&self) -> usize {
        self.publish_count.load(Ordering::Relaxed)
    }

    /// Включает или выключает имитацию недоступности.
    pub fn set_failing(
        &self,
        failing: bool,
    ) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIPTION_CAPACITY)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
    ) -> Result<(), BackendError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable {
                reason: "memory backend is switched off".to_string(),
            });
        }

        self.publish_count.fetch_add(1, Ordering::Relaxed);

        if let Some(tx) = self.topics.get(topic) {
            // Ошибка send означает лишь отсутствие получателей.
            let _ = tx.send(payload);
        }
        self.topics
            .remove_if(topic, |_, tx| tx.receiver_count() == 0);

        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
    ) -> Result<Subscription, BackendError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| BackendError::Unavailable {
                reason: e.to_string(),
            })?;

        let key: TopicKey = Arc::from(topic);
        let rx = self
            .topics
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let (subscription, feed) = Subscription::channel(self.capacity);
        feed.set_ready(true);
        runtime.spawn(forward_topic(key, rx, feed));

        Ok(subscription)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

async fn forward_topic(
    topic: TopicKey,
    mut rx: broadcast::Receiver<Bytes>,
    feed: SubscriptionFeed,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = feed.cancelled() => break,
            received = rx.recv() => received,
        };

        match received {
            Ok(payload) => {
                if !feed.push(payload).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(topic = %topic, skipped, "Memory subscription lagged, messages dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(topic = %topic, "Memory subscription finished");
}
