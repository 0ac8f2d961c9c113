#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use epher::{
    error::TransportError,
    relay::{Connection, ConnectionId, FrameSink, FrameSource, Inbound},
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Общий журнал сообщений, полученных подписчиком.
pub type Inbox = Arc<Mutex<Vec<Bytes>>>;

/// Sink, складывающий всё в журнал.
pub struct Recorder(pub Inbox);

#[async_trait]
impl FrameSink for Recorder {
    async fn send_frame(
        &mut self,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        self.0.lock().push(payload);
        Ok(())
    }
}

/// Sink, ломающийся после `ok_sends` успешных отправок.
pub struct FailAfter {
    pub inbox: Inbox,
    pub ok_sends: usize,
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for FailAfter {
    async fn send_frame(
        &mut self,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_sends {
            return Err(TransportError::Io {
                reason: "broken pipe".to_string(),
            });
        }
        self.inbox.lock().push(payload);
        Ok(())
    }
}

/// Источник под управлением теста: события приходят через `mpsc`,
/// закрытие отправителя означает обрыв потока.
pub struct Remote(pub mpsc::UnboundedReceiver<Result<Inbound, TransportError>>);

#[async_trait]
impl FrameSource for Remote {
    async fn next_frame(&mut self) -> Option<Result<Inbound, TransportError>> {
        self.0.recv().await
    }
}

/// Источник, который никогда ничего не присылает.
pub struct Silent;

#[async_trait]
impl FrameSource for Silent {
    async fn next_frame(&mut self) -> Option<Result<Inbound, TransportError>> {
        std::future::pending().await
    }
}

pub type RemoteTx = mpsc::UnboundedSender<Result<Inbound, TransportError>>;

pub fn inbox() -> Inbox {
    Arc::new(Mutex::new(Vec::new()))
}

/// Подписчик, который пишет в журнал и сам никогда не закрывается.
pub fn recording(id: ConnectionId) -> (Arc<Connection>, Inbox) {
    let inbox = inbox();
    let conn = Connection::with_id(id, Recorder(inbox.clone()), Silent);
    (Arc::new(conn), inbox)
}

/// Подписчик с управляемым источником.
pub fn remote(id: ConnectionId) -> (Arc<Connection>, Inbox, RemoteTx) {
    let inbox = inbox();
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = Connection::with_id(id, Recorder(inbox.clone()), Remote(rx));
    (Arc::new(conn), inbox, tx)
}

/// Подписчик, чья отправка ломается после `ok_sends` сообщений.
pub fn failing_after(
    id: ConnectionId,
    ok_sends: usize,
) -> (Arc<Connection>, Inbox) {
    let inbox = inbox();
    let sink = FailAfter {
        inbox: inbox.clone(),
        ok_sends,
        attempts: Arc::new(AtomicUsize::new(0)),
    };
    (Arc::new(Connection::with_id(id, sink, Silent)), inbox)
}

pub fn texts(inbox: &Inbox) -> Vec<String> {
    inbox
        .lock()
        .iter()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .collect()
}

/// Ждёт выполнения условия не дольше двух секунд.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
