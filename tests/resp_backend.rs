mod common;

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use common::{eventually, recording, texts};
use epher::{
    backend::{
        resp::{RespDecoder, RespFrame},
        Backend, RespBackend, RespConfig,
    },
    error::BackendError,
    relay::Registry,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::broadcast,
};

/// Минимальный pub/sub-сервер на RESP2: PING, AUTH, SELECT, PUBLISH,
/// SUBSCRIBE.
struct MockRedis {
    addr: SocketAddr,
    publishes: Arc<AtomicUsize>,
    subscribers: Arc<AtomicUsize>,
    subscribe_attempts: Arc<AtomicUsize>,
}

impl MockRedis {
    async fn start(password: Option<&'static str>) -> Self {
        Self::spawn(password, false).await
    }

    /// Сервер, отвечающий на `SUBSCRIBE` ошибкой прав доступа.
    async fn start_denying_subscribe() -> Self {
        Self::spawn(None, true).await
    }

    async fn spawn(
        password: Option<&'static str>,
        deny_subscribe: bool,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (bus, _) = broadcast::channel::<(Bytes, Bytes)>(256);
        let publishes = Arc::new(AtomicUsize::new(0));
        let subscribers = Arc::new(AtomicUsize::new(0));
        let subscribe_attempts = Arc::new(AtomicUsize::new(0));

        tokio::spawn({
            let counters = Counters {
                publishes: publishes.clone(),
                subscribers: subscribers.clone(),
                subscribe_attempts: subscribe_attempts.clone(),
            };
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(handle_client(
                        stream,
                        bus.clone(),
                        password,
                        deny_subscribe,
                        counters.clone(),
                    ));
                }
            }
        });

        Self {
            addr,
            publishes,
            subscribers,
            subscribe_attempts,
        }
    }

    fn config(&self) -> RespConfig {
        let mut config = RespConfig::new(self.addr.to_string());
        config.connect_timeout = Duration::from_secs(1);
        config.reconnect_delay = Duration::from_millis(50);
        config
    }
}

#[derive(Clone)]
struct Counters {
    publishes: Arc<AtomicUsize>,
    subscribers: Arc<AtomicUsize>,
    subscribe_attempts: Arc<AtomicUsize>,
}

async fn write_frame(
    stream: &mut TcpStream,
    frame: RespFrame,
) -> std::io::Result<()> {
    let bytes = frame.to_bytes().unwrap();
    stream.write_all(&bytes).await
}

async fn handle_client(
    mut stream: TcpStream,
    bus: broadcast::Sender<(Bytes, Bytes)>,
    password: Option<&'static str>,
    deny_subscribe: bool,
    counters: Counters,
) {
    let mut decoder = RespDecoder::new();
    let mut buf = BytesMut::new();
    let mut authed = password.is_none();

    loop {
        let frame = loop {
            if let Some(frame) = decoder.decode(&mut buf).unwrap() {
                break frame;
            }
            match stream.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        };

        let args: Vec<Bytes> = frame
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f.as_bytes().unwrap())
            .collect();
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();

        if !authed && name != "AUTH" {
            let denied = RespFrame::Error("NOAUTH Authentication required.".into());
            if write_frame(&mut stream, denied).await.is_err() {
                return;
            }
            continue;
        }

        let reply = match name.as_str() {
            "PING" => RespFrame::Simple("PONG".into()),
            "AUTH" => {
                if Some(args[1].as_ref()) == password.map(str::as_bytes) {
                    authed = true;
                    RespFrame::Simple("OK".into())
                } else {
                    RespFrame::Error("WRONGPASS invalid password".into())
                }
            }
            "SELECT" => RespFrame::Simple("OK".into()),
            "PUBLISH" => {
                counters.publishes.fetch_add(1, Ordering::SeqCst);
                let receivers = bus.send((args[1].clone(), args[2].clone())).unwrap_or(0);
                RespFrame::Integer(receivers as i64)
            }
            "SUBSCRIBE" if deny_subscribe => {
                counters.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
                RespFrame::Error(
                    "NOPERM this user has no permissions to access one of the channels".into(),
                )
            }
            "SUBSCRIBE" => {
                counters.subscribe_attempts.fetch_add(1, Ordering::SeqCst);
                let topic = args[1].clone();
                let mut rx = bus.subscribe();
                counters.subscribers.fetch_add(1, Ordering::SeqCst);
                let confirm = RespFrame::Array(Some(vec![
                    RespFrame::Bulk(Some(Bytes::from_static(b"subscribe"))),
                    RespFrame::Bulk(Some(topic.clone())),
                    RespFrame::Integer(1),
                ]));
                if write_frame(&mut stream, confirm).await.is_ok() {
                    serve_subscriber(&mut stream, &mut rx, topic).await;
                }
                counters.subscribers.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            _ => RespFrame::Error(format!("ERR unknown command '{name}'")),
        };

        if write_frame(&mut stream, reply).await.is_err() {
            return;
        }
    }
}

async fn serve_subscriber(
    stream: &mut TcpStream,
    rx: &mut broadcast::Receiver<(Bytes, Bytes)>,
    topic: Bytes,
) {
    let mut scratch = [0u8; 64];
    loop {
        tokio::select! {
            read = stream.read(&mut scratch) => {
                if matches!(read, Ok(0) | Err(_)) {
                    return;
                }
            }
            msg = rx.recv() => {
                let Ok((msg_topic, payload)) = msg else { return };
                if msg_topic != topic {
                    continue;
                }
                let push = RespFrame::Array(Some(vec![
                    RespFrame::Bulk(Some(Bytes::from_static(b"message"))),
                    RespFrame::Bulk(Some(msg_topic)),
                    RespFrame::Bulk(Some(payload)),
                ]));
                if write_frame(stream, push).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[tokio::test]
async fn test_connect_and_publish() {
    let redis = MockRedis::start(None).await;
    let backend = RespBackend::connect(redis.config()).await.unwrap();

    backend
        .publish("epher:room1", Bytes::from_static(b"payload"))
        .await
        .unwrap();
    assert_eq!(redis.publishes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.describe(), format!("redis://{}", redis.addr));
}

#[tokio::test]
async fn test_auth_required() {
    let redis = MockRedis::start(Some("secret")).await;

    let mut wrong = redis.config();
    wrong.password = Some("nope".to_string());
    let err = RespBackend::connect(wrong).await.err().unwrap();
    assert!(matches!(err, BackendError::Rejected { .. }));

    let mut right = redis.config();
    right.password = Some("secret".to_string());
    right.database = 2;
    assert!(RespBackend::connect(right).await.is_ok());
}

#[tokio::test]
async fn test_subscription_receives_messages() {
    let redis = MockRedis::start(None).await;
    let backend = RespBackend::connect(redis.config()).await.unwrap();

    let subscription = backend.subscribe("epher:news").unwrap();
    let (mut stream, handle) = subscription.into_parts();
    assert!(eventually(|| handle.is_ready()).await);

    backend
        .publish("epher:other", Bytes::from_static(b"skip"))
        .await
        .unwrap();
    backend
        .publish("epher:news", Bytes::from_static(b"fresh"))
        .await
        .unwrap();

    let got = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap();
    assert_eq!(got, Some(Bytes::from_static(b"fresh")));

    handle.close();
    assert_eq!(stream.next().await, None);
    assert!(eventually(|| redis.subscribers.load(Ordering::SeqCst) == 0).await);
}

/// Два реестра на одном Redis: полная цепочка через мосты каналов.
#[tokio::test]
async fn test_registries_over_resp() {
    let redis = MockRedis::start(None).await;
    let first: Arc<dyn Backend> = Arc::new(RespBackend::connect(redis.config()).await.unwrap());
    let second: Arc<dyn Backend> = Arc::new(RespBackend::connect(redis.config()).await.unwrap());
    let first = Registry::new(Some(first));
    let second = Registry::new(Some(second));

    let (a, inbox_a) = recording(1);
    let (b, inbox_b) = recording(2);
    first.subscribe("room1", a);
    second.subscribe("room1", b);

    assert!(
        eventually(|| first.channel("room1").unwrap().is_bridged()
            && second.channel("room1").unwrap().is_bridged())
        .await
    );

    assert!(second.publish("room1", Bytes::from_static(b"hi")).await);
    assert!(eventually(|| inbox_a.lock().len() == 1 && inbox_b.lock().len() == 1).await);
    assert_eq!(texts(&inbox_a), vec!["hi"]);
    assert_eq!(texts(&inbox_b), vec!["hi"]);

    first.unsubscribe("room1", 1);
    second.unsubscribe("room1", 2);
    assert!(eventually(|| redis.subscribers.load(Ordering::SeqCst) == 0).await);
}

/// Отказ сервера в подписке не лечится переподключением: подписка
/// закрывается после первой попытки.
#[tokio::test]
async fn test_refused_subscription_gives_up() {
    let redis = MockRedis::start_denying_subscribe().await;
    let backend = RespBackend::connect(redis.config()).await.unwrap();

    let subscription = backend.subscribe("epher:news").unwrap();
    let (mut stream, handle) = subscription.into_parts();

    assert!(eventually(|| handle.is_closed()).await);
    assert!(!handle.is_ready());
    assert_eq!(stream.next().await, None);

    // Несколько интервалов переподключения без новых попыток.
    tokio::time::sleep(redis.config().reconnect_delay * 5).await;
    assert_eq!(redis.subscribe_attempts.load(Ordering::SeqCst), 1);
}

/// Канал с отклонённой подпиской переходит на локальную доставку.
#[tokio::test]
async fn test_refused_bridge_falls_back_to_local() {
    let redis = MockRedis::start_denying_subscribe().await;
    let backend: Arc<dyn Backend> = Arc::new(RespBackend::connect(redis.config()).await.unwrap());
    let registry = Registry::new(Some(backend));

    let (conn, inbox) = recording(1);
    registry.subscribe("room1", conn);
    assert!(eventually(|| !registry.channel("room1").unwrap().has_bridge()).await);

    assert!(registry.publish("room1", Bytes::from_static(b"local")).await);
    assert_eq!(texts(&inbox), vec!["local"]);
    assert_eq!(redis.publishes.load(Ordering::SeqCst), 0);
}
