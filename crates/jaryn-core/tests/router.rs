//! Integration tests for push routing and session teardown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use jaryn_core::{
    ApiClient, ClientConfig, Error, EventRouter, LogoutReason, MemorySessionStore, PushConfig,
    PushEventKind, RefreshReason, Session, SessionGate, SessionStore, Signals, Subscription,
};
use jaryn_push::{ChunkSource, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Transport replaying one script per connection, then hanging.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<&'static str>>>,
    opens: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(scripts: Vec<Vec<&'static str>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }
}

struct ScriptedStream {
    chunks: VecDeque<Bytes>,
    live: Arc<AtomicUsize>,
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ChunkSource for ScriptedStream {
    async fn next_chunk(&mut self) -> jaryn_push::Result<Option<Bytes>> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None => std::future::pending().await,
        }
    }
}

impl Transport for ScriptedTransport {
    type Stream = ScriptedStream;

    async fn open(&self, _url: &str, _token: Option<&str>) -> jaryn_push::Result<ScriptedStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedStream {
            chunks: script
                .into_iter()
                .map(|frame| Bytes::from(format!("data: {frame}\n\n")))
                .collect(),
            live: Arc::clone(&self.live),
        })
    }
}

const RECEIVED_FOR_ALICE: &str = r#"{"type":"Received","to":["alice@jaryn.com"]}"#;
const SENT_TO_BOB: &str = r#"{"type":"Sent","to":["bob@jaryn.com"]}"#;

fn gate(username: &str, signals: &Signals) -> Arc<SessionGate> {
    let store = Arc::new(MemorySessionStore::with_session(Session::new("token", username)));
    Arc::new(SessionGate::new(store, signals.logout.clone(), "jaryn.com"))
}

fn router(
    transport: ScriptedTransport,
    username: &str,
) -> (EventRouter<ScriptedTransport>, Arc<SessionGate>, Signals) {
    let signals = Signals::new();
    let session = gate(username, &signals);
    let config = PushConfig::new("http://localhost:8080/event-stream");
    let router = EventRouter::new(transport, config, Arc::clone(&session), signals.clone());
    (router, session, signals)
}

async fn next<T: Clone>(subscription: &mut Subscription<T>) -> T {
    tokio::time::timeout(Duration::from_secs(30), subscription.recv())
        .await
        .expect("signal timed out")
        .expect("signal closed")
}

#[tokio::test(start_paused = true)]
async fn test_event_for_alice_refreshes_alice_only() {
    for (user, expected) in [
        ("alice", PushEventKind::Received),
        ("bob", PushEventKind::Sent),
    ] {
        let transport = ScriptedTransport::new(vec![vec![RECEIVED_FOR_ALICE, SENT_TO_BOB]]);
        let (mut router, _session, signals) = router(transport, user);
        let mut refresh = signals.list_refresh.subscribe();
        let mut unread = signals.unread_count.subscribe();

        router.connect().await;
        assert_eq!(next(&mut refresh).await, RefreshReason::Push(expected));
        next(&mut unread).await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(refresh.try_recv().is_none(), "{user} got a second refresh");
        router.stop().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_skipped() {
    let transport = ScriptedTransport::new(vec![vec!["{not json", RECEIVED_FOR_ALICE]]);
    let (mut router, session, signals) = router(transport, "alice");
    let mut refresh = signals.list_refresh.subscribe();

    router.connect().await;
    assert_eq!(
        next(&mut refresh).await,
        RefreshReason::Push(PushEventKind::Received)
    );
    assert!(session.is_authenticated());
    router.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_token_expired_logs_out_and_halts_routing() {
    let transport = ScriptedTransport::new(vec![vec![
        r#"{"type":"Token_Expired"}"#,
        RECEIVED_FOR_ALICE,
    ]]);
    let opens = Arc::clone(&transport.opens);
    let live = Arc::clone(&transport.live);
    let (mut router, session, signals) = router(transport, "alice");
    let mut logout = signals.logout.subscribe();
    let mut refresh = signals.list_refresh.subscribe();

    router.connect().await;
    assert_eq!(next(&mut logout).await, LogoutReason::TokenExpired);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!session.is_authenticated());
    assert!(refresh.try_recv().is_none());
    assert_eq!(router.active_generation(), 0);

    // The push worker let go of the stale connection on its own.
    assert!(!router.is_running());
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    router.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_keeps_one_connection_without_duplicates() {
    let transport = ScriptedTransport::new(vec![vec![RECEIVED_FOR_ALICE], vec![RECEIVED_FOR_ALICE]]);
    let opens = Arc::clone(&transport.opens);
    let live = Arc::clone(&transport.live);
    let (mut router, _session, signals) = router(transport, "alice");
    let mut refresh = signals.list_refresh.subscribe();

    let first = router.connect().await;
    next(&mut refresh).await;
    assert!(router.stop().await);
    assert_eq!(router.active_generation(), 0);

    let second = router.connect().await;
    assert_ne!(first, second);
    next(&mut refresh).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(refresh.try_recv().is_none());
    assert_eq!(opens.load(Ordering::SeqCst), 2);
    assert_eq!(live.load(Ordering::SeqCst), 1);
    assert!(router.is_running());
    router.stop().await;
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_list_is_local() {
    let (router, _session, signals) = router(ScriptedTransport::default(), "alice");
    let mut refresh = signals.list_refresh.subscribe();
    router.refresh_list();
    assert_eq!(refresh.try_recv(), Some(RefreshReason::Local));
}

/// Serves 401 with a JSON error body to every request.
async fn unauthorized_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let body = r#"{"success":false,"error":"Invalid token"}"#;
                let response = format!(
                    "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_push_and_rest_unauthorized_clear_session_once() {
    let base = unauthorized_server().await;
    let config = Arc::new(ClientConfig::new().with_server(base));
    let signals = Signals::new();
    let store = Arc::new(MemorySessionStore::with_session(Session::new("stale", "alice")));
    let session = Arc::new(SessionGate::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        signals.logout.clone(),
        "jaryn.com",
    ));
    let api = ApiClient::new(Arc::clone(&config), Arc::clone(&session)).unwrap();
    let mut router = EventRouter::http(config.push_config(), Arc::clone(&session), signals.clone());
    let mut logout = signals.logout.subscribe();

    let (rest, _) = tokio::join!(api.unread_count(), router.connect());
    assert!(matches!(rest, Err(Error::Unauthorized | Error::NotAuthenticated)));

    let reason = next(&mut logout).await;
    assert!(matches!(
        reason,
        LogoutReason::Unauthorized | LogoutReason::PushUnauthorized
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(logout.try_recv().is_none(), "logout fired twice");
    assert!(!session.is_authenticated());
    assert!(store.load().unwrap().is_none());
    assert!(!router.is_running());
}

#[tokio::test]
async fn test_login_rejection_keeps_session() {
    let base = unauthorized_server().await;
    let config = Arc::new(ClientConfig::new().with_server(base));
    let signals = Signals::new();
    let session = Arc::new(SessionGate::new(
        Arc::new(MemorySessionStore::new()),
        signals.logout.clone(),
        "jaryn.com",
    ));
    let api = ApiClient::new(config, Arc::clone(&session)).unwrap();
    let mut logout = signals.logout.subscribe();

    let result = api.login("alice", "Wrong1234").await;
    assert!(matches!(result, Err(Error::InvalidCredentials)));
    assert!(logout.try_recv().is_none());
}

#[tokio::test]
async fn test_late_401_for_replaced_token_keeps_new_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (arrived_tx, arrived_rx) = oneshot::channel::<String>();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let n = socket.read(&mut request).await.unwrap();
        let _ = arrived_tx.send(String::from_utf8_lossy(&request[..n]).into_owned());
        let _ = release_rx.await;
        let response = "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    });

    let config = Arc::new(ClientConfig::new().with_server(base));
    let signals = Signals::new();
    let store = Arc::new(MemorySessionStore::with_session(Session::new("old", "alice")));
    let session = Arc::new(SessionGate::new(
        Arc::clone(&store) as Arc<dyn SessionStore>,
        signals.logout.clone(),
        "jaryn.com",
    ));
    let api = ApiClient::new(config, Arc::clone(&session)).unwrap();
    let mut logout = signals.logout.subscribe();

    let pending = tokio::spawn(async move { api.unread_count().await });
    let request = arrived_rx.await.unwrap();
    assert!(request.to_ascii_lowercase().contains("bearer old"));

    // Re-login lands while the old request is still in flight.
    session.begin(Session::new("new", "alice")).unwrap();
    release_tx.send(()).unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(Error::Unauthorized)));
    assert!(logout.try_recv().is_none());
    assert_eq!(session.token().as_deref(), Some("new"));
    assert_eq!(store.load().unwrap().unwrap().token, "new");
}
