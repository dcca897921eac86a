//! # Test Support
//!
//! A single in-process [`MockServer`] stands in for everything the client
//! talks to:
//!
//! - the REST backend and the Firebase endpoints, answered from canned
//!   responses keyed by `"METHOD /path"` (every request is recorded);
//! - the STOMP endpoint at `/ws/websocket`, which answers `CONNECT` with
//!   `CONNECTED` and pushes whatever the test queues.
//!
//! The server binds an ephemeral port on `127.0.0.1` and stops when dropped.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use pm_client::auth::FirebaseIdentity;
use pm_client::notifications::{Command, Frame, NOTIFICATION_QUEUE};
use pm_client::retrieve::{ApiClient, Credentials};

pub const TEST_API_KEY: &str = "test-api-key";

/// One request as the mock backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// What the STOMP endpoint does next on every live session.
#[derive(Debug, Clone)]
pub enum StompPush {
    Message(String),
    /// Several MESSAGE frames packed into one WebSocket text message.
    Batch(Vec<String>),
    Error(String),
    Drop,
}

#[derive(Default)]
struct RestState {
    responses: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

struct StompState {
    accepting: AtomicBool,
    sessions: AtomicUsize,
    disconnects: AtomicUsize,
    heart_beats: AtomicUsize,
    // Advertised in CONNECTED. The broker itself never sends beats.
    heart_beat: Mutex<String>,
    connects: Mutex<Vec<Frame>>,
    subscriptions: Mutex<Vec<Frame>>,
    push: broadcast::Sender<StompPush>,
}

#[derive(Clone)]
struct AppState {
    rest: Arc<RestState>,
    stomp: Arc<StompState>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockServer {
    addr: SocketAddr,
    state: AppState,
    handle: JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockServer {
    pub async fn start() -> MockServer {
        let (push, _) = broadcast::channel(64);
        let state = AppState {
            rest: Arc::new(RestState::default()),
            stomp: Arc::new(StompState {
                accepting: AtomicBool::new(true),
                sessions: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                heart_beats: AtomicUsize::new(0),
                heart_beat: Mutex::new("0,0".to_string()),
                connects: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(Vec::new()),
                push,
            }),
        };

        let app = Router::new()
            .route("/ws/websocket", get(stomp_endpoint))
            .fallback(rest_fallback)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock server stopped: {}", e);
            }
        });

        MockServer { addr, state, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answers `method path` with `status` and `body` until replaced.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        lock(&self.state.rest.responses).insert(format!("{} {}", method, path), (status, body.into()));
    }

    pub fn respond_json(&self, method: &str, path: &str, body: Value) {
        self.respond(method, path, 200, body.to_string());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        lock(&self.state.rest.requests).clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// A client for this server with read retries disabled.
    pub fn api_client(&self, credentials: Arc<dyn Credentials>) -> Arc<ApiClient> {
        Arc::new(ApiClient::new(&self.base_url(), credentials, 0).expect("mock base URL"))
    }

    /// Firebase provider pointed at this server.
    pub fn firebase(&self) -> FirebaseIdentity {
        FirebaseIdentity::with_endpoints(
            TEST_API_KEY,
            &format!("{}/identitytoolkit/v1", self.base_url()),
            &format!("{}/securetoken/v1", self.base_url()),
        )
        .expect("mock identity endpoints")
    }

    /// Makes password sign-in succeed with `id_token`, valid for `expires_in` seconds.
    pub fn stub_sign_in(&self, uid: &str, email: &str, id_token: &str, expires_in: u64) {
        self.respond_json(
            "POST",
            "/identitytoolkit/v1/accounts:signInWithPassword",
            json!({
                "kind": "identitytoolkit#VerifyPasswordResponse",
                "localId": uid,
                "email": email,
                "idToken": id_token,
                "refreshToken": format!("refresh-{}", uid),
                "expiresIn": expires_in.to_string(),
                "registered": true,
            }),
        );
    }

    pub fn stub_token_refresh(&self, uid: &str, id_token: &str) {
        self.respond_json(
            "POST",
            "/securetoken/v1/token",
            json!({
                "id_token": id_token,
                "refresh_token": format!("refresh-{}", uid),
                "expires_in": "3600",
                "token_type": "Bearer",
                "user_id": uid,
            }),
        );
    }

    pub fn push(&self, command: StompPush) {
        let _ = self.state.stomp.push.send(command);
    }

    pub fn push_notification(&self, notification: Value) {
        self.push(StompPush::Message(notification.to_string()));
    }

    /// While false, WebSocket sessions are closed right after the upgrade.
    pub fn set_accepting(&self, accepting: bool) {
        self.state.stomp.accepting.store(accepting, Ordering::SeqCst);
    }

    /// WebSocket sessions opened so far, accepted or not.
    pub fn stomp_sessions(&self) -> usize {
        self.state.stomp.sessions.load(Ordering::SeqCst)
    }

    pub fn stomp_disconnects(&self) -> usize {
        self.state.stomp.disconnects.load(Ordering::SeqCst)
    }

    /// Heart-beat the broker advertises in CONNECTED, e.g. `"100,100"`.
    /// It never beats back, so a client expecting beats sees silence.
    pub fn set_heart_beat(&self, heart_beat: &str) {
        *lock(&self.state.stomp.heart_beat) = heart_beat.to_string();
    }

    /// Bare-EOL heart-beats received from clients.
    pub fn heart_beats(&self) -> usize {
        self.state.stomp.heart_beats.load(Ordering::SeqCst)
    }

    pub fn connect_frames(&self) -> Vec<Frame> {
        lock(&self.state.stomp.connects).clone()
    }

    pub fn subscribe_frames(&self) -> Vec<Frame> {
        lock(&self.state.stomp.subscriptions).clone()
    }
}

async fn rest_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    lock(&state.rest.requests).push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let key = format!("{} {}", method, path);
    let canned = lock(&state.rest.responses).get(&key).cloned();
    match canned {
        Some((status, body)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, format!("no canned response for {}", key)).into_response(),
    }
}

async fn stomp_endpoint(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stomp_session(socket, state.stomp))
}

async fn stomp_session(mut socket: WebSocket, stomp: Arc<StompState>) {
    let session = stomp.sessions.fetch_add(1, Ordering::SeqCst);
    if !stomp.accepting.load(Ordering::SeqCst) {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let mut push = stomp.push.subscribe();
    let mut message_id = 0u64;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                };
                if text.as_str().trim_matches(|c| c == '\n' || c == '\r').is_empty() {
                    stomp.heart_beats.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
                let Ok(Some(frame)) = Frame::parse(text.as_str()) else { continue };
                match frame.command {
                    Command::Connect | Command::Stomp => {
                        lock(&stomp.connects).push(frame);
                        let connected = Frame::new(Command::Connected)
                            .header("version", "1.2")
                            .header("heart-beat", lock(&stomp.heart_beat).clone())
                            .header("session", format!("session-{}", session))
                            .encode();
                        if socket.send(Message::Text(connected.into())).await.is_err() {
                            return;
                        }
                    }
                    Command::Subscribe => lock(&stomp.subscriptions).push(frame),
                    Command::Disconnect => {
                        stomp.disconnects.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                    _ => {}
                }
            }
            command = push.recv() => {
                match command {
                    Ok(StompPush::Message(body)) => {
                        message_id += 1;
                        let frame = Frame::new(Command::Message)
                            .header("destination", NOTIFICATION_QUEUE)
                            .header("subscription", "sub-0")
                            .header("message-id", message_id.to_string())
                            .header("content-type", "application/json")
                            .body(body)
                            .encode();
                        if socket.send(Message::Text(frame.into())).await.is_err() {
                            return;
                        }
                    }
                    Ok(StompPush::Batch(bodies)) => {
                        let mut packed = String::new();
                        for body in bodies {
                            message_id += 1;
                            packed.push_str(
                                &Frame::new(Command::Message)
                                    .header("destination", NOTIFICATION_QUEUE)
                                    .header("subscription", "sub-0")
                                    .header("message-id", message_id.to_string())
                                    .body(body)
                                    .encode(),
                            );
                        }
                        if socket.send(Message::Text(packed.into())).await.is_err() {
                            return;
                        }
                    }
                    Ok(StompPush::Error(message)) => {
                        let frame = Frame::new(Command::Error)
                            .header("message", message)
                            .encode();
                        let _ = socket.send(Message::Text(frame.into())).await;
                        return;
                    }
                    Ok(StompPush::Drop) => {
                        let _ = socket.send(Message::Close(None)).await;
                        return;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}

/// Fixed bearer token; counts session rejections.
#[derive(Default)]
pub struct StaticToken {
    pub token: Option<String>,
    pub rejections: AtomicUsize,
}

impl StaticToken {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            rejections: AtomicUsize::new(0),
        }
    }

    pub fn rejections(&self) -> usize {
        self.rejections.load(Ordering::SeqCst)
    }
}

impl Credentials for StaticToken {
    fn bearer_token(&self) -> BoxFuture<'_, Option<String>> {
        let token = self.token.clone();
        Box::pin(async move { token })
    }

    fn session_rejected(&self) -> BoxFuture<'_, ()> {
        self.rejections.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}

/// Polls `condition` every 10 ms; panics after five seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Runs `fut` with a five second ceiling.
pub async fn within<F: Future>(what: &str, fut: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(5), fut).await {
        Ok(out) => out,
        Err(_) => panic!("timed out waiting for {}", what),
    }
}

pub fn notification_json(id: &str, kind: &str, title: &str) -> Value {
    json!({
        "id": id,
        "type": kind,
        "title": title,
        "message": format!("{} message", title),
        "icon": "*",
        "timestamp": "2026-10-19T08:00:00Z",
        "read": false,
    })
}
