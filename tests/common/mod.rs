#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use careway::gateway::{ApiClient, History, Navigator};
use careway::identity::{AuthService, CredentialRecord, SessionStore, UserSnapshot};
use careway::notify::{Notification, Notifier};
use careway::storage::MemoryBackend;
use careway::{AppError, GatewayConfig};

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "Secret123!";
pub const ACCESS: &str = "access-1";
pub const REFRESH: &str = "refresh-1";

/// How the mock answers `POST /api/auth/logout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutMode {
    Ok,
    ServerError,
    Hang,
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    pub body: Option<Value>,
}

pub struct MockState {
    pub seen: Mutex<Vec<Seen>>,
    pub logout_mode: Mutex<LogoutMode>,
}

impl MockState {
    pub fn requests_to(&self, path: &str) -> Vec<Seen> {
        self.seen.lock().iter().filter(|s| s.path == path).cloned().collect()
    }
}

type Shared = Arc<MockState>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

async fn record(State(state): State<Shared>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, 1 << 20).await.unwrap_or_default();
    state.seen.lock().push(Seen {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        authorization: header(&parts.headers, "authorization"),
        request_id: header(&parts.headers, "x-request-id"),
        body: serde_json::from_slice(&bytes).ok(),
    });
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn login_body(access: &str, refresh: &str, user_id: u64, email: &str, role: &str) -> Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "tokenType": "Bearer",
        "userId": user_id,
        "email": email,
        "role": role,
        "expiresIn": 86_400_000u64
    })
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        return Json(login_body(ACCESS, REFRESH, 7, EMAIL, "USER")).into_response();
    }
    if body["email"] == "notoken@b.com" {
        return Json(json!({"userId": 10, "email": "notoken@b.com", "role": "USER"})).into_response();
    }
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid email or password", "code": "INVALID_CREDENTIALS"})))
        .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == "taken@b.com" {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "Email already registered"}))).into_response();
    }
    if body["email"] == "notoken@b.com" {
        return Json(json!({"user": {"id": "u-10", "email": body["email"]}})).into_response();
    }
    Json(json!({
        "token": "access-reg",
        "user": {
            "id": "u-9",
            "email": body["email"],
            "firstName": body["firstName"],
            "lastName": body["lastName"],
            "roles": [body["role"].as_str().unwrap_or("PATIENT")]
        }
    }))
    .into_response()
}

async fn social_login(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    Json(login_body("access-social", "refresh-social", 11, &email, "PATIENT")).into_response()
}

async fn logout(State(state): State<Shared>) -> Response {
    let mode = *state.logout_mode.lock();
    match mode {
        LogoutMode::Ok => StatusCode::OK.into_response(),
        LogoutMode::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        LogoutMode::Hang => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK.into_response()
        }
    }
}

async fn forgot_password() -> Response {
    Json(json!({"message": "If the email exists, a reset link has been sent"})).into_response()
}

async fn reset_password(Json(body): Json<Value>) -> Response {
    if body["token"] == "good-token" && body["newPassword"].as_str().is_some_and(|p| p.len() >= 8) {
        return Json(json!({"message": "Password updated"})).into_response();
    }
    (StatusCode::BAD_REQUEST, Json(json!({"message": "Reset token is invalid or expired", "code": "INVALID_TOKEN"})))
        .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    if header(&headers, "authorization").as_deref() == Some("Bearer access-1") {
        return Json(json!({"id": 7, "email": EMAIL})).into_response();
    }
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token expired"}))).into_response()
}

async fn expired() -> Response {
    // keep concurrent callers in flight together
    tokio::time::sleep(Duration::from_millis(100)).await;
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token expired", "code": "TOKEN_EXPIRED"}))).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({"late": true})).into_response()
}

fn app(state: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/social/login", post(social_login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/me", get(me))
        .route("/api/hospitals", get(|| async { Json(json!([{"id": 1, "name": "Acibadem"}, {"id": 2, "name": "Memorial"}])) }))
        .route("/api/admin/stats", get(|| async { (StatusCode::FORBIDDEN, Json(json!({"message": "Access denied"}))) }))
        .route("/api/limited", get(|| async { (StatusCode::TOO_MANY_REQUESTS, Json(json!({"message": "Slow down", "code": "RATE_LIMITED"}))) }))
        .route("/api/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/api/gone", get(|| async { StatusCode::GONE }))
        .route("/api/ping", get(|| async { "pong" }))
        .route("/api/expired", get(expired))
        .route("/api/slow", get(slow))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

/// Start the mock API on an ephemeral localhost port. Abort the handle to stop it.
pub async fn start_mock() -> (JoinHandle<()>, Shared, String) {
    let state = Arc::new(MockState { seen: Mutex::new(Vec::new()), logout_mode: Mutex::new(LogoutMode::Ok) });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().expect("local addr");
    let router = app(state.clone());
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            eprintln!("mock server task error: {e:?}");
        }
    });
    (handle, state, format!("http://{}", addr))
}

/// A localhost URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind 127.0.0.1:0");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Keeps every notification it is handed.
#[derive(Default)]
pub struct Recorder {
    pub seen: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn count(&self) -> usize { self.seen.lock().len() }
}

impl Notifier for Recorder {
    fn notify(&self, error: &AppError) { self.seen.lock().push(Notification::from_error(error)); }
}

pub struct Harness {
    pub mock: Shared,
    pub base: String,
    pub backend: Arc<MemoryBackend>,
    pub sessions: Arc<SessionStore>,
    pub history: Arc<History>,
    pub notes: Arc<Recorder>,
    pub client: ApiClient,
    pub auth: AuthService,
    server: Option<JoinHandle<()>>,
}

impl Harness {
    pub async fn start() -> Self { Self::start_with(|_| {}).await }

    pub async fn start_with(tune: impl FnOnce(&mut GatewayConfig)) -> Self {
        let (server, mock, base) = start_mock().await;
        let mut config = GatewayConfig { api_url: base.clone(), ..GatewayConfig::default() };
        tune(&mut config);
        Self::build(config, mock, base, Some(server))
    }

    /// Client pointed at a dead port; the mock still runs so its handle stays useful.
    pub async fn unreachable() -> Self {
        let (server, mock, _) = start_mock().await;
        let base = unreachable_url();
        let config = GatewayConfig { api_url: base.clone(), timeout_ms: 2_000, ..GatewayConfig::default() };
        Self::build(config, mock, base, Some(server))
    }

    fn build(config: GatewayConfig, mock: Shared, base: String, server: Option<JoinHandle<()>>) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let sessions = Arc::new(SessionStore::new(backend.clone()));
        sessions.hydrate();
        let history = Arc::new(History::starting_at("/dashboard"));
        let notes = Arc::new(Recorder::default());
        let client = ApiClient::new(&config, sessions.clone(), history.clone(), notes.clone()).expect("client");
        let auth = AuthService::new(client.clone());
        Self { mock, base, backend, sessions, history, notes, client, auth, server }
    }

    /// Store a record as if the user had logged in earlier.
    pub fn sign_in_as(&self, access: &str, roles: &[&str]) {
        let record = CredentialRecord {
            access_token: access.into(),
            refresh_token: REFRESH.into(),
            user: UserSnapshot::new("7", EMAIL, roles.iter().map(|r| r.to_string()).collect()),
        };
        self.sessions.establish(&record).expect("establish");
    }

    pub fn set_logout_mode(&self, mode: LogoutMode) { *self.mock.logout_mode.lock() = mode; }

    pub fn location(&self) -> Option<String> { self.history.current_location() }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(h) = self.server.take() {
            h.abort();
        }
    }
}
