use std::sync::Arc;
use std::time::Instant;

use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::identity::SessionStore;
use crate::notify::Notifier;

use super::navigation::{login_redirect, Navigator};
use super::normalize::{normalize, Failure};
use super::request::{ApiResponse, Credentials, RequestOptions};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

struct Inner {
    base: Url,
    http: reqwest::Client,
    login_route: String,
    sessions: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

/// The one door every remote call goes through.
///
/// Attaches the stored bearer credential, bounds each request by the configured timeout,
/// classifies failures, expires the session on UNAUTHORIZED, and notifies everything else.
/// Cheap to clone; clones share the HTTP pool and session store.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

// Per-request facts needed on the failure path.
struct Attempt<'a> {
    method: &'a Method,
    path: &'a str,
    request_id: &'a str,
    epoch: u64,
    opts: &'a RequestOptions,
}

impl ApiClient {
    pub fn new(
        config: &GatewayConfig,
        sessions: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| AppError::config(format!("invalid api url '{}': {}", config.api_url, e)))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::config(format!("http client: {}", e)))?;
        info!(target: "careway::gateway", "gateway ready base={} timeout_ms={}", base, config.timeout_ms);
        Ok(Self {
            inner: Arc::new(Inner {
                base,
                http,
                login_route: config.login_route.clone(),
                sessions,
                navigator,
                notifier,
            }),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionStore> { &self.inner.sessions }
    pub fn navigator(&self) -> &Arc<dyn Navigator> { &self.inner.navigator }
    pub fn login_route(&self) -> &str { &self.inner.login_route }
    pub fn base_url(&self) -> &Url { &self.inner.base }

    pub async fn get(&self, path: &str) -> AppResult<ApiResponse> {
        self.send(Method::GET, path, None, RequestOptions::default()).await
    }

    pub async fn delete(&self, path: &str) -> AppResult<ApiResponse> {
        self.send(Method::DELETE, path, None, RequestOptions::default()).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<ApiResponse> {
        self.send_json(Method::POST, path, body, RequestOptions::default()).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<ApiResponse> {
        self.send_json(Method::PUT, path, body, RequestOptions::default()).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<ApiResponse> {
        self.send_json(Method::PATCH, path, body, RequestOptions::default()).await
    }

    /// Serialize `body` and send it with explicit options.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        opts: RequestOptions,
    ) -> AppResult<ApiResponse> {
        let value = serde_json::to_value(body)
            .map_err(|e| normalize(&Failure::Local { message: Some(format!("cannot encode request body: {}", e)) }))?;
        self.send(method, path, Some(value), opts).await
    }

    pub async fn send(&self, method: Method, path: &str, body: Option<Value>, opts: RequestOptions) -> AppResult<ApiResponse> {
        let request_id = Uuid::new_v4().to_string();
        let (epoch, stored_token) = self.inner.sessions.bearer();
        let attempt = Attempt { method: &method, path, request_id: &request_id, epoch, opts: &opts };

        let url = match self.inner.base.join(path) {
            Ok(u) => u,
            Err(e) => return Err(self.fail(Failure::Local { message: Some(format!("invalid request path '{}': {}", path, e)) }, &attempt)),
        };

        let mut req = self.inner.http
            .request(method.clone(), url)
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.as_str());
        let authenticated = match &opts.credentials {
            Credentials::Stored => match stored_token {
                Some(token) => { req = req.bearer_auth(token); true }
                None => false,
            },
            Credentials::Explicit(token) if !token.is_empty() => { req = req.bearer_auth(token); true }
            _ => false,
        };
        if let Some(b) = &body {
            req = req.json(b);
        }

        let started = Instant::now();
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(Failure::from_transport(&e), &attempt)),
        };
        let status = resp.status().as_u16();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => return Err(self.fail(Failure::from_transport(&e), &attempt)),
        };
        debug!(
            target: "careway::gateway",
            "{} {} -> {} in {}ms auth={} rid={}",
            method, path, status, started.elapsed().as_millis(), authenticated, request_id
        );

        if !(200..300).contains(&status) {
            return Err(self.fail(Failure::from_response(status, &text), &attempt));
        }
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body, request_id })
    }

    fn fail(&self, failure: Failure, attempt: &Attempt<'_>) -> AppError {
        let err = normalize(&failure);
        if err.is_unauthorized() && attempt.opts.uses_stored_credentials() {
            self.expire_session(attempt);
            return err;
        }
        warn!(
            target: "careway::gateway",
            "{} {} failed: {} status={} code={} rid={}",
            attempt.method, attempt.path, err.kind(), err.status_code(), err.code_str(), attempt.request_id
        );
        if !attempt.opts.suppress_error_notification {
            self.inner.notifier.notify(&err);
        }
        err
    }

    /// Log and broadcast a failure found after the exchange itself succeeded, such as an
    /// unusable response body.
    pub(crate) fn report(&self, method: &Method, path: &str, err: AppError, opts: &RequestOptions) -> AppError {
        warn!(target: "careway::gateway", "{} {} failed: {} code={}", method, path, err.kind(), err.code_str());
        if !opts.suppress_error_notification {
            self.inner.notifier.notify(&err);
        }
        err
    }

    // Silent: no notification, the login page is the feedback.
    fn expire_session(&self, attempt: &Attempt<'_>) {
        if !self.inner.sessions.force_logout(attempt.epoch) {
            return;
        }
        let from = self.inner.navigator.current_location();
        let to = login_redirect(&self.inner.login_route, from.as_deref());
        info!(target: "careway::gateway", "{} {} unauthorized; redirecting to {} rid={}", attempt.method, attempt.path, to, attempt.request_id);
        self.inner.navigator.navigate(&to);
    }
}
