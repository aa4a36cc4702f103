use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::gateway::{normalize, ApiClient, Failure, Method, RequestOptions};
use crate::tprintln;

use super::principal::{CredentialRecord, UserSnapshot};
use super::session::Session;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const SOCIAL_LOGIN_PATH: &str = "/api/auth/social/login";
pub const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/api/auth/reset-password";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Facebook,
    Instagram,
    Apple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLoginRequest {
    pub provider: SocialProvider,
    /// Provider-side account id.
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordBody<'a> {
    token: &'a str,
    new_password: &'a str,
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Pull the credential record out of a login/registration response. The token may be
/// `accessToken` or `token`; the user may be nested under `user` or flattened.
pub fn credential_record_from(body: &Value) -> AppResult<CredentialRecord> {
    let access_token = non_empty_str(body, "accessToken")
        .or_else(|| non_empty_str(body, "token"))
        .ok_or_else(|| normalize(&Failure::Local {
            message: Some("Authentication response did not include an access token".into()),
        }))?;
    let refresh_token = non_empty_str(body, "refreshToken").unwrap_or_default();
    let user_value = body.get("user").filter(|u| u.is_object()).unwrap_or(body);
    let user = UserSnapshot::from_value(user_value).ok_or_else(|| normalize(&Failure::Local {
        message: Some("Authentication response did not include a user".into()),
    }))?;
    Ok(CredentialRecord { access_token: access_token.to_string(), refresh_token: refresh_token.to_string(), user })
}

/// Login, registration and logout workflows. Each one updates storage and the session
/// store as a unit through the client's [`SessionStore`](super::SessionStore).
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self { Self { client } }

    pub fn client(&self) -> &ApiClient { &self.client }

    pub fn session(&self) -> Session { self.client.sessions().session() }

    /// Errors are shown inline by the login form, so no global notification.
    pub async fn login(&self, req: &LoginRequest) -> AppResult<Session> {
        self.authenticate(LOGIN_PATH, req, RequestOptions::anonymous().quiet()).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> AppResult<Session> {
        self.authenticate(REGISTER_PATH, req, RequestOptions::anonymous()).await
    }

    pub async fn social_login(&self, req: &SocialLoginRequest) -> AppResult<Session> {
        self.authenticate(SOCIAL_LOGIN_PATH, req, RequestOptions::anonymous()).await
    }

    async fn authenticate<B: Serialize + ?Sized>(&self, path: &str, body: &B, opts: RequestOptions) -> AppResult<Session> {
        let sessions = self.client.sessions();
        let workflow = sessions.begin_workflow();
        let resp = self.client.send_json(Method::POST, path, body, opts.clone()).await?;
        let record = credential_record_from(&resp.body)
            .map_err(|e| self.client.report(&Method::POST, path, e, &opts))?;
        sessions
            .establish(&record)
            .map_err(|e| self.client.report(&Method::POST, path, AppError::from(e), &opts))?;
        drop(workflow);
        info!(target: "careway::auth", "authenticated via {} user_id={}", path, record.user.id);
        Ok(sessions.session())
    }

    /// Local clear first and unconditionally, then a best-effort remote revoke of the
    /// refresh token. Never fails.
    pub async fn logout(&self) {
        let sessions = self.client.sessions();
        let _workflow = sessions.begin_workflow();
        let access = sessions.access_token();
        let refresh = sessions.refresh_token();
        if let Err(e) = sessions.invalidate() {
            warn!(target: "careway::auth", "could not clear stored credentials: {}", e);
        }
        let Some(refresh) = refresh else {
            tprintln!("auth.logout no refresh token; skipping revoke");
            return;
        };
        let opts = match access {
            Some(token) => RequestOptions::with_token(token),
            None => RequestOptions::anonymous(),
        }
        .quiet();
        let body = RefreshTokenBody { refresh_token: &refresh };
        match self.client.send_json(Method::POST, LOGOUT_PATH, &body, opts).await {
            Ok(_) => info!(target: "careway::auth", "logged out; refresh token revoked"),
            Err(e) => warn!(target: "careway::auth", "logged out locally; remote revoke failed: {}", e),
        }
    }

    pub async fn forgot_password(&self, email: &str) -> AppResult<()> {
        self.client
            .send_json(Method::POST, FORGOT_PASSWORD_PATH, &EmailBody { email }, RequestOptions::anonymous())
            .await
            .map(|_| ())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        let body = ResetPasswordBody { token, new_password };
        self.client
            .send_json(Method::POST, RESET_PASSWORD_PATH, &body, RequestOptions::anonymous())
            .await
            .map(|_| ())
    }
}
