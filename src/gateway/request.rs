use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppResult;

use super::normalize::{normalize, Failure};

/// Which bearer credential a request carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    /// The access token from the credential record, when there is one.
    #[default]
    Stored,
    /// Send unauthenticated.
    None,
    /// A caller-supplied token.
    Explicit(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub credentials: Credentials,
    /// Skip the global notification; the caller shows the error itself.
    pub suppress_error_notification: bool,
}

impl RequestOptions {
    pub fn anonymous() -> Self { Self { credentials: Credentials::None, ..Default::default() } }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { credentials: Credentials::Explicit(token.into()), ..Default::default() }
    }

    pub fn quiet(mut self) -> Self {
        self.suppress_error_notification = true;
        self
    }

    /// Only requests carrying the stored credential can expire the session.
    pub fn uses_stored_credentials(&self) -> bool { self.credentials == Credentials::Stored }
}

/// Successful response, body passed through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON; a non-JSON body is kept as a string, an empty body is `Null`.
    pub body: Value,
    pub request_id: String,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| normalize(&Failure::Local { message: Some(format!("unexpected response shape: {}", e)) }))
    }

    pub fn into_body(self) -> Value { self.body }
}
