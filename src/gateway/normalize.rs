//! Pure classification of request failures into [`AppError`].

use serde_json::Value;

use crate::error::{AppError, ErrorKind};

const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred";

/// Where a request failed. One variant per failure origin.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// A response arrived with a non-success status.
    Response { status: u16, body: Option<Value> },
    /// The request was sent (or attempted) but no response came back.
    NoResponse { reason: String, timed_out: bool },
    /// Anything else: request build errors, bad URLs, undecodable bodies.
    Local { message: Option<String> },
}

impl Failure {
    /// Sort a transport error into its origin. `reqwest` reports timeouts, connect
    /// failures and mid-flight resets without a response; builder, redirect and decode
    /// errors are local.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() || err.is_decode() || err.is_redirect() {
            return Failure::Local { message: Some(err.to_string()) };
        }
        Failure::NoResponse { reason: err.to_string(), timed_out: err.is_timeout() }
    }

    /// Parse a response body the way the server sent it: JSON when it parses,
    /// otherwise the raw text, nothing when empty.
    pub fn from_response(status: u16, text: &str) -> Self {
        let trimmed = text.trim();
        let body = if trimmed.is_empty() {
            None
        } else {
            Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
        };
        Failure::Response { status, body }
    }
}

fn body_message(body: Option<&Value>) -> Option<String> {
    match body? {
        Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn body_code(body: Option<&Value>) -> Option<String> {
    body?
        .get("code")
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Classify a failure. Exactly one `AppError` per input; no side effects.
pub fn normalize(failure: &Failure) -> AppError {
    match failure {
        Failure::Response { status, body } => {
            let kind = ErrorKind::from_status(*status);
            let message = body_message(body.as_ref()).unwrap_or_else(|| kind.default_message().to_string());
            let code = body_code(body.as_ref()).unwrap_or_else(|| kind.as_str().to_string());
            AppError::new(kind, message, *status, code)
        }
        Failure::NoResponse { timed_out, .. } => {
            let kind = ErrorKind::NetworkError;
            let code = if *timed_out { "TIMEOUT" } else { kind.as_str() };
            AppError::new(kind, kind.default_message(), 0, code)
        }
        Failure::Local { message } => {
            let message = message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(UNEXPECTED_MESSAGE);
            AppError::new(ErrorKind::Unknown, message, 0, ErrorKind::Unknown.as_str())
        }
    }
}
