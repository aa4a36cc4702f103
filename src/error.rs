//! Unified client error model.
//! Every failure that crosses the gateway boundary is an [`AppError`]; features above the
//! gateway never see raw transport errors.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable failure taxonomy shared by every consumer of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller-correctable input problem.
    BadRequest,
    /// Session invalid; the client logs out.
    Unauthorized,
    /// Authenticated but not allowed. Does not log the user out.
    Forbidden,
    NotFound,
    RateLimit,
    ServerError,
    /// No response reached the client.
    NetworkError,
    Unknown,
}

impl ErrorKind {
    /// Wire name, also used as the default `code`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Map an HTTP status to its kind. Statuses outside the table are `Unknown`.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RateLimit,
            500 => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        }
    }

    /// User-facing message used when the server supplies none.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Invalid request",
            ErrorKind::Unauthorized => "Unauthorized. Please login again.",
            ErrorKind::Forbidden => "You do not have permission to perform this action.",
            ErrorKind::NotFound => "Resource not found.",
            ErrorKind::RateLimit => "Too many requests. Please try again later.",
            ErrorKind::ServerError => "Server error. Please try again later.",
            ErrorKind::NetworkError => "Network error. Please check your connection.",
            ErrorKind::Unknown => "An error occurred",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Classified failure. Immutable once built; constructed by the normalizer
/// (`gateway::normalize`) or by the narrow local constructors below. Serialize-only, so
/// no other path can mint one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    status_code: u16,
    code: String,
}

impl AppError {
    pub(crate) fn new<M: Into<String>, C: Into<String>>(kind: ErrorKind, message: M, status_code: u16, code: C) -> Self {
        AppError { kind, message: message.into(), status_code, code: code.into() }
    }

    /// Local storage failure. Never produced from a response.
    pub(crate) fn storage<S: Into<String>>(msg: S) -> Self {
        AppError::new(ErrorKind::Unknown, msg, 0, "STORAGE_ERROR")
    }

    /// Local configuration failure (bad base URL, client build error).
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        AppError::new(ErrorKind::Unknown, msg, 0, "CONFIG_ERROR")
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn message(&self) -> &str { &self.message }
    /// HTTP status of the failed response, `0` when no response was received.
    pub fn status_code(&self) -> u16 { self.status_code }
    pub fn code_str(&self) -> &str { &self.code }

    pub fn is_unauthorized(&self) -> bool { self.kind == ErrorKind::Unauthorized }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        crate::gateway::normalize(&crate::gateway::Failure::Local { message: Some(err.to_string()) })
    }
}

impl From<crate::storage::StorageError> for AppError {
    fn from(err: crate::storage::StorageError) -> Self { AppError::storage(err.to_string()) }
}
