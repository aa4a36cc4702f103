//! User-visible failure notifications ("toasts").
//! The gateway reports every non-401 failure through a [`Notifier`]; the UI (or the CLI)
//! decides how to show it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{AppError, ErrorKind};

pub trait Notifier: Send + Sync {
    fn notify(&self, error: &AppError);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: ErrorKind,
    pub message: String,
    pub code: String,
    pub status_code: u16,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn from_error(error: &AppError) -> Self {
        Self {
            kind: error.kind(),
            message: error.message().to_string(),
            code: error.code_str().to_string(),
            status_code: error.status_code(),
            at: Utc::now(),
        }
    }
}

/// Broadcasts notifications to every subscriber. Slow subscribers drop the oldest ones.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> { self.tx.subscribe() }
}

impl Default for NotificationHub {
    fn default() -> Self { Self::new(64) }
}

impl Notifier for NotificationHub {
    fn notify(&self, error: &AppError) {
        // No subscriber is not an error; the toast simply has no audience.
        let _ = self.tx.send(Notification::from_error(error));
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, error: &AppError) {
        warn!(target: "careway::notify", "{} ({}): {}", error.kind(), error.status_code(), error.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{normalize, Failure};

    #[test]
    fn hub_fans_out_to_subscribers() {
        let hub = NotificationHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let err = normalize(&Failure::Response { status: 429, body: None });
        hub.notify(&err);
        let na = a.try_recv().unwrap();
        let nb = b.try_recv().unwrap();
        assert_eq!(na.kind, ErrorKind::RateLimit);
        assert_eq!(na.message, "Too many requests. Please try again later.");
        assert_eq!(na.status_code, 429);
        assert_eq!(nb.code, "RATE_LIMIT");
        assert!(a.try_recv().is_err());
    }

    #[test]
    fn notify_without_subscribers_is_fine() {
        let hub = NotificationHub::new(0);
        hub.notify(&normalize(&Failure::Local { message: None }));
        LogNotifier.notify(&normalize(&Failure::Local { message: None }));
    }
}
