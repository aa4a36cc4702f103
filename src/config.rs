//! Gateway configuration: defaults, a JSON file, then environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, AppResult};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_CREDENTIALS_DIR: &str = ".careway";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct GatewayConfig {
    /// Origin of the remote services; request paths are joined onto it.
    pub api_url: String,
    /// Upper bound for every request, in milliseconds.
    pub timeout_ms: u64,
    /// Where forced logouts and the route guard send the user.
    pub login_route: String,
    /// Directory holding `credentials.json` for the file backend.
    pub credentials_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            credentials_dir: PathBuf::from(DEFAULT_CREDENTIALS_DIR),
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    /// Defaults overridden by `CAREWAY_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|k| std::env::var(k).ok())
    }

    /// Read a JSON config file; missing fields keep their defaults.
    pub fn load_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| AppError::config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Apply overrides from any key lookup (the environment in production, a map in tests).
    pub fn with_overrides<F: Fn(&str) -> Option<String>>(mut self, lookup: F) -> Self {
        if let Some(v) = lookup("CAREWAY_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = v.trim().to_string();
        }
        if let Some(v) = lookup("CAREWAY_TIMEOUT_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.timeout_ms = ms,
                _ => warn!(target: "careway::config", "ignoring invalid CAREWAY_TIMEOUT_MS='{}'", v),
            }
        }
        if let Some(v) = lookup("CAREWAY_LOGIN_ROUTE").filter(|v| v.starts_with('/')) {
            self.login_route = v;
        }
        if let Some(v) = lookup("CAREWAY_CREDENTIALS_DIR").filter(|v| !v.is_empty()) {
            self.credentials_dir = PathBuf::from(v);
        }
        self
    }
}
