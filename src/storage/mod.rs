//!
//! careway credential storage
//! --------------------------
//! Durable client-side key/value storage for the credential record. The record lives
//! under three keys (`token`, `refreshToken`, `user`) which are always written or
//! cleared together through [`StorageBackend::apply`]. Backends apply a batch under a
//! single write lock so readers see either the whole old record or the whole new one.
//!
//! Two backends are provided: [`MemoryBackend`] for tests and embedded use, and
//! [`FileBackend`] which persists a JSON object to disk with write-to-temp + rename.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Access token key.
pub const TOKEN_KEY: &str = "token";
/// Refresh token key.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// JSON user snapshot key.
pub const USER_KEY: &str = "user";

/// The credential record keys, in storage order.
pub const CREDENTIAL_KEYS: [&str; 3] = [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("credential storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential storage encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// One step of an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set(String, String),
    Remove(String),
}

impl Mutation {
    pub fn set(key: &str, value: impl Into<String>) -> Self { Mutation::Set(key.to_string(), value.into()) }
    pub fn remove(key: &str) -> Self { Mutation::Remove(key.to_string()) }
}

pub trait StorageBackend: Send + Sync {
    /// Read several keys under one lock. Output order follows `keys`.
    fn read(&self, keys: &[&str]) -> Vec<Option<String>>;

    /// Apply every mutation or none of them.
    fn apply(&self, batch: &[Mutation]) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Option<String> {
        self.read(&[key]).into_iter().next().flatten()
    }
}

pub(crate) fn apply_to_map(map: &mut std::collections::HashMap<String, String>, batch: &[Mutation]) {
    for m in batch {
        match m {
            Mutation::Set(k, v) => { map.insert(k.clone(), v.clone()); }
            Mutation::Remove(k) => { map.remove(k); }
        }
    }
}
