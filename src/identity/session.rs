use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::storage::{Mutation, StorageBackend, StorageError, CREDENTIAL_KEYS, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};
use crate::tprintln;

use super::principal::{CredentialRecord, UserSnapshot};

/// Derived "who is logged in" view. Always recomputed from storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserSnapshot>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl Session {
    pub fn has_any_role<'a>(&self, roles: impl IntoIterator<Item = &'a str>) -> bool {
        let Some(user) = &self.user else { return false; };
        roles.into_iter().any(|r| user.has_role(r))
    }
}

/// Authoritative session cache over a [`StorageBackend`].
///
/// Single owner of credential writes: auth workflows call [`establish`](Self::establish)
/// and [`invalidate`](Self::invalidate); the gateway's unauthorized path goes through
/// [`force_logout`](Self::force_logout). Every change is published to subscribers.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    hydrated: AtomicBool,
    in_flight: AtomicUsize,
    // Bumped on every write of the credential record.
    epoch: AtomicU64,
    // Held across a storage write and its epoch change.
    write_lock: Mutex<()>,
    // Set when a forced logout could not clear storage; the stale record is then ignored.
    expired: AtomicBool,
    tx: watch::Sender<Session>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let (tx, _rx) = watch::channel(Session { user: None, is_authenticated: false, is_loading: true });
        Self {
            backend,
            hydrated: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            epoch: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            expired: AtomicBool::new(false),
            tx,
        }
    }

    /// Initial read from storage. Until this runs the session reports `is_loading`.
    pub fn hydrate(&self) -> Session {
        self.hydrated.store(true, Ordering::SeqCst);
        let s = self.publish();
        debug!(target: "careway::session", "hydrated authenticated={}", s.is_authenticated);
        s
    }

    pub fn is_hydrated(&self) -> bool { self.hydrated.load(Ordering::SeqCst) }

    /// Current session, recomputed from storage.
    pub fn session(&self) -> Session {
        let is_loading = !self.is_hydrated() || self.in_flight.load(Ordering::SeqCst) > 0;
        if !self.is_hydrated() || self.is_expired() {
            return Session { user: None, is_authenticated: false, is_loading };
        }
        let mut vals = self.backend.read(&[TOKEN_KEY, USER_KEY]).into_iter();
        let token = vals.next().flatten().filter(|t| !t.is_empty());
        let user = vals.next().flatten().and_then(|raw| match serde_json::from_str::<UserSnapshot>(&raw) {
            Ok(u) => Some(u),
            Err(e) => {
                debug!(target: "careway::session", "ignoring unreadable user snapshot: {}", e);
                None
            }
        });
        let is_authenticated = token.is_some() && user.is_some();
        Session { user: if is_authenticated { user } else { None }, is_authenticated, is_loading }
    }

    pub fn access_token(&self) -> Option<String> {
        if self.is_expired() {
            return None;
        }
        self.backend.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        if self.is_expired() {
            return None;
        }
        self.backend.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn epoch(&self) -> u64 { self.epoch.load(Ordering::SeqCst) }

    /// Epoch and access token read together, so a 401 for this token is attributed to the
    /// record that issued it.
    pub fn bearer(&self) -> (u64, Option<String>) {
        let _w = self.write_lock.lock();
        (self.epoch(), self.access_token())
    }

    fn is_expired(&self) -> bool { self.expired.load(Ordering::SeqCst) }

    pub fn subscribe(&self) -> watch::Receiver<Session> { self.tx.subscribe() }

    /// Write all three credential keys as one batch, then publish.
    pub fn establish(&self, record: &CredentialRecord) -> Result<Session, StorageError> {
        let user_json = serde_json::to_string(&record.user)?;
        let epoch = {
            let _w = self.write_lock.lock();
            self.backend.apply(&[
                Mutation::set(TOKEN_KEY, record.access_token.clone()),
                Mutation::set(REFRESH_TOKEN_KEY, record.refresh_token.clone()),
                Mutation::set(USER_KEY, user_json),
            ])?;
            self.expired.store(false, Ordering::SeqCst);
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.hydrated.store(true, Ordering::SeqCst);
        info!(target: "careway::session", "session established user_id={}", record.user.id);
        tprintln!("session.establish user={} epoch={}", record.user.email, epoch);
        Ok(self.publish())
    }

    /// Clear all three credential keys, then publish. Idempotent.
    pub fn invalidate(&self) -> Result<(), StorageError> {
        {
            let _w = self.write_lock.lock();
            self.clear_record()?;
            self.expired.store(false, Ordering::SeqCst);
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.publish();
        info!(target: "careway::session", "session invalidated");
        Ok(())
    }

    /// Clear for an UNAUTHORIZED response seen by a request that carried the credentials
    /// of `observed_epoch`. Only the first caller per epoch wins and gets `true`; the rest
    /// (including requests that raced an explicit logout or a new login) get `false`.
    ///
    /// If storage cannot be cleared the leftover record is treated as expired until the next
    /// successful [`establish`](Self::establish) or [`invalidate`](Self::invalidate).
    pub fn force_logout(&self, observed_epoch: u64) -> bool {
        {
            let _w = self.write_lock.lock();
            if self.epoch() != observed_epoch {
                debug!(target: "careway::session", "forced logout already handled for epoch {}", observed_epoch);
                return false;
            }
            if let Err(e) = self.clear_record() {
                error!(target: "careway::session", "failed to clear credentials on forced logout: {}", e);
                self.expired.store(true, Ordering::SeqCst);
            }
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.publish();
        info!(target: "careway::session", "session expired; credentials cleared");
        true
    }

    /// Mark a login/registration/logout workflow as in flight until the guard drops.
    pub fn begin_workflow(&self) -> WorkflowGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.publish();
        WorkflowGuard { store: self }
    }

    fn clear_record(&self) -> Result<(), StorageError> {
        let batch: Vec<Mutation> = CREDENTIAL_KEYS.iter().map(|k| Mutation::remove(k)).collect();
        self.backend.apply(&batch)
    }

    fn publish(&self) -> Session {
        let s = self.session();
        self.tx.send_replace(s.clone());
        s
    }
}

pub struct WorkflowGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for WorkflowGuard<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.store.publish();
    }
}
