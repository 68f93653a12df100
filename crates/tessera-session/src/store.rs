//! Session store and the per-request session state machine.
//!
//! A [`SessionStore`] is shared by every request. For each request it hands
//! out a [`RequestSession`], which owns that request's view of the session
//! and moves through these states:
//!
//! ```text
//! NoSession ──resolve──▶ Resolved(candidate)
//!     │                      │
//!     └──read/write──────────┴──read/write──▶ Materialized(session)
//!                                                 │
//!                         destroy / change_id / churn / untouched
//! ```
//!
//! Nothing touches the backend until the session is materialized by a read
//! or a write, and nothing is written to the backend until
//! [`RequestSession::finalize`].
//!
//! # Consistency
//!
//! There is no locking. Two concurrent requests carrying the same id each
//! load their own copy, and whichever finalizes last overwrites the other's
//! write. The backend `set` is the only serialization point.

use std::sync::Arc;

use chrono::Utc;
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::backend::CacheBackend;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::id::{IdGenerator, RandomIdGenerator, SessionId};
use crate::session::{Session, SessionData};
use crate::transport::{CookieDirective, CookieExpiry, CookieTransport};

/// Shared state behind a [`SessionStore`].
struct StoreInner {
    config: SessionConfig,
    backend: Arc<dyn CacheBackend>,
    ids: Arc<dyn IdGenerator>,
    transport: CookieTransport,
}

/// Orchestrates session ids, backend I/O and cookie directives.
///
/// Cloning is cheap; clones share configuration and backend.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    /// Create a store over `backend` using random ids.
    pub fn new(config: SessionConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_id_generator(config, backend, Arc::new(RandomIdGenerator))
    }

    /// Create a store with a custom id generator.
    pub fn with_id_generator(
        config: SessionConfig,
        backend: Arc<dyn CacheBackend>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let transport = CookieTransport::new(config.cookie.clone());
        Self {
            inner: Arc::new(StoreInner {
                config,
                backend,
                ids,
                transport,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &CookieTransport {
        &self.inner.transport
    }

    /// Begin a request whose cookie carried `cookie_id`, if any.
    ///
    /// No backend call is made here.
    pub fn resolve(&self, cookie_id: Option<SessionId>) -> RequestSession {
        let state = match cookie_id {
            Some(candidate) => {
                trace!(session_id = %candidate, "Resolved session cookie");
                SessionState::Resolved { candidate }
            }
            None => SessionState::NoSession,
        };

        RequestSession {
            store: self.clone(),
            presented_cookie: matches!(state, SessionState::Resolved { .. }),
            state,
            destroyed: false,
            used_ids: Vec::new(),
        }
    }

    /// Begin a request from its headers.
    pub fn resolve_headers(&self, headers: &HeaderMap) -> RequestSession {
        self.resolve(self.inner.transport.extract(headers))
    }

    /// Ids of every stored session, for administrative use.
    ///
    /// Never fails: if the backend cannot enumerate, the list is empty.
    pub async fn list_sessions(&self) -> Vec<SessionId> {
        match self.inner.backend.list_keys().await {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| self.inner.config.id_from_key(key))
                .filter_map(SessionId::parse)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to enumerate sessions");
                Vec::new()
            }
        }
    }

    /// Load the stored bag for `id` without creating request state.
    pub async fn load(&self, id: &SessionId) -> Result<Option<SessionData>> {
        let key = self.inner.config.backend_key(id.as_str());
        match self.inner.backend.get(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete the stored session for `id`.
    pub async fn remove(&self, id: &SessionId) -> Result<()> {
        let key = self.inner.config.backend_key(id.as_str());
        self.inner.backend.delete(&key).await?;
        debug!(session_id = %id, "Session removed");
        Ok(())
    }

    async fn fetch(&self, id: &SessionId) -> Result<Option<Session>> {
        let key = self.inner.config.backend_key(id.as_str());
        let Some(bytes) = self.inner.backend.get(&key).await? else {
            return Ok(None);
        };

        match Session::decode(id.clone(), &bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(session_id = %id, error = %e, "Discarding undecodable session entry");
                Ok(None)
            }
        }
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        let key = self.inner.config.backend_key(session.id().as_str());
        let bytes = session.encode()?;
        self.inner
            .backend
            .set(&key, &bytes, self.inner.config.ttl)
            .await?;
        debug!(
            session_id = %session.id(),
            bytes = bytes.len(),
            ttl_secs = self.inner.config.ttl.as_secs(),
            "Session written through"
        );
        Ok(())
    }

    async fn delete_entry(&self, id: &SessionId) -> Result<()> {
        let key = self.inner.config.backend_key(id.as_str());
        self.inner.backend.delete(&key).await?;
        Ok(())
    }

    fn cookie_expiry(&self) -> CookieExpiry {
        match self.inner.config.cookie.max_age {
            Some(max_age) => chrono::Duration::from_std(max_age)
                .ok()
                .and_then(|max_age| Utc::now().checked_add_signed(max_age))
                .map_or(CookieExpiry::Session, CookieExpiry::At),
            None => CookieExpiry::Session,
        }
    }
}

/// Where a request's session currently stands.
#[derive(Debug)]
enum SessionState {
    /// No cookie and nothing materialized yet.
    NoSession,
    /// A cookie named a candidate id; not yet fetched.
    Resolved { candidate: SessionId },
    /// A live in-memory session.
    Materialized(Session),
}

/// One request's view of its session.
///
/// Dropping this without calling [`finalize`](Self::finalize) discards every
/// change: nothing is written and no cookie is issued.
pub struct RequestSession {
    store: SessionStore,
    state: SessionState,
    /// The request carried a session cookie.
    presented_cookie: bool,
    /// A session was destroyed during this request.
    destroyed: bool,
    /// Every id this request has held, so none is handed out twice.
    used_ids: Vec<SessionId>,
}

impl RequestSession {
    /// Current session id, if one has been materialized.
    pub fn id(&self) -> Option<&SessionId> {
        match &self.state {
            SessionState::Materialized(session) => Some(session.id()),
            _ => None,
        }
    }

    /// Whether a session has been materialized in this request.
    pub fn is_materialized(&self) -> bool {
        matches!(self.state, SessionState::Materialized(_))
    }

    /// Whether a session was destroyed during this request.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Raw value stored under `key`, or `None` if unset.
    pub async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        let session = self.materialize().await?;
        Ok(session.value(key).cloned())
    }

    /// Typed value stored under `key`.
    pub async fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let session = self.materialize().await?;
        session.get(key)
    }

    /// Store `value` under `key`. Persisted at [`finalize`](Self::finalize).
    pub async fn write<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let session = self.materialize().await?;
        session.insert(key, value)
    }

    /// Remove `key`, returning its previous value.
    pub async fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        let session = self.materialize().await?;
        Ok(session.remove(key))
    }

    /// Remove every key from the bag.
    pub async fn clear(&mut self) -> Result<()> {
        let session = self.materialize().await?;
        session.clear();
        Ok(())
    }

    /// Snapshot of the whole bag.
    pub async fn dump(&mut self) -> Result<SessionData> {
        let session = self.materialize().await?;
        Ok(session.data().clone())
    }

    /// Destroy the current session.
    ///
    /// Deletes the backend entry immediately. A no-op if the request never
    /// had a session.
    pub async fn destroy(&mut self) -> Result<()> {
        let id = match &self.state {
            SessionState::NoSession => {
                trace!("Destroy without session is a no-op");
                return Ok(());
            }
            SessionState::Resolved { candidate } => candidate.clone(),
            SessionState::Materialized(session) => session.id().clone(),
        };

        self.store.delete_entry(&id).await?;
        self.retire(&id);
        self.state = SessionState::NoSession;
        self.destroyed = true;

        debug!(session_id = %id, "Session destroyed");
        Ok(())
    }

    /// Give the current session a new id, keeping its data.
    ///
    /// The old entry is deleted before this returns. Fails with
    /// [`Error::RotateWithoutSession`] if the request has no session.
    pub async fn change_id(&mut self) -> Result<SessionId> {
        if matches!(self.state, SessionState::NoSession) {
            return Err(Error::RotateWithoutSession);
        }
        if matches!(self.state, SessionState::Resolved { .. }) {
            self.materialize().await?;
            if !self.loaded_existing() {
                return Err(Error::RotateWithoutSession);
            }
        }

        let new_id = self.fresh_id();
        let SessionState::Materialized(session) = &mut self.state else {
            return Err(Error::RotateWithoutSession);
        };

        let old_id = session.id().clone();
        self.store.delete_entry(&old_id).await?;

        session.set_id(new_id.clone());
        session.mark_dirty();
        self.used_ids.push(new_id.clone());

        debug!(old_session_id = %old_id, session_id = %new_id, "Session id rotated");
        Ok(new_id)
    }

    /// Destroy the current session and start a new, empty one.
    ///
    /// The new id differs from every id used earlier in this request.
    pub async fn churn(&mut self) -> Result<SessionId> {
        self.destroy().await?;

        let id = self.fresh_id();
        let mut session = Session::new(id.clone());
        session.mark_dirty();
        self.used_ids.push(id.clone());
        self.state = SessionState::Materialized(session);

        debug!(session_id = %id, "Session churned");
        Ok(id)
    }

    /// Finish the request.
    ///
    /// Writes a changed session through to the backend and returns the
    /// cookie directive to send, if any. If the backend write fails, the
    /// error is returned and no directive is produced.
    pub async fn finalize(self) -> Result<Option<CookieDirective>> {
        let cookie_name = self.store.config().cookie.name.clone();

        if let SessionState::Materialized(ref session) = self.state
            && session.is_dirty()
        {
            self.store.persist(session).await?;
            return Ok(Some(CookieDirective::set(
                cookie_name,
                session.id(),
                self.store.cookie_expiry(),
            )));
        }

        if self.destroyed && self.presented_cookie {
            trace!("Expiring session cookie");
            return Ok(Some(CookieDirective::expire(cookie_name)));
        }

        Ok(None)
    }

    /// Finish the request and apply the resulting directive to `headers`.
    ///
    /// Returns whether a `Set-Cookie` header was added.
    pub async fn finalize_into(self, headers: &mut HeaderMap) -> Result<bool> {
        let store = self.store.clone();
        match self.finalize().await? {
            Some(directive) => {
                store.transport().apply(headers, &directive)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ensure a live session exists and return it.
    async fn materialize(&mut self) -> Result<&mut Session> {
        let next = match &self.state {
            SessionState::Materialized(_) => None,
            SessionState::NoSession => {
                let id = self.fresh_id();
                trace!(session_id = %id, "Allocated new session");
                Some(Session::new(id))
            }
            SessionState::Resolved { candidate } => {
                let candidate = candidate.clone();
                match self.store.fetch(&candidate).await? {
                    Some(session) => {
                        trace!(session_id = %candidate, "Session loaded");
                        Some(session)
                    }
                    None => {
                        self.retire(&candidate);
                        let id = self.fresh_id();
                        debug!(
                            stale_session_id = %candidate,
                            session_id = %id,
                            "Unknown or expired session id, starting fresh"
                        );
                        Some(Session::new(id))
                    }
                }
            }
        };

        if let Some(session) = next {
            self.used_ids.push(session.id().clone());
            self.state = SessionState::Materialized(session);
        }

        match &mut self.state {
            SessionState::Materialized(session) => Ok(session),
            _ => unreachable!("session state was just materialized"),
        }
    }

    /// Whether the materialized session came from the backend under the
    /// cookie's id rather than being freshly allocated.
    fn loaded_existing(&self) -> bool {
        match &self.state {
            SessionState::Materialized(session) => {
                self.presented_cookie && self.used_ids.first() == Some(session.id())
            }
            _ => false,
        }
    }

    /// Generate an id not yet used by this request.
    fn fresh_id(&self) -> SessionId {
        loop {
            let id = self.store.inner.ids.generate();
            if !self.used_ids.contains(&id) {
                return id;
            }
            warn!(session_id = %id, "Id generator repeated an id, regenerating");
        }
    }

    fn retire(&mut self, id: &SessionId) {
        if !self.used_ids.contains(id) {
            self.used_ids.push(id.clone());
        }
    }
}
