//! Cookie-identified, cache-backed sessions.
//!
//! This crate provides the session lifecycle for HTTP services:
//! - Lazy materialization: a request that never touches its session causes
//!   no backend traffic and no cookie
//! - Write-through at response time, never per mutation
//! - Destroy, id rotation and churn (destroy + fresh session)
//! - A pluggable [`CacheBackend`] with an in-memory implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_session::{MemoryBackend, SessionConfig, SessionStore};
//!
//! let store = SessionStore::new(SessionConfig::default(), Arc::new(MemoryBackend::new()));
//!
//! let mut session = store.resolve_headers(request.headers());
//! session.write("name", "larry").await?;
//! session.finalize_into(response.headers_mut()).await?;
//! ```

mod backend;
mod config;
mod error;
mod expiry;
mod id;
mod memory;
mod session;
mod store;
mod transport;

pub use backend::CacheBackend;
pub use config::{
    CookieConfig, DEFAULT_COOKIE_NAME, DEFAULT_KEY_PREFIX, DEFAULT_TTL, SameSite, SessionConfig,
};
pub use error::{BackendError, BackendResult, Error, Result};
pub use id::{IdGenerator, RandomIdGenerator, SessionId};
pub use memory::{DEFAULT_MAX_ENTRIES, MemoryBackend, MemoryStats};
pub use session::{Session, SessionData};
pub use store::{RequestSession, SessionStore};
pub use transport::{CookieDirective, CookieExpiry, CookieTransport};
