//! Memcached cache backend for Tessera sessions.
//!
//! Speaks the memcached text protocol over TCP:
//! - `get` / `set` / `delete` for session entries
//! - `version` as a health check
//! - `lru_crawler metadump all` for best-effort key listing
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_memcache::{MemcacheBackend, MemcacheConfig};
//! use tessera_session::{SessionConfig, SessionStore};
//!
//! let backend = MemcacheBackend::connect(MemcacheConfig::new("127.0.0.1:11211")).await?;
//! let store = SessionStore::new(SessionConfig::default(), Arc::new(backend));
//! ```

mod backend;
mod config;
mod connection;

pub use backend::MemcacheBackend;
pub use config::{
    DEFAULT_ADDRESS, DEFAULT_CONNECT_TIMEOUT, DEFAULT_OPERATION_TIMEOUT, DEFAULT_POOL_SIZE,
    MemcacheConfig,
};
pub use connection::{MAX_KEY_LEN, validate_key};
