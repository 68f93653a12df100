//! The cache backend contract.
//!
//! This module defines the trait that decouples the session engine from a
//! specific key-value service. The store only ever needs whole-value reads,
//! whole-value writes with an expiry, and deletes; anything that can do those
//! three things can hold sessions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendResult;

/// Trait for key-value cache backends with per-key expiry.
///
/// Every method may suspend on network I/O. Implementations are expected to
/// bound their own calls with a timeout and report it as
/// [`BackendError::Timeout`](crate::BackendError::Timeout); retries, if any,
/// also belong here and not in the session engine.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist or has expired. Failure
    /// to reach the backend must be an `Err`, never `Ok(None)`.
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// The write is all-or-nothing; the entry expires after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()>;

    /// Remove `key`. Deleting a key that does not exist is not an error.
    async fn delete(&self, key: &str) -> BackendResult<()>;

    /// Enumerate stored keys, best effort.
    ///
    /// Backends that cannot enumerate return an empty list.
    async fn list_keys(&self) -> BackendResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl<B: CacheBackend + ?Sized> CacheBackend for Arc<B> {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        (**self).delete(key).await
    }

    async fn list_keys(&self) -> BackendResult<Vec<String>> {
        (**self).list_keys().await
    }
}
