//! [`CacheBackend`] implementation over memcached.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tessera_session::{BackendError, BackendResult, CacheBackend};
use tracing::{debug, trace, warn};

use crate::config::MemcacheConfig;
use crate::connection::{Connection, validate_key};

/// Relative expiry times above this many seconds are read by memcached as
/// absolute unix timestamps.
const MAX_RELATIVE_EXPTIME: u64 = 60 * 60 * 24 * 30;

/// Largest exptime memcached parses; it reads the field as a signed 32-bit
/// integer.
const MAX_EXPTIME: u64 = i32::MAX as u64;

/// Memcached-backed session storage.
///
/// Keeps a small pool of idle connections. A connection that failed mid
/// command, or whose command the server refused as malformed
/// (`CLIENT_ERROR`), is dropped rather than returned to the pool. Cloning is cheap and
/// clones share the pool.
#[derive(Clone)]
pub struct MemcacheBackend {
    config: MemcacheConfig,
    idle: Arc<Mutex<Vec<Connection>>>,
}

impl MemcacheBackend {
    /// Create a backend. No connection is opened until the first call.
    pub fn new(config: MemcacheConfig) -> Self {
        Self {
            config,
            idle: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a backend and verify the server answers.
    pub async fn connect(config: MemcacheConfig) -> BackendResult<Self> {
        let backend = Self::new(config);
        let version = backend.version().await?;
        debug!(address = %backend.config.address, version = %version, "Connected to memcached");
        Ok(backend)
    }

    pub fn config(&self) -> &MemcacheConfig {
        &self.config
    }

    /// Server version string; doubles as a health check.
    pub async fn version(&self) -> BackendResult<String> {
        self.run(|mut conn| async move {
            let result = conn.version().await;
            (conn, result)
        })
        .await
    }

    /// Number of idle pooled connections.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    /// Run one command on a pooled connection under the operation timeout.
    ///
    /// The pool lock is only held to pop or push a connection, never across
    /// the network round-trip.
    async fn run<T, F, Fut>(&self, op: F) -> BackendResult<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = (Connection, BackendResult<T>)>,
    {
        let timeout = self.config.operation_timeout;
        let attempt = async {
            let pooled = self.idle.lock().pop();
            let conn = match pooled {
                Some(conn) => conn,
                None => {
                    Connection::connect(&self.config.address, self.config.connect_timeout).await?
                }
            };

            let (conn, result) = op(conn).await;
            let clean = matches!(result, Ok(_) | Err(BackendError::Rejected(_)));
            if clean && conn.is_reusable() {
                self.release(conn);
            } else {
                trace!(error = ?result.as_ref().err(), "Dropping memcached connection");
            }
            result
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    address = %self.config.address,
                    timeout_ms = timeout.as_millis() as u64,
                    "Memcached call timed out"
                );
                Err(BackendError::Timeout(timeout))
            }
        }
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.config.pool_size {
            idle.push(conn);
        }
    }
}

#[async_trait]
impl CacheBackend for MemcacheBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let key = key.to_string();
        self.run(|mut conn| async move {
            let result = conn.get(&key).await;
            (conn, result)
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        validate_key(key)?;
        let key = key.to_string();
        let value = value.to_vec();
        let exptime = exptime(ttl);
        self.run(|mut conn| async move {
            let result = conn.set(&key, &value, exptime).await;
            (conn, result)
        })
        .await
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        validate_key(key)?;
        let key = key.to_string();
        self.run(|mut conn| async move {
            let result = conn.delete(&key).await;
            (conn, result)
        })
        .await
    }

    async fn list_keys(&self) -> BackendResult<Vec<String>> {
        let dumped = self
            .run(|mut conn| async move {
                let result = conn.metadump().await;
                (conn, result)
            })
            .await?;

        Ok(dumped.unwrap_or_else(|| {
            debug!("Memcached cannot enumerate keys; returning none");
            Vec::new()
        }))
    }
}

/// Memcached expiry field for a TTL.
///
/// Zero would mean "never expire", so sub-second TTLs round up to one
/// second. TTLs beyond 30 days must be sent as absolute timestamps, capped
/// at [`MAX_EXPTIME`].
fn exptime(ttl: Duration) -> u64 {
    let secs = ttl.as_secs().max(1);
    if secs <= MAX_RELATIVE_EXPTIME {
        return secs;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    now.saturating_add(secs).min(MAX_EXPTIME)
}
