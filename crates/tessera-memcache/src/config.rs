//! Memcached connection configuration.

use std::time::Duration;

/// Default memcached address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:11211";

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time allowed for a single command round-trip.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of idle connections kept for reuse.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Configuration for [`MemcacheBackend`](crate::MemcacheBackend).
#[derive(Debug, Clone)]
pub struct MemcacheConfig {
    /// `host:port` of the memcached server.
    pub address: String,

    /// Timeout for establishing a TCP connection.
    pub connect_timeout: Duration,

    /// Timeout for one command, including any connect it needs.
    /// Expiry surfaces as [`BackendError::Timeout`](tessera_session::BackendError::Timeout).
    pub operation_timeout: Duration,

    /// Maximum idle connections kept open between calls.
    pub pool_size: usize,
}

impl Default for MemcacheConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl MemcacheConfig {
    /// Create a config pointing at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-command timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the idle pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}
