//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [session]
//! ttl_secs = 3600
//! key_prefix = "tessera:"
//!
//! [session.cookie]
//! name = "tessera_sid"
//! same_site = "lax"
//!
//! [backend]
//! kind = "memcache"        # "memory" or "memcache"
//! address = "127.0.0.1:11211"
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/tessera"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_memcache::MemcacheConfig;
use tessera_session::{CookieConfig, SameSite, SessionConfig};

use crate::{ConfigError, Result};

/// Upper bound for `session.ttl_secs` and `session.cookie.max_age_secs`
/// (ten years).
pub const MAX_LIFETIME_SECS: u64 = 60 * 60 * 24 * 365 * 10;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// override of just `[backend]`) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Session engine settings.
    pub session: Option<SessionSection>,

    /// Cache backend selection.
    pub backend: Option<BackendSection>,

    /// Log output for the CLI.
    pub logging: Option<LoggingSection>,
}

impl TesseraConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace whole; fields are not merged individually.
    pub fn merge(&mut self, other: TesseraConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.backend.is_some() {
            self.backend = other.backend;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref session) = self.session {
            if session.ttl_secs == 0 {
                return Err(ConfigError::invalid("session.ttl_secs", "must be at least 1"));
            }
            if session.ttl_secs > MAX_LIFETIME_SECS {
                return Err(ConfigError::invalid(
                    "session.ttl_secs",
                    format!("must be at most {}", MAX_LIFETIME_SECS),
                ));
            }
            if session.key_prefix.is_empty() {
                return Err(ConfigError::invalid("session.key_prefix", "must not be empty"));
            }
            if session.cookie.name.is_empty() {
                return Err(ConfigError::invalid("session.cookie.name", "must not be empty"));
            }
            if session.cookie.max_age_secs.is_some_and(|secs| secs > MAX_LIFETIME_SECS) {
                return Err(ConfigError::invalid(
                    "session.cookie.max_age_secs",
                    format!("must be at most {}", MAX_LIFETIME_SECS),
                ));
            }
            if session.cookie.same_site == SameSite::None && !session.cookie.secure {
                return Err(ConfigError::invalid(
                    "session.cookie.same_site",
                    "\"none\" requires secure = true",
                ));
            }
        }

        if let Some(ref backend) = self.backend {
            if backend.pool_size == 0 {
                return Err(ConfigError::invalid("backend.pool_size", "must be at least 1"));
            }
            if backend.max_entries == 0 {
                return Err(ConfigError::invalid("backend.max_entries", "must be at least 1"));
            }
            if backend.kind == BackendKind::Memcache && backend.address.is_empty() {
                return Err(ConfigError::invalid("backend.address", "required for memcache"));
            }
        }

        Ok(())
    }

    /// Session engine configuration, with defaults for missing sections.
    pub fn session_config(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default().into()
    }

    /// Backend section, or the default in-process backend.
    pub fn backend(&self) -> BackendSection {
        self.backend.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Backend expiry for stored sessions, in seconds.
    pub ttl_secs: u64,
    /// Prefix for backend keys.
    pub key_prefix: String,
    /// Cookie attributes.
    pub cookie: CookieSection,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: tessera_session::DEFAULT_TTL.as_secs(),
            key_prefix: tessera_session::DEFAULT_KEY_PREFIX.to_string(),
            cookie: CookieSection::default(),
        }
    }
}

impl From<SessionSection> for SessionConfig {
    fn from(section: SessionSection) -> Self {
        SessionConfig::new()
            .with_ttl(Duration::from_secs(section.ttl_secs))
            .with_key_prefix(section.key_prefix)
            .with_cookie(section.cookie.into())
    }
}

/// `[session.cookie]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSection {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// Persistent cookie lifetime in seconds. Unset issues a browser-session
    /// cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
}

impl Default for CookieSection {
    fn default() -> Self {
        let defaults = CookieConfig::default();
        Self {
            name: defaults.name,
            path: defaults.path,
            domain: defaults.domain,
            secure: defaults.secure,
            http_only: defaults.http_only,
            same_site: defaults.same_site,
            max_age_secs: None,
        }
    }
}

impl From<CookieSection> for CookieConfig {
    fn from(section: CookieSection) -> Self {
        let mut cookie = CookieConfig::new()
            .with_name(section.name)
            .with_path(section.path)
            .with_secure(section.secure)
            .with_http_only(section.http_only)
            .with_same_site(section.same_site);
        if let Some(domain) = section.domain {
            cookie = cookie.with_domain(domain);
        }
        if let Some(secs) = section.max_age_secs {
            cookie = cookie.with_max_age(Duration::from_secs(secs));
        }
        cookie
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which cache backend holds session entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process LRU cache. Sessions are lost on restart.
    #[default]
    Memory,
    /// Memcached over TCP.
    Memcache,
}

/// `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub kind: BackendKind,
    /// Memcached `host:port`.
    pub address: String,
    pub connect_timeout_ms: u64,
    pub operation_timeout_ms: u64,
    /// Idle memcached connections kept for reuse.
    pub pool_size: usize,
    /// Capacity of the in-process backend.
    pub max_entries: usize,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            address: tessera_memcache::DEFAULT_ADDRESS.to_string(),
            connect_timeout_ms: tessera_memcache::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            operation_timeout_ms: tessera_memcache::DEFAULT_OPERATION_TIMEOUT.as_millis() as u64,
            pool_size: tessera_memcache::DEFAULT_POOL_SIZE,
            max_entries: tessera_session::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl BackendSection {
    /// Memcached client settings from this section.
    pub fn memcache_config(&self) -> MemcacheConfig {
        MemcacheConfig::new(self.address.clone())
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_operation_timeout(Duration::from_millis(self.operation_timeout_ms))
            .with_pool_size(self.pool_size)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rolling JSON log files. Unset disables file logging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
