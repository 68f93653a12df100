//! Configuration for the session engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default lifetime of a stored session (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default prefix prepended to every backend key.
pub const DEFAULT_KEY_PREFIX: &str = "tessera:";

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "tessera_sid";

/// Default cookie path.
pub const DEFAULT_COOKIE_PATH: &str = "/";

/// `SameSite` attribute for the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

/// Attribute policy for the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Cookie name carrying the session id.
    pub name: String,

    /// `Path` attribute.
    pub path: String,

    /// `Domain` attribute. `None` scopes the cookie to the issuing host.
    pub domain: Option<String>,

    /// Emit the `Secure` attribute.
    pub secure: bool,

    /// Emit the `HttpOnly` attribute.
    pub http_only: bool,

    /// `SameSite` attribute.
    pub same_site: SameSite,

    /// Lifetime of the cookie in the browser.
    /// `None` issues a browser-session cookie with no expiry attribute.
    pub max_age: Option<Duration>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::default(),
            max_age: None,
        }
    }
}

impl CookieConfig {
    /// Create a cookie policy with default attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the cookie path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the cookie domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Enable or disable the `Secure` attribute.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Enable or disable the `HttpOnly` attribute.
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` attribute.
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Issue persistent cookies that live for `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// Configuration for a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Expiry applied to every backend write.
    pub ttl: Duration,

    /// Prefix prepended to session ids to form backend keys.
    pub key_prefix: String,

    /// Session cookie policy.
    pub cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            cookie: CookieConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend TTL for stored sessions.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the backend key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Replace the cookie policy.
    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    /// Backend key for a session id.
    pub fn backend_key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    /// Recover a session id from a backend key, if it carries our prefix.
    pub fn id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.key_prefix.as_str())
    }
}
