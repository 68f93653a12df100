//! Translation between session ids and HTTP cookie headers.

use chrono::{DateTime, Utc};
use cookie::Cookie;
use http::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use time::OffsetDateTime;
use tracing::trace;

use crate::config::{CookieConfig, SameSite};
use crate::error::{Error, Result};
use crate::id::SessionId;

/// When the browser should drop the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieExpiry {
    /// No expiry attribute: dropped when the browser session ends.
    Session,
    /// Persistent until the given instant.
    At(DateTime<Utc>),
    /// Already expired: the browser removes the cookie now.
    Expired,
}

/// What, if anything, to emit as `Set-Cookie` on a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    pub name: String,
    pub value: String,
    pub expiry: CookieExpiry,
}

impl CookieDirective {
    /// Directive that (re)issues the cookie for `id`.
    pub fn set(name: impl Into<String>, id: &SessionId, expiry: CookieExpiry) -> Self {
        Self {
            name: name.into(),
            value: id.to_string(),
            expiry,
        }
    }

    /// Directive that instructs the browser to delete the cookie.
    pub fn expire(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: String::new(),
            expiry: CookieExpiry::Expired,
        }
    }

    /// Whether this directive removes the cookie.
    pub fn is_removal(&self) -> bool {
        self.expiry == CookieExpiry::Expired
    }
}

/// Reads the session cookie from requests and writes it to responses.
#[derive(Debug, Clone)]
pub struct CookieTransport {
    config: CookieConfig,
}

impl CookieTransport {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CookieConfig {
        &self.config
    }

    /// Extract the session id from a request's `Cookie` headers.
    ///
    /// Malformed cookie pairs and values that are not well-formed ids are
    /// skipped; the first valid match wins.
    pub fn extract(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse(value))
            .filter_map(|parsed| parsed.ok())
            .filter(|c| c.name() == self.config.name)
            .find_map(|c| {
                let id = SessionId::parse(c.value());
                if id.is_none() {
                    trace!(cookie = %self.config.name, "Ignoring malformed session cookie value");
                }
                id
            })
    }

    /// Render a directive as a `Set-Cookie` header value.
    pub fn render(&self, directive: &CookieDirective) -> String {
        let mut builder = Cookie::build((directive.name.clone(), directive.value.clone()))
            .path(self.config.path.clone())
            .secure(self.config.secure)
            .http_only(self.config.http_only)
            .same_site(same_site(self.config.same_site));

        if let Some(ref domain) = self.config.domain {
            builder = builder.domain(domain.clone());
        }

        match directive.expiry {
            CookieExpiry::Session => {}
            CookieExpiry::At(at) => {
                let remaining = (at - Utc::now()).num_seconds().max(0);
                builder = builder.max_age(time::Duration::seconds(remaining));
                if let Ok(expires) = OffsetDateTime::from_unix_timestamp(at.timestamp()) {
                    builder = builder.expires(expires);
                }
            }
            CookieExpiry::Expired => {
                builder = builder
                    .max_age(time::Duration::ZERO)
                    .expires(OffsetDateTime::UNIX_EPOCH);
            }
        }

        builder.build().to_string()
    }

    /// Append the directive to a response's headers.
    pub fn apply(&self, headers: &mut HeaderMap, directive: &CookieDirective) -> Result<()> {
        let rendered = self.render(directive);
        let value = HeaderValue::from_str(&rendered).map_err(|_| {
            Error::InvalidCookie(format!("cannot encode Set-Cookie for '{}'", directive.name))
        })?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }
}

fn same_site(policy: SameSite) -> cookie::SameSite {
    match policy {
        SameSite::Strict => cookie::SameSite::Strict,
        SameSite::Lax => cookie::SameSite::Lax,
        SameSite::None => cookie::SameSite::None,
    }
}
