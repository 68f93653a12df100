//! Session identifiers and their generation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shortest identifier accepted from a client cookie.
const MIN_ID_LEN: usize = 16;

/// Longest identifier accepted from a client cookie.
const MAX_ID_LEN: usize = 128;

/// The identifier for a session.
///
/// From an API perspective a session id is an opaque string. Do not depend
/// on the specifics of the underlying representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random identifier from operating system entropy.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse an identifier received from a client.
    ///
    /// Returns `None` for values that could not have been issued by a
    /// generator: wrong length or characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid_len = (MIN_ID_LEN..=MAX_ID_LEN).contains(&raw.len());
        let valid_chars = raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        (valid_len && valid_chars).then(|| Self(raw.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the identifier, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh session identifiers.
///
/// Implementations must not derive ids from earlier ones: no counters, no
/// hashes of previous ids. Entropy exhaustion is unrecoverable and may panic.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier.
    fn generate(&self) -> SessionId;
}

/// Default generator backed by random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> SessionId {
        SessionId::random()
    }
}
