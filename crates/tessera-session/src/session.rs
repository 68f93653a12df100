//! In-memory session bag.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::id::SessionId;

/// The JSON object stored for each session.
pub type SessionData = Map<String, Value>;

/// One visitor's session: identity plus an open key-value bag.
///
/// A `Session` is owned by a single request. Two requests for the same id
/// each hold their own copy.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    data: SessionData,
    dirty: bool,
}

impl Session {
    /// A fresh, empty session.
    pub fn new(id: SessionId) -> Self {
        Self::with_data(id, SessionData::new())
    }

    /// A session loaded with existing data.
    pub fn with_data(id: SessionId, data: SessionData) -> Self {
        Self {
            id,
            data,
            dirty: false,
        }
    }

    /// Decode a session from its stored representation.
    pub fn decode(id: SessionId, bytes: &[u8]) -> Result<Self> {
        let data: SessionData = serde_json::from_slice(bytes)?;
        Ok(Self::with_data(id, data))
    }

    /// Encode the bag for storage.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.data)?)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    /// Whether the bag changed since it was loaded or created.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_id(&mut self, id: SessionId) {
        self.id = id;
    }

    /// Raw value for `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Typed value for `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`. The bag is untouched if serialization fails.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        self.dirty = true;
        Ok(())
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.data.clear();
        self.dirty = true;
    }
}
