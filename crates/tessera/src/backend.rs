//! Backend selection from the `[backend]` config section.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tessera_config::{BackendKind, BackendSection};
use tessera_memcache::MemcacheBackend;
use tessera_session::{CacheBackend, MemoryBackend};
use tracing::debug;

/// The backend a command talks to.
#[derive(Clone)]
pub enum OpenedBackend {
    /// Process-local; starts empty on every invocation.
    Memory(MemoryBackend),
    Memcache(MemcacheBackend),
}

impl OpenedBackend {
    /// Build the backend named by `section`. Memcached is contacted once
    /// up front so an unreachable server fails fast with its address.
    pub async fn open(section: &BackendSection) -> Result<Self> {
        match section.kind {
            BackendKind::Memory => {
                debug!(max_entries = section.max_entries, "Using in-process backend");
                Ok(Self::Memory(MemoryBackend::with_max_entries(section.max_entries)))
            }
            BackendKind::Memcache => {
                let backend = MemcacheBackend::connect(section.memcache_config())
                    .await
                    .with_context(|| format!("connecting to memcached at {}", section.address))?;
                Ok(Self::Memcache(backend))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Memory(_) => BackendKind::Memory,
            Self::Memcache(_) => BackendKind::Memcache,
        }
    }

    /// Where the backend lives, for display.
    pub fn location(&self) -> String {
        match self {
            Self::Memory(_) => "in-process".to_string(),
            Self::Memcache(backend) => backend.config().address.clone(),
        }
    }

    pub fn as_cache(&self) -> &dyn CacheBackend {
        match self {
            Self::Memory(backend) => backend,
            Self::Memcache(backend) => backend,
        }
    }

    pub fn into_shared(self) -> Arc<dyn CacheBackend> {
        match self {
            Self::Memory(backend) => Arc::new(backend),
            Self::Memcache(backend) => Arc::new(backend),
        }
    }
}
