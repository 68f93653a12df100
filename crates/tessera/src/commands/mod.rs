//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{Result, bail};
use tessera_config::TesseraConfig;
use tessera_session::{SessionId, SessionStore};

use crate::backend::OpenedBackend;

pub mod config;
pub mod delete;
pub mod list;
pub mod ping;
pub mod show;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration.
    pub config: TesseraConfig,
    /// Config files it was loaded from.
    pub sources: Vec<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the configured backend.
    pub async fn open_backend(&self) -> Result<OpenedBackend> {
        OpenedBackend::open(&self.config.backend()).await
    }

    /// Open the configured backend and wrap it in a session store.
    pub async fn open_store(&self) -> Result<SessionStore> {
        let backend = self.open_backend().await?;
        Ok(SessionStore::new(self.config.session_config(), backend.into_shared()))
    }
}

/// Parse a session id given on the command line.
pub fn parse_session_id(raw: &str) -> Result<SessionId> {
    match SessionId::parse(raw) {
        Some(id) => Ok(id),
        None => bail!("'{}' is not a valid session id", raw),
    }
}
