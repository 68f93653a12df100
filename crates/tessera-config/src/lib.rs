//! Configuration for Tessera session deployments.
//!
//! Provides a TOML document with:
//! - `[session]` and `[session.cookie]` for the session engine
//! - `[backend]` selecting the in-process or memcached cache
//! - `[logging]` for the admin CLI's log output
//!
//! Files are layered: the user config directory first, then a
//! project-local `tessera.toml`.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
