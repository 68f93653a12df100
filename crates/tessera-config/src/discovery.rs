//! Locating and layering config files.
//!
//! Layers, lowest precedence first:
//! 1. `config.toml` in the user config directory (`~/.config/tessera`)
//! 2. `tessera.toml` in the project directory (the working directory by default)
//!
//! Command-line flags sit above both and are applied by the caller.

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, TesseraConfig};

const PROJECT_CONFIG_FILE: &str = "tessera.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "tessera";

/// Overrides the user config directory when set and non-empty.
const CONFIG_DIR_ENV: &str = "TESSERA_CONFIG_DIR";

/// One candidate config file.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Found, parsed and merged.
    pub loaded: bool,
}

/// Merged configuration plus a record of how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TesseraConfig,
    /// Every candidate checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// One entry per file that existed but could not be used.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    fn empty() -> Self {
        Self {
            config: TesseraConfig::new(),
            sources: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Files that contributed to `config`.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|source| source.loaded.then_some(source.path.as_path()))
            .collect()
    }

    /// Merge `path` on top of the current config. A missing file is skipped
    /// quietly; a broken one is recorded as a warning.
    fn apply_layer(&mut self, path: PathBuf) {
        let loaded = if path.is_file() {
            match load_config_file(&path) {
                Ok(layer) => {
                    self.config.merge(layer);
                    true
                }
                Err(e) => {
                    self.warnings
                        .push(format!("Failed to load {}: {}", path.display(), e));
                    false
                }
            }
        } else {
            false
        };

        self.sources.push(ConfigSource { path, loaded });
    }
}

/// Discover and merge config files, using the working directory as the
/// project directory when `project_dir` is `None`.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Like [`load_config`], with `config_dir` replacing the user config
/// directory (taking precedence over `TESSERA_CONFIG_DIR`).
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig::empty();
    for path in search_paths(project_dir, config_dir) {
        loaded.apply_layer(path);
    }
    Ok(loaded)
}

/// Read and validate a single config file.
pub fn load_config_file(path: &Path) -> Result<TesseraConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    TesseraConfig::from_toml(&contents)
}

/// `config.toml` inside [`xdg_config_dir`].
pub fn xdg_config_path() -> Option<PathBuf> {
    Some(xdg_config_dir()?.join(USER_CONFIG_FILE))
}

/// The user config directory: `$TESSERA_CONFIG_DIR`, else the platform
/// config directory joined with `tessera`.
pub fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => Some(dirs::config_dir()?.join(APP_NAME)),
    }
}

fn search_paths(project_dir: Option<&Path>, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let user = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    let project = project_dir.map_or_else(
        || PathBuf::from(PROJECT_CONFIG_FILE),
        |dir| dir.join(PROJECT_CONFIG_FILE),
    );

    user.into_iter().chain(std::iter::once(project)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::BackendKind;

    /// Empty project and user directories.
    fn temp_dirs() -> (TempDir, TempDir) {
        (TempDir::new().unwrap(), TempDir::new().unwrap())
    }

    fn load(project: &TempDir, user: &TempDir) -> LoadedConfig {
        load_config_with_options(Some(project.path()), Some(user.path())).unwrap()
    }

    #[test]
    fn test_user_path_is_config_toml() {
        if let Some(p) = xdg_config_path() {
            assert_eq!(p.file_name().and_then(|n| n.to_str()), Some("config.toml"));
        }
    }

    #[test]
    fn test_search_order_user_then_project() {
        let (project, user) = temp_dirs();
        let paths = search_paths(Some(project.path()), Some(user.path()));
        assert_eq!(
            paths,
            vec![user.path().join("config.toml"), project.path().join("tessera.toml")]
        );
    }

    #[test]
    fn test_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.toml");
        fs::write(&path, "[backend]\nkind = \"memcache\"\n").unwrap();

        assert_eq!(load_config_file(&path).unwrap().backend().kind, BackendKind::Memcache);
    }

    #[test]
    fn test_explicit_file_missing() {
        let err = load_config_file(Path::new("/nonexistent/tessera.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_explicit_file_not_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.toml");
        fs::write(&path, "[backend\nkind =").unwrap();

        assert!(matches!(load_config_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_nothing_to_load() {
        let (project, user) = temp_dirs();
        let loaded = load(&project, &user);

        assert!(loaded.config.session.is_none());
        assert!(loaded.loaded_from().is_empty());
        assert_eq!(loaded.sources.len(), 2);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_project_overrides_user() {
        let (project, user) = temp_dirs();
        fs::write(
            user.path().join("config.toml"),
            "[session]\nttl_secs = 120\n\n[backend]\nkind = \"memcache\"\n",
        )
        .unwrap();
        fs::write(project.path().join("tessera.toml"), "[backend]\nkind = \"memory\"\n").unwrap();

        let loaded = load(&project, &user);
        assert_eq!(loaded.config.backend().kind, BackendKind::Memory);
        assert_eq!(loaded.config.session.as_ref().unwrap().ttl_secs, 120);
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_broken_layer_is_skipped_with_warning() {
        let (project, user) = temp_dirs();
        fs::write(user.path().join("config.toml"), "[backend]\nkind = \"memcache\"\n").unwrap();
        fs::write(project.path().join("tessera.toml"), "[[[").unwrap();

        let loaded = load(&project, &user);
        assert_eq!(loaded.config.backend().kind, BackendKind::Memcache);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].starts_with("Failed to load"));
        assert_eq!(loaded.loaded_from(), vec![user.path().join("config.toml").as_path()]);
    }

    #[test]
    fn test_invalid_value_is_a_warning() {
        let (project, user) = temp_dirs();
        fs::write(project.path().join("tessera.toml"), "[session]\nttl_secs = 0\n").unwrap();

        let loaded = load(&project, &user);
        assert!(loaded.warnings[0].contains("session.ttl_secs"));
        assert!(loaded.config.session.is_none());
    }
}
