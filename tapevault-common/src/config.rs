//! Configuration loading and root folder resolution
//!
//! Root folder priority:
//! 1. Command-line argument
//! 2. `TAPEVAULT_ROOT` environment variable
//! 3. TOML config file
//! 4. OS-dependent default
//!
//! A missing or broken config file never stops startup; it is logged and
//! the defaults apply.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "TAPEVAULT_ROOT";

const APP_DIR: &str = "tapevault";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Database file name, relative to the root folder unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scrobbling stays disabled without these credentials
    #[serde(default)]
    pub lastfm: LastFmConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_file: default_database_file(),
            logging: LoggingConfig::default(),
            lastfm: LastFmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LastFmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
}

impl LastFmConfig {
    /// Key and secret, when both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => Some((key, secret)),
            _ => None,
        }
    }
}

fn default_database_file() -> PathBuf {
    PathBuf::from(CompiledDefaults::DATABASE_FILE)
}

fn default_log_level() -> String {
    CompiledDefaults::LOG_LEVEL.to_string()
}

/// Built-in fallbacks
pub struct CompiledDefaults;

impl CompiledDefaults {
    pub const DATABASE_FILE: &'static str = "tapevault.db";
    pub const LOG_LEVEL: &'static str = "info";

    /// OS-dependent data folder
    pub fn root_folder() -> PathBuf {
        if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tapevault"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tapevault"))
        } else {
            dirs::data_local_dir()
                .map(|d| d.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("/var/lib/tapevault"))
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// First existing file among the platform config locations
    pub fn default_path() -> Option<PathBuf> {
        let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
        let system_config = (!cfg!(target_os = "windows"))
            .then(|| PathBuf::from("/etc").join(APP_DIR).join("config.toml"));

        [user_config, system_config]
            .into_iter()
            .flatten()
            .find(|path| path.exists())
    }

    /// Load `explicit` or the default config file; fall back to defaults
    /// with a warning when it cannot be used
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    debug!("No config file found, using defaults");
                    return Self::default();
                }
            },
        };

        match Self::from_file(&path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }
}

/// Resolves the root folder through the priority chain
pub struct RootFolderResolver {
    app_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(app = %self.app_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                debug!(app = %self.app_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(app = %self.app_name, "Root folder from config file: {}", path.display());
            return path.clone();
        }

        let path = CompiledDefaults::root_folder();
        debug!(app = %self.app_name, "Root folder from OS default: {}", path.display());
        path
    }
}

/// Prepares the resolved root folder for use
pub struct RootFolderInitializer {
    root_folder: PathBuf,
    database_file: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self {
            root_folder,
            database_file: default_database_file(),
        }
    }

    pub fn with_database_file(mut self, database_file: PathBuf) -> Self {
        self.database_file = database_file;
        self
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder).map_err(|e| {
            Error::Config(format!(
                "Failed to create root folder {}: {}",
                self.root_folder.display(),
                e
            ))
        })
    }

    /// Absolute database file names are used as-is
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(&self.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.database_file, PathBuf::from("tapevault.db"));
        assert!(config.lastfm.credentials().is_none());
    }

    #[test]
    fn test_parse_full_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/tapes"
            database_file = "library.db"

            [logging]
            level = "debug"

            [lastfm]
            api_key = "k"
            api_secret = "s"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/tapes")));
        assert_eq!(config.database_file, PathBuf::from("library.db"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.lastfm.credentials(), Some(("k", "s")));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TomlConfig = toml::from_str("[lastfm]\napi_key = \"k\"\n").unwrap();
        assert_eq!(config.database_file, PathBuf::from("tapevault.db"));
        assert_eq!(config.logging.level, "info");
        assert!(config.lastfm.credentials().is_none());
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "root_folder = [unterminated").unwrap();

        assert!(matches!(TomlConfig::from_file(&path), Err(Error::Config(_))));
        let config = TomlConfig::load_or_default(Some(&path));
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_initializer_creates_folder() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("root");
        let initializer = RootFolderInitializer::new(root.clone());

        initializer.ensure_directory_exists().unwrap();

        assert!(root.is_dir());
        assert_eq!(initializer.database_path(), root.join("tapevault.db"));
    }
}
