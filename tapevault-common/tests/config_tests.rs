//! Root folder resolution and config fallback
//!
//! Tests that touch TAPEVAULT_ROOT are marked #[serial] so they never race
//! on the process environment.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tapevault_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use tempfile::TempDir;

fn config_with_root(root: &str) -> TomlConfig {
    TomlConfig {
        root_folder: Some(PathBuf::from(root)),
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = RootFolderResolver::new("test")
        .with_cli_arg(Some(PathBuf::from("/from/cli")))
        .with_config(&config_with_root("/from/toml"))
        .resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_environment_beats_config_file() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = RootFolderResolver::new("test")
        .with_config(&config_with_root("/from/toml"))
        .resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_empty_environment_value_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "");
    let resolved = RootFolderResolver::new("test")
        .with_config(&config_with_root("/from/toml"))
        .resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_os_default_without_overrides() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = RootFolderResolver::new("test").resolve();

    assert_eq!(resolved, CompiledDefaults::root_folder());
    assert!(resolved.ends_with("tapevault"));
}

#[test]
fn test_missing_explicit_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml")));

    assert!(config.root_folder.is_none());
    assert_eq!(config.database_file, PathBuf::from(CompiledDefaults::DATABASE_FILE));
    assert_eq!(config.logging.level, CompiledDefaults::LOG_LEVEL);
}

#[test]
fn test_explicit_config_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = \"/srv/tapes\"\ndatabase_file = \"lib.db\"\n").unwrap();

    let config = TomlConfig::load_or_default(Some(&path));
    let initializer = RootFolderInitializer::new(config.root_folder.clone().unwrap())
        .with_database_file(config.database_file.clone());

    assert_eq!(initializer.database_path(), PathBuf::from("/srv/tapes/lib.db"));
}

#[test]
fn test_initializer_creates_nested_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("a").join("b");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.root_folder(), root.as_path());
}
