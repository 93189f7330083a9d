//! Configuration loading and root folder resolution
//!
//! Tests that touch AJL_ROOT_FOLDER are marked #[serial] so they never race
//! on the process environment.

use ajl_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_without_overrides_uses_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = RootFolderResolver::new().resolve();
    assert_eq!(resolved, CompiledDefaults::for_current_platform().root_folder);
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ajl-from-env");
    let config = TomlConfig::parse(r#"root_folder = "/tmp/ajl-from-toml""#).unwrap();
    let resolved = RootFolderResolver::new().with_config(&config).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/tmp/ajl-from-env"));
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "   ");
    let config = TomlConfig::parse(r#"root_folder = "/tmp/ajl-from-toml""#).unwrap();
    let resolved = RootFolderResolver::new().with_config(&config).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/tmp/ajl-from-toml"));
}

#[test]
#[serial]
fn test_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ajl-from-env");
    let resolved = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/ajl-from-cli")))
        .resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/tmp/ajl-from-cli"));
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml")));
    assert_eq!(config.port, ajl_common::config::DEFAULT_PORT);
}

#[test]
fn test_invalid_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "poll_interval_secs = 0").unwrap();

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config.poll_interval_secs, ajl_common::config::DEFAULT_POLL_INTERVAL_SECS);
}

#[test]
fn test_initializer_creates_layout_idempotently() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("ajl");
    let init = RootFolderInitializer::new(root.clone());

    assert!(!init.database_exists());
    init.ensure_directory_exists().unwrap();
    init.ensure_directory_exists().unwrap();
    assert!(init.evidence_dir().is_dir());
    assert_eq!(init.root(), root.as_path());
}

#[tokio::test]
async fn test_database_created_in_root_folder() {
    let dir = TempDir::new().unwrap();
    let init = RootFolderInitializer::new(dir.path().to_path_buf());
    init.ensure_directory_exists().unwrap();

    let pool = ajl_common::db::init_database(&init.database_path()).await.unwrap();
    assert!(init.database_exists());

    // Reopening an existing file keeps the seeded groups
    drop(pool);
    let pool = ajl_common::db::init_database(&init.database_path()).await.unwrap();
    let groups = ajl_common::db::groups::list_groups(&pool).await.unwrap();
    assert_eq!(groups.len(), 4);
}
