//! Configuration loading and root folder resolution
//!
//! The root folder holds the SQLite database and the evidence object store.
//! It is resolved in priority order:
//! 1. Command-line argument
//! 2. `AJL_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default
//!
//! A missing or unreadable TOML file never stops startup; it is logged and
//! the defaults are used.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::access::PhaseLabels;
use crate::wizard::submission::DEFAULT_CODE_PREFIX;
use crate::{Error, Result};

pub const ROOT_FOLDER_ENV: &str = "AJL_ROOT_FOLDER";
pub const DATABASE_FILE: &str = "ajl.db";
pub const EVIDENCE_DIR: &str = "evidence";
pub const DEFAULT_PORT: u16 = 5740;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Bootstrap configuration read from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How often open clients re-read the workshop phase
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Leading part of generated journey codes
    #[serde(default = "default_code_prefix")]
    pub journey_code_prefix: String,

    /// Overrides for the four phase labels, in phase order
    #[serde(default)]
    pub phase_labels: Option<Vec<String>>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            poll_interval_secs: default_poll_interval_secs(),
            journey_code_prefix: default_code_prefix(),
            phase_labels: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_code_prefix() -> String {
    DEFAULT_CODE_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        if config.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be at least 1".to_string()));
        }
        if let Some(labels) = &config.phase_labels {
            if labels.len() != 4 {
                return Err(Error::Config(format!(
                    "phase_labels needs 4 entries, found {}",
                    labels.len()
                )));
            }
        }
        Ok(config)
    }

    /// Load from `path` if given, else from the default location; falls back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file found, using defaults");
                    return Self::default();
                }
            },
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn phase_labels(&self) -> PhaseLabels {
        match &self.phase_labels {
            Some(labels) if labels.len() == 4 => PhaseLabels::new(
                labels[0].clone(),
                labels[1].clone(),
                labels[2].clone(),
                labels[3].clone(),
            ),
            _ => PhaseLabels::default(),
        }
    }
}

/// `~/.config/ajl/config.toml` or the platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ajl").join("config.toml"))
}

/// Built-in fallbacks used when nothing else is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("ajl"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ajl"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("ajl"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ajl"))
        } else {
            dirs::data_local_dir()
                .map(|d| d.join("ajl"))
                .unwrap_or_else(|| PathBuf::from("./ajl_data"))
        };
        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Applies the root folder priority order
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
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
            return path.clone();
        }
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.toml_root {
            return path.clone();
        }
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.root.join(EVIDENCE_DIR)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Create the root and evidence folders; safe to call repeatedly
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.evidence_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.journey_code_prefix, "UAL-W6");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.phase_labels(), PhaseLabels::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = TomlConfig::parse(
            r#"
            root_folder = "/srv/ajl"
            port = 8080
            poll_interval_secs = 3
            journey_code_prefix = "WS-2"
            phase_labels = ["A", "B", "C", "D"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/ajl")));
        assert_eq!(config.port, 8080);
        assert_eq!(config.journey_code_prefix, "WS-2");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.phase_labels().label(crate::access::Phase::Storyboard),
            "C"
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TomlConfig::parse("poll_interval_secs = 0").is_err());
        assert!(TomlConfig::parse(r#"phase_labels = ["only one"]"#).is_err());
        assert!(TomlConfig::parse("port = \"eighty\"").is_err());
    }

    #[test]
    fn test_cli_arg_wins() {
        let resolver = RootFolderResolver::new().with_cli_arg(Some(PathBuf::from("/tmp/from-cli")));
        assert_eq!(resolver.resolve(), PathBuf::from("/tmp/from-cli"));
    }

    #[test]
    fn test_initializer_paths() {
        let init = RootFolderInitializer::new(PathBuf::from("/tmp/ajl-root"));
        assert_eq!(init.database_path(), PathBuf::from("/tmp/ajl-root/ajl.db"));
        assert_eq!(init.evidence_dir(), PathBuf::from("/tmp/ajl-root/evidence"));
    }
}
