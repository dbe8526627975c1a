//! Configuration schema (scriptrefly.toml)

use crate::schema::Dialect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where persisted schemas and rules live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the file-backed key-value store
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".scriptrefly")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Ancestor lookup settings for class extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceConfig {
    /// Maximum number of ancestors followed above the starting class
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Directories searched for `<Parent>.java` before asking the user
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,

    /// Ask on stdin when an ancestor cannot be found
    #[serde(default = "default_true")]
    pub prompt: bool,
}

fn default_max_depth() -> usize {
    32
}

fn default_true() -> bool {
    true
}

impl Default for InheritanceConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            search_dirs: Vec::new(),
            prompt: true,
        }
    }
}

/// Validator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Run the built-in quote/bracket balance and statement shape checks
    #[serde(default = "default_true")]
    pub structural_checks: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            structural_checks: true,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Dialect used when a command does not name one
    #[serde(default)]
    pub default_dialect: Dialect,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub inheritance: InheritanceConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_dialect: Dialect::default(),
            store: StoreConfig::default(),
            inheritance: InheritanceConfig::default(),
            validation: ValidationConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Relative paths resolve against the config file's directory
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Absolute store directory
    pub fn store_dir(&self) -> PathBuf {
        self.resolve(&self.store.dir)
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_dialect, Dialect::MySql);
        assert_eq!(config.inheritance.max_depth, 32);
        assert!(config.validation.structural_checks);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
default_dialect = "MongoDB"

[inheritance]
search_dirs = ["src/main/java"]
prompt = false
"#,
        )
        .unwrap();

        assert_eq!(config.default_dialect, Dialect::MongoDb);
        assert_eq!(config.inheritance.max_depth, 32);
        assert!(!config.inheritance.prompt);
        assert_eq!(config.inheritance.search_dirs, vec![PathBuf::from("src/main/java")]);
        assert_eq!(config.store.dir, PathBuf::from(".scriptrefly"));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptrefly.toml");

        let mut config = Config::default();
        config.validation.structural_checks = false;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(!loaded.validation.structural_checks);
        assert_eq!(loaded.project_root, dir.path());
        assert_eq!(loaded.store_dir(), dir.path().join(".scriptrefly"));
    }

    #[test]
    fn invalid_toml() {
        assert!(matches!(Config::from_toml("default_dialect = 3"), Err(ConfigError::ParseError(_))));
    }
}
