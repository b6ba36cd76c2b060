//! # Application Configuration
//!
//! Configuration is read from a YAML file and then overridden from the
//! environment.
//!
//! ## Lookup order
//!
//! 1. `--config PATH` when given (the file must exist)
//! 2. `<config_dir>/finance-tracker/config.yaml` when present
//! 3. Built-in defaults
//!
//! Environment variables win over the file:
//!
//! | Variable               | Effect                                      |
//! |------------------------|---------------------------------------------|
//! | `FINANCE_API_URL`      | sets `storage.api_url`, switches to remote  |
//! | `FINANCE_API_TOKEN`    | sets `storage.api_token`                    |
//! | `FINANCE_DATA_DIR`     | sets `storage.data_directory`               |
//! | `FINANCE_BIND_ADDRESS` | sets `server.bind_address`                  |
//! | `FINANCE_LOG_LEVEL`    | sets `log_level`                            |
//!
//! ## YAML Format
//!
//! ```yaml
//! storage:
//!   mode: remote
//!   api_url: "https://api.example.com/prod"
//!   api_token: "secret"
//! server:
//!   bind_address: "127.0.0.1:3000"
//!   auth_token: "server-secret"
//! log_level: debug
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const APP_DIRECTORY: &str = "finance-tracker";
const CONFIG_FILE: &str = "config.yaml";

pub const ENV_API_URL: &str = "FINANCE_API_URL";
pub const ENV_API_TOKEN: &str = "FINANCE_API_TOKEN";
pub const ENV_DATA_DIR: &str = "FINANCE_DATA_DIR";
pub const ENV_BIND_ADDRESS: &str = "FINANCE_BIND_ADDRESS";
pub const ENV_LOG_LEVEL: &str = "FINANCE_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Remote storage requires storage.api_url (or FINANCE_API_URL)")]
    MissingApiUrl,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}

/// Where the repository keeps its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// Local data directory; the platform data directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Static bearer token required by the REST server, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `explicit_path` or the default location,
    /// then apply environment overrides and validate.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::source_path(explicit_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// The file `load` reads: `explicit_path`, else the default path if it exists
    pub fn source_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        }
    }

    /// `<config_dir>/finance-tracker/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIRECTORY).join(CONFIG_FILE))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// Apply overrides from a variable lookup; blank values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = var(ENV_API_URL) {
            self.storage.mode = StorageMode::Remote;
            self.storage.api_url = Some(url);
        }
        if let Some(token) = var(ENV_API_TOKEN) {
            self.storage.api_token = Some(token);
        }
        if let Some(dir) = var(ENV_DATA_DIR) {
            self.storage.data_directory = Some(PathBuf::from(dir));
        }
        if let Some(address) = var(ENV_BIND_ADDRESS) {
            self.server.bind_address = address;
        }
        if let Some(level) = var(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_url = self
            .storage
            .api_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if self.storage.mode == StorageMode::Remote && !has_url {
            return Err(ConfigError::MissingApiUrl);
        }
        self.log_filter()?;
        Ok(())
    }

    pub fn log_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log_level
            .parse::<log::LevelFilter>()
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.storage.mode, StorageMode::Local);
        assert_eq!(config.server.bind_address, "127.0.0.1:3000");
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml("storage:\n  mode: remote\n  api_url: http://localhost:9000\n").unwrap();
        assert_eq!(config.storage.mode, StorageMode::Remote);
        assert_eq!(config.storage.api_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("  \n").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_env_api_url_switches_to_remote() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[
            (ENV_API_URL, "https://api.example.com/prod"),
            (ENV_API_TOKEN, "abc"),
            (ENV_LOG_LEVEL, "debug"),
        ]));

        assert_eq!(config.storage.mode, StorageMode::Remote);
        assert_eq!(config.storage.api_url.as_deref(), Some("https://api.example.com/prod"));
        assert_eq!(config.storage.api_token.as_deref(), Some("abc"));
        assert_eq!(config.log_filter().unwrap(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[(ENV_API_URL, "  "), (ENV_BIND_ADDRESS, "")]));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_remote_without_url_is_rejected() {
        let config = AppConfig::from_yaml("storage:\n  mode: remote\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiUrl)));
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let config = AppConfig::from_yaml("log_level: loud\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "server:\n  bind_address: 0.0.0.0:8080\n  auth_token: s3cret\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.auth_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_explicit_path_is_the_source_even_if_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nope.yaml");

        assert_eq!(AppConfig::source_path(Some(&path)), Some(path.clone()));
        assert!(matches!(AppConfig::load(Some(&path)), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = AppConfig::from_file(&temp_dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "storage: [not, a, map]\n").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
