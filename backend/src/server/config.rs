//! Application configuration, read from a JSON file at startup.
//!
//! A missing file is replaced with a default one so a fresh checkout starts
//! with something editable; a malformed or invalid file is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Root under which per-request report working directories live.
    pub cache_dir: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            cache_dir: PathBuf::from("cache"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: String,
    pub name: String,
    pub login: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:2480".to_owned(),
            name: "accounting".to_owned(),
            login: "admin".to_owned(),
            password: "admin".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 465,
            login: String::new(),
            password: String::new(),
            from: "accounting@localhost".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub web: WebConfig,
    pub db: DbConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Load the configuration from `path`, writing a default file first if
    /// none exists yet.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let defaults = Self::default();
            std::fs::write(path, serde_json::to_string_pretty(&defaults)?)?;
            info!(path = %path.display(), "wrote default configuration");
            defaults.validate()?;
            return Ok(defaults);
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.web.port == 0 {
            return Err(ConfigError::Invalid("web.port must be non-zero".to_owned()));
        }
        if self.web.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("web.cache_dir must be set".to_owned()));
        }
        for (value, name) in [
            (&self.db.url, "db.url"),
            (&self.db.name, "db.name"),
            (&self.db.login, "db.login"),
            (&self.mail.host, "mail.host"),
            (&self.mail.from, "mail.from"),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must be set")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_replaced_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = AppConfig::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.web.port, 8080);
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn blank_database_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"db": {"name": "  "}}"#).unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}
