//! Configuration management for byline.
//!
//! Loads configuration from `${BYLINE_HOME}/config.toml` with sensible
//! defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default API base URL when neither env nor config provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API base URL (overridable via `BYLINE_BASE_URL`).
    pub base_url: String,

    /// Per-request timeout in seconds (0 disables).
    pub request_timeout_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Saves configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = paths::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Resolves the API base URL with precedence: env > config > default.
    pub fn resolve_base_url(&self) -> Result<String> {
        if let Ok(env_url) = std::env::var("BYLINE_BASE_URL") {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                validate_url(trimmed)?;
                return Ok(trimmed.trim_end_matches('/').to_string());
            }
        }

        let trimmed = self.base_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }

        Ok(DEFAULT_BASE_URL.to_string())
    }
}

/// Validates that a URL is well-formed.
fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid API base URL: {url}"))?;
    Ok(())
}

pub mod paths {
    //! Path resolution for byline configuration and state.
    //!
    //! `BYLINE_HOME` resolution order:
    //! 1. `BYLINE_HOME` environment variable (if set)
    //! 2. `~/.config/byline` (default)

    use std::path::PathBuf;

    /// Returns the byline home directory.
    pub fn byline_home() -> PathBuf {
        if let Ok(home) = std::env::var("BYLINE_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("byline"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        byline_home().join("config.toml")
    }

    /// Returns the path to the persisted credentials file.
    pub fn credentials_path() -> PathBuf {
        byline_home().join("credentials.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: missing file yields defaults.
    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, 30);
    }

    /// Test: partial config files keep defaults for missing keys.
    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"https://blog.example.com/api\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://blog.example.com/api");
        assert_eq!(config.request_timeout_secs, 30);
    }

    /// Test: trailing slashes are stripped from the resolved base URL.
    #[test]
    fn test_resolved_base_url_trims_slash() {
        let config = Config {
            base_url: "https://blog.example.com/api/".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_base_url().unwrap(),
            "https://blog.example.com/api"
        );
    }

    /// Test: malformed URLs are rejected.
    #[test]
    fn test_invalid_base_url_rejected() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.resolve_base_url().is_err());
    }
}
