//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! API base URL, the transport timeout, and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/devjourney/config.json`; the
//! `DEVJOURNEY_API_URL` and `DEVJOURNEY_TIMEOUT_SECS` environment variables
//! override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "devjourney";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/v1";

/// HTTP request timeout applied by the transport
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "DEVJOURNEY_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "DEVJOURNEY_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub last_email: Option<String>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_timeout_secs(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Host (and port) of the API, used to key stored credentials
    pub fn api_host(&self) -> String {
        reqwest::Url::parse(&self.api_base_url)
            .ok()
            .and_then(|url| {
                url.host_str().map(|host| match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                })
            })
            .unwrap_or_else(|| self.api_base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"last_email":"ada@example.com"}"#).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.last_email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            ENV_API_URL => Some("https://api.devjourney.dev/api ".to_string()),
            ENV_TIMEOUT_SECS => Some("5".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://api.devjourney.dev/api");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_timeout_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == ENV_TIMEOUT_SECS).then(|| "0".to_string()));
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_api_host() {
        let mut config = Config::default();
        assert_eq!(config.api_host(), "localhost:3000");
        config.api_base_url = "https://api.devjourney.dev/v1".to_string();
        assert_eq!(config.api_host(), "api.devjourney.dev");
    }
}
