//! Client configuration.
//!
//! Loads from a TOML file with env-var overrides. Precedence for each value:
//! environment, then file, then default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default backend base URL (local deployment).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Resolved client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Bearer token for authenticated deployments; omit for local ones.
    pub api_key: Option<String>,
    /// Connection timeout in seconds. The stream itself has no overall
    /// deadline; responses stay open for the lifetime of a run.
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Loads configuration, applying env overrides on top of the file.
    ///
    /// Environment variables: `WEFT_BASE_URL`, `WEFT_API_KEY`.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resolved base URL is not a valid URL.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parse config file {}", path.display()))?
            }
            _ => Config::default(),
        };

        if let Some(base_url) = non_empty_env("WEFT_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(api_key) = non_empty_env("WEFT_API_KEY") {
            config.api_key = Some(api_key);
        }

        config.base_url = config.base_url.trim_end_matches('/').to_string();
        validate_base_url(&config.base_url)?;
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_base_url(base_url: &str) -> Result<()> {
    url::Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str("base_url = \"https://agents.example.com/\"").unwrap();
        assert_eq!(config.base_url, "https://agents.example.com/");
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(validate_base_url("not a url").is_err());
        assert!(validate_base_url("https://ok.example.com").is_ok());
    }
}
