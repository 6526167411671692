//! Client configuration.
//!
//! Holds the server base URL and derives the versioned REST prefix and the
//! event channel endpoint from it. The channel scheme mirrors the transport
//! security of the base URL: `https` becomes `wss`, `http` becomes `ws`.
//!
//! Configuration can optionally be persisted to
//! `~/.config/goli-client/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "goli-client";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Versioned REST prefix, matching the server's router
const API_PREFIX: &str = "/api/v1";

/// Event channel path on the same host
const WS_PATH: &str = "/ws";

/// HTTP request timeout in seconds.
/// 30s allows for slow pipeline-service responses while failing fast
/// enough for interactive use.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server base URL, e.g. `https://goli.example.com`
    pub base_url: Url,
    /// Last username that logged in, for pre-filling login forms
    #[serde(default)]
    pub last_username: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            last_username: None,
        }
    }

    /// Absolute URL for a path under `/api/v1`.
    ///
    /// `path` is relative to the prefix, e.g. `jobs` or `auth/login`.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        let full = format!("{}/{}", API_PREFIX, path.trim_start_matches('/'));
        self.base_url
            .join(&full)
            .with_context(|| format!("Invalid API path: {}", path))
    }

    /// Event channel URL on the same host as the base URL.
    ///
    /// Secure base (`https`) yields `wss`, plain base yields `ws`.
    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self
            .base_url
            .join(WS_PATH)
            .context("Failed to derive channel URL")?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => anyhow::bail!("Unsupported base URL scheme: {}", other),
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("Failed to set channel scheme"))?;
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Ok(serde_json::from_str(&contents)?)
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

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> ClientConfig {
        ClientConfig::new(Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_joins_versioned_prefix() {
        let cfg = config("https://goli.example.com");
        assert_eq!(
            cfg.api_url("jobs").unwrap().as_str(),
            "https://goli.example.com/api/v1/jobs"
        );
        assert_eq!(
            cfg.api_url("/auth/login").unwrap().as_str(),
            "https://goli.example.com/api/v1/auth/login"
        );
    }

    #[test]
    fn ws_scheme_mirrors_transport_security() {
        assert_eq!(
            config("https://goli.example.com").ws_url().unwrap().as_str(),
            "wss://goli.example.com/ws"
        );
        assert_eq!(
            config("http://localhost:8080").ws_url().unwrap().as_str(),
            "ws://localhost:8080/ws"
        );
    }
}
