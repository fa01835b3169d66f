//! Configuration management using config.toml

use armory_core::{ArmoryError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_PATH: &str = "config.toml";

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_CALLBACK_URL: &str = "http://127.0.0.1:23847/auth/callback";
const DEFAULT_DATABASE_PATH: &str = "armory.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the character API, including any path prefix
    pub api_url: String,

    /// Where the identity provider sends the browser after login
    pub callback_url: String,

    /// SQLite file backing the durable storage scope
    pub database_path: String,

    /// Per-request timeout for API calls
    pub request_timeout_secs: u64,

    /// How long route checks wait for the startup auth check
    pub auth_ready_timeout_secs: u64,

    /// How long `login` waits for the browser to come back
    pub login_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            request_timeout_secs: 30,
            auth_ready_timeout_secs: 5,
            login_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load config from file, creating a default one if it doesn't exist
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Error parsing {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Error reading {}: {}", path.display(), e);
                }
            }
            return Config::default();
        }

        let config = Config::default();
        if let Err(e) = config.save(path) {
            tracing::debug!("Could not write default config: {}", e);
        }
        config
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ArmoryError::Config(e.to_string()))?;
        fs::write(path, content).map_err(|e| ArmoryError::Config(e.to_string()))?;
        Ok(())
    }

    /// Check that URLs parse and timeouts are usable
    pub fn validate(&self) -> Result<()> {
        let api = Url::parse(&self.api_url)
            .map_err(|e| ArmoryError::Config(format!("api_url '{}': {}", self.api_url, e)))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ArmoryError::Config(format!(
                "api_url must be http or https, got '{}'",
                api.scheme()
            )));
        }

        self.callback_address()?;

        if self.request_timeout_secs == 0 || self.auth_ready_timeout_secs == 0 || self.login_timeout_secs == 0 {
            return Err(ArmoryError::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// API base without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// `host:port` the callback listener binds to
    pub fn callback_address(&self) -> Result<String> {
        let url = Url::parse(&self.callback_url).map_err(|e| {
            ArmoryError::Config(format!("callback_url '{}': {}", self.callback_url, e))
        })?;
        let host = url
            .host_str()
            .ok_or_else(|| ArmoryError::Config("callback_url has no host".to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ArmoryError::Config("callback_url has no port".to_string()))?;
        Ok(format!("{}:{}", host, port))
    }

    /// Path the provider redirects back to
    pub fn callback_path(&self) -> Result<String> {
        let url = Url::parse(&self.callback_url).map_err(|e| {
            ArmoryError::Config(format!("callback_url '{}': {}", self.callback_url, e))
        })?;
        Ok(url.path().to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_ready_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }
}
