//! User configuration (~/.lip/config.toml)
//!
//! Settings are addressed by name through [`ConfigKey`] so the CLI can read
//! and write them without knowing the struct layout.

use crate::registry::DEFAULT_GO_MODULE_PROXY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while loading or changing the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the config file
    #[error("Failed to access config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: ConfigKey,
        value: String,
        reason: String,
    },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Persistent user settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the Go module proxy used as tooth registry
    pub go_module_proxy_url: String,

    /// HTTP(S) proxy for downloads and lifecycle commands, empty for none
    pub proxy_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            go_module_proxy_url: DEFAULT_GO_MODULE_PROXY.to_string(),
            proxy_url: String::new(),
        }
    }
}

/// Settable configuration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    GoModuleProxyUrl,
    ProxyUrl,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 2] = [ConfigKey::GoModuleProxyUrl, ConfigKey::ProxyUrl];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::GoModuleProxyUrl => "go_module_proxy_url",
            ConfigKey::ProxyUrl => "proxy_url",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the config file, creating its directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, key: ConfigKey) -> &str {
        match key {
            ConfigKey::GoModuleProxyUrl => &self.go_module_proxy_url,
            ConfigKey::ProxyUrl => &self.proxy_url,
        }
    }

    /// Set a field. Values must be URLs; `proxy_url` may also be empty.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let allow_empty = key == ConfigKey::ProxyUrl;
        if !(allow_empty && value.is_empty()) {
            reqwest::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
                key,
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        }

        let field = match key {
            ConfigKey::GoModuleProxyUrl => &mut self.go_module_proxy_url,
            ConfigKey::ProxyUrl => &mut self.proxy_url,
        };
        *field = value.to_string();
        Ok(())
    }

    /// Proxy URL to use, honoring a `GOPROXY`-style override
    ///
    /// The first comma- or pipe-separated entry of `goproxy` wins unless it
    /// is empty, `direct` or `off`.
    pub fn module_proxy_url(&self, goproxy: Option<&str>) -> String {
        goproxy
            .and_then(|value| value.split([',', '|']).next())
            .map(str::trim)
            .filter(|entry| !entry.is_empty() && *entry != "direct" && *entry != "off")
            .unwrap_or(self.go_module_proxy_url.as_str())
            .to_string()
    }
}
