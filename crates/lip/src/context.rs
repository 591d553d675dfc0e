//! Execution context handed to every operation
//!
//! Bundles the workspace location, the lip home directory, the loaded
//! configuration and the requested verbosity.

use crate::cache::{Cache, CacheError};
use crate::config::{Config, ConfigError};
use crate::registry::{GoModuleProxy, RegistryError};
use std::path::{Path, PathBuf};

/// How much output the user asked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only; lifecycle command output is discarded
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[derive(Debug, Clone)]
pub struct Context {
    workspace_dir: PathBuf,
    lip_home: PathBuf,
    config: Config,
    verbosity: Verbosity,
}

impl Context {
    pub fn new(workspace_dir: PathBuf, lip_home: PathBuf, config: Config, verbosity: Verbosity) -> Self {
        Self {
            workspace_dir,
            lip_home,
            config,
            verbosity,
        }
    }

    /// Context for `workspace_dir` with `~/.lip` as home and its config file loaded
    pub fn load(workspace_dir: PathBuf, verbosity: Verbosity) -> Result<Self, ConfigError> {
        let lip_home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?.join(".lip");
        let config = Config::load(&lip_home.join("config.toml"))?;
        Ok(Self::new(workspace_dir, lip_home, config, verbosity))
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    pub fn lip_home(&self) -> &Path {
        &self.lip_home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Directory holding one record per installed tooth
    pub fn metadata_dir(&self) -> PathBuf {
        self.workspace_dir.join(".lip").join("metadata")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.lip_home.join("cache")
    }

    pub fn config_path(&self) -> PathBuf {
        self.lip_home.join("config.toml")
    }

    /// Create the metadata and cache directories
    pub fn create_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.metadata_dir())?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }

    /// Environment variables passed to lifecycle commands
    pub fn command_env(&self) -> Vec<(String, String)> {
        let proxy = &self.config.proxy_url;
        if proxy.is_empty() {
            return Vec::new();
        }
        vec![
            ("HTTP_PROXY".to_string(), proxy.clone()),
            ("HTTPS_PROXY".to_string(), proxy.clone()),
        ]
    }

    pub fn cache(&self) -> Result<Cache, CacheError> {
        Cache::init(&self.cache_dir())
    }

    /// Registry client for the configured Go module proxy
    ///
    /// A `GOPROXY` environment variable overrides the configured proxy.
    pub fn registry(&self) -> Result<GoModuleProxy, RegistryError> {
        let goproxy = std::env::var("GOPROXY").ok();
        let proxy_url = self.config.module_proxy_url(goproxy.as_deref());
        GoModuleProxy::new(&proxy_url, Some(self.config.proxy_url.as_str()), self.cache()?)
    }
}
