//! Go module proxy client
//!
//! Blocking HTTP client for a `GOPROXY` server. Archives are downloaded into
//! the artifact cache; a cache hit skips the network entirely.

use super::api::{parse_version_list, version_list_url, zip_url};
use super::{Registry, RegistryError};
use crate::cache::Cache;
use crate::semver::Version;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Default Go module proxy URL
pub const DEFAULT_GO_MODULE_PROXY: &str = "https://goproxy.io";

/// Registry backed by a Go module proxy
pub struct GoModuleProxy {
    /// HTTP client
    client: Client,

    /// Base URL of the proxy
    proxy_url: String,

    cache: Cache,
}

impl GoModuleProxy {
    /// Create a client for `proxy_url`
    ///
    /// `http_proxy` routes every request through an HTTP(S) proxy when set.
    pub fn new(
        proxy_url: &str,
        http_proxy: Option<&str>,
        cache: Cache,
    ) -> Result<Self, RegistryError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("lip/{}", env!("CARGO_PKG_VERSION")));

        if let Some(http_proxy) = http_proxy.filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(http_proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            proxy_url: proxy_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    /// GET a URL and return the body
    fn download(&self, url: &str) -> Result<Vec<u8>, RegistryError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(RegistryError::BadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}

impl Registry for GoModuleProxy {
    fn list_versions(&self, repo: &str) -> Result<Vec<Version>, RegistryError> {
        let url = version_list_url(&self.proxy_url, repo);
        let body = self.download(&url)?;
        Ok(parse_version_list(&String::from_utf8_lossy(&body)))
    }

    fn fetch_archive(&self, repo: &str, version: &Version) -> Result<PathBuf, RegistryError> {
        let url = zip_url(&self.proxy_url, repo, version);

        if let Some(path) = self.cache.get(&url) {
            debug!("Cache hit for {}@{}: {}", repo, version, path.display());
            return Ok(path);
        }

        info!("Downloading {}@{}", repo, version);
        let bytes = match self.download(&url) {
            Err(RegistryError::BadStatus { status: 404, .. })
            | Err(RegistryError::BadStatus { status: 410, .. }) => {
                return Err(RegistryError::VersionNotFound {
                    repo: repo.to_string(),
                    version: version.to_string(),
                })
            }
            other => other?,
        };

        debug!(
            "Downloaded {} ({} bytes, sha256 {})",
            url,
            bytes.len(),
            hex::encode(Sha256::digest(&bytes))
        );

        Ok(self.cache.store(&url, &bytes)?)
    }
}
