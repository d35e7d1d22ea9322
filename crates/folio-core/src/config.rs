//! Application configuration management.
//!
//! Configuration is stored at `~/.config/folio/config.json`. Values from
//! the file can be overridden by `FOLIO_*` environment variables, which in
//! turn are overridden by command-line flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "folio";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin used when nothing else is configured.
pub const DEFAULT_SITE_URL: &str = "http://127.0.0.1:8080/";

/// Bind address of the serving layer when nothing else is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Origin the feeds are fetched from.
    pub site_url: Option<String>,
    /// Root of the static site (holds `data/` and `assets/`).
    pub site_dir: Option<PathBuf>,
    /// Folder of `sN/pM` series photos.
    pub series_source: Option<PathBuf>,
    /// Folder of project photos.
    pub projects_source: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from `FOLIO_*` variables as resolved by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("FOLIO_SITE_URL") {
            self.site_url = Some(url);
        }
        if let Some(dir) = lookup("FOLIO_SITE_DIR") {
            self.site_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("FOLIO_SERIES_SOURCE") {
            self.series_source = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("FOLIO_PROJECTS_SOURCE") {
            self.projects_source = Some(PathBuf::from(dir));
        }
        if let Some(addr) = lookup("FOLIO_BIND_ADDR") {
            self.bind_addr = Some(addr);
        }
        if let Some(secs) = lookup("FOLIO_REQUEST_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.request_timeout_secs = Some(secs),
                Err(_) => warn!(value = %secs, "Ignoring invalid FOLIO_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn site_url(&self) -> &str {
        self.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL)
    }

    pub fn site_dir(&self) -> PathBuf {
        self.site_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }
}
