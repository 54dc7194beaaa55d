//! Configuration management

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote API, e.g. `https://example.org/api`.
    #[serde(default)]
    pub api_base_url: String,
    /// LMDB environment name; the directory is `<db_path>.lmdb`.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_random_count")]
    pub default_random_count: usize,
    #[serde(default = "default_map_size")]
    pub map_size_mb: usize,
    /// Start the periodic drain thread on startup.
    #[serde(default = "default_true")]
    pub background_drain: bool,
}

fn default_db_path() -> String { "movieshows_sync".to_string() }
fn default_drain_interval() -> u64 { 60 }
fn default_request_timeout() -> u64 { 10 }
fn default_connect_timeout() -> u64 { 5 }
fn default_page_size() -> usize { 50 }
fn default_random_count() -> usize { 10 }
fn default_map_size() -> usize { 64 }
fn default_true() -> bool { true }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            db_path: default_db_path(),
            drain_interval_secs: default_drain_interval(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            default_page_size: default_page_size(),
            default_random_count: default_random_count(),
            map_size_mb: default_map_size(),
            background_drain: default_true(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, AppResponse> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match fs::read_to_string(path).map_err(AppResponse::from).and_then(|c| Self::from_json(&c)) {
                Ok(config) => return config,
                Err(e) => warn!("Ignoring config at {}: {e}", path.display()),
            }
        }
        Self::default()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AppResponse> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.db_path.trim().is_empty() {
            return Err(AppResponse::ValidationError("db_path must not be empty".to_string()));
        }
        if self.drain_interval_secs == 0 {
            return Err(AppResponse::ValidationError(
                "drain_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
