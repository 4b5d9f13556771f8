//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use onair_core::protocol_constants::{
    DEFAULT_BIND_PORT, DEFAULT_CONTROL_PORT, DEFAULT_IMAGE_QUEUE_DELAY_MS,
    DEFAULT_PROVIDER_BASE_URL, DEFAULT_PROVIDER_TIMEOUT_SECS,
};
use onair_core::{Config, ProviderConfig};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP/WebSocket server to.
    /// Override: `ONAIR_BIND_PORT`
    pub bind_port: u16,

    /// Loopback UDP port for control messages.
    /// Override: `ONAIR_CONTROL_PORT`
    pub control_port: u16,

    /// YAML playlist fixture.
    /// Override: `ONAIR_PLAYLIST_FILE`
    pub playlist_file: Option<PathBuf>,

    /// Discogs personal access token. Artwork is disabled without one.
    /// Override: `ONAIR_DISCOGS_TOKEN`
    pub discogs_token: Option<String>,

    pub provider_base_url: String,

    /// Per-request provider timeout in seconds.
    pub provider_timeout_secs: u64,

    /// Delay between image queue jobs in milliseconds.
    pub image_queue_delay_ms: u64,

    /// Downstream WebSocket URLs to mirror broadcasts to.
    pub proxies: Vec<String>,

    /// Directory for the persisted artwork index.
    /// Override: `ONAIR_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_BIND_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            playlist_file: None,
            discogs_token: None,
            provider_base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            image_queue_delay_ms: DEFAULT_IMAGE_QUEUE_DELAY_MS,
            proxies: Vec::new(),
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    ///
    /// Unparseable values are ignored. Port overrides are also handled by
    /// clap in main.rs, which wins over both.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("ONAIR_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }
        if let Some(port) = var("ONAIR_CONTROL_PORT").and_then(|v| v.parse().ok()) {
            self.control_port = port;
        }
        if let Some(path) = var("ONAIR_PLAYLIST_FILE") {
            self.playlist_file = Some(PathBuf::from(path));
        }
        if let Some(token) = var("ONAIR_DISCOGS_TOKEN").filter(|t| !t.is_empty()) {
            self.discogs_token = Some(token);
        }
        if let Some(dir) = var("ONAIR_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Converts to onair-core's Config type.
    pub fn to_core_config(&self) -> Config {
        Config {
            bind_port: self.bind_port,
            control_port: self.control_port,
            playlist_file: self.playlist_file.clone(),
            data_dir: self.data_dir.clone(),
            provider: self.discogs_token.as_ref().map(|token| ProviderConfig {
                base_url: self.provider_base_url.clone(),
                token: token.clone(),
                timeout_secs: self.provider_timeout_secs,
            }),
            image_queue_delay_ms: self.image_queue_delay_ms,
            proxies: self.proxies.clone(),
        }
    }
}
