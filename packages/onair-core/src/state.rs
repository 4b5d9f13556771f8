//! Core configuration types.
//!
//! [`Config`] is what the composition root needs to wire services. Front
//! ends (the standalone server) build it from their own file/env/CLI layers
//! and hand it over validated.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metadata::DiscogsConfig;
use crate::protocol_constants::{
    APP_NAME, DEFAULT_BIND_PORT, DEFAULT_CONTROL_PORT, DEFAULT_IMAGE_QUEUE_DELAY_MS,
    DEFAULT_PROVIDER_BASE_URL, DEFAULT_PROVIDER_TIMEOUT_SECS,
};

/// Metadata provider settings. Absent means no provider is used.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Personal access token.
    pub token: String,
    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Creates provider settings with the default endpoint and timeout.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            token: token.into(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Client settings for the Discogs API.
    pub fn discogs(&self) -> DiscogsConfig {
        DiscogsConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            token: self.token.clone(),
            user_agent: format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Configuration for the on-air push service.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    // Server
    /// Port for the HTTP/WS server (0 = ephemeral).
    pub bind_port: u16,

    /// Loopback UDP port for control datagrams (0 = ephemeral).
    pub control_port: u16,

    // Collaborators
    /// YAML playlist fixture. Without it the playlist starts empty.
    pub playlist_file: Option<PathBuf>,

    /// Directory for the persisted artwork index. Without it the cache is
    /// memory-only.
    pub data_dir: Option<PathBuf>,

    /// Metadata provider. Without it no artwork is resolved.
    pub provider: Option<ProviderConfig>,

    // Image queue
    /// Delay between provider jobs (milliseconds).
    pub image_queue_delay_ms: u64,

    // Fan-out
    /// Downstream WebSocket URLs every broadcast is mirrored to.
    pub proxies: Vec<String>,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.image_queue_delay_ms == 0 {
            return Err("image_queue_delay_ms must be >= 1".to_string());
        }
        if let Some(provider) = &self.provider {
            if provider.timeout_secs == 0 {
                return Err("provider timeout must be >= 1 second".to_string());
            }
            if provider.token.trim().is_empty() {
                return Err("provider token must not be empty".to_string());
            }
            if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                return Err(format!(
                    "provider base URL must be http(s): {}",
                    provider.base_url
                ));
            }
        }
        for url in &self.proxies {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(format!("proxy URL must be ws(s): {}", url));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn image_queue_delay(&self) -> Duration {
        Duration::from_millis(self.image_queue_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_port: DEFAULT_BIND_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            playlist_file: None,
            data_dir: None,
            provider: None,
            image_queue_delay_ms: DEFAULT_IMAGE_QUEUE_DELAY_MS,
            proxies: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_is_sensible() {
        let config = Config::default();
        assert_eq!(config.bind_port, 8888);
        assert_eq!(config.control_port, 5111);
        assert!(config.provider.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_zero_delay_and_timeout() {
        let config = Config {
            image_queue_delay_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut provider = ProviderConfig::with_token("abc");
        provider.timeout_secs = 0;
        let config = Config {
            provider: Some(provider),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_non_websocket_proxy() {
        let config = Config {
            proxies: vec!["http://relay.example/push".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            proxies: vec!["ws://relay.example/push/onair".into()],
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn discogs_settings_carry_user_agent() {
        let mut provider = ProviderConfig::with_token("abc");
        provider.base_url = "https://api.discogs.com/".into();
        let discogs = provider.discogs();
        assert_eq!(discogs.base_url, "https://api.discogs.com");
        assert!(discogs.user_agent.starts_with("OnAirPush/"));
    }
}
