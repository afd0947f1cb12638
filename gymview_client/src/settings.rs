//! Layered configuration with environment variable support and validation.

use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::metrics::DEFAULT_HISTORY_CAPACITY;

/// Where the training backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub api_url: String,
    pub ws_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api/v1".to_string(),
            ws_url: "ws://localhost:8000".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

/// Push-channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub connect_timeout_seconds: u64,
    pub max_reconnect_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub event_buffer: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            max_reconnect_attempts: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            event_buffer: 1_024,
        }
    }
}

impl ChannelSettings {
    pub fn to_channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            max_reconnect_attempts: self.max_reconnect_attempts,
            base_backoff_ms: self.base_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
            event_buffer: self.event_buffer,
        }
    }
}

/// Store bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub history_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main settings structure with all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub backend: BackendConfig,
    pub channel: ChannelSettings,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings: defaults, then an optional `gymview.toml`, then
    /// environment variables with a `GYMVIEW__` prefix.
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("gymview").required(false))
            .add_source(
                Environment::with_prefix("GYMVIEW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.backend.api_url.is_empty() {
            return Err(anyhow!("backend.api_url cannot be empty"));
        }
        if !self.backend.ws_url.starts_with("ws://") && !self.backend.ws_url.starts_with("wss://") {
            return Err(anyhow!(
                "backend.ws_url must use a ws:// or wss:// scheme, got '{}'",
                self.backend.ws_url
            ));
        }
        if self.backend.request_timeout_seconds == 0 {
            return Err(anyhow!("backend.request_timeout_seconds cannot be 0"));
        }
        if self.store.history_capacity == 0 {
            return Err(anyhow!("store.history_capacity cannot be 0"));
        }
        if self.channel.max_backoff_ms < self.channel.base_backoff_ms {
            return Err(anyhow!(
                "channel.max_backoff_ms ({}) cannot be below channel.base_backoff_ms ({})",
                self.channel.max_backoff_ms,
                self.channel.base_backoff_ms
            ));
        }
        Ok(())
    }
}
