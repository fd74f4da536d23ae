//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (SLACKLINE_*)
//! - TOML configuration file
//! - A config path given as the first command line argument

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use slackline_core::{DecodeFailurePolicy, SessionConfig, DEFAULT_MAX_PENDING_COMMANDS};
use slackline_transport::{WebSocketConfig, DEFAULT_API_BASE};
use std::path::Path;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bootstrap API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Realtime stream settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Bootstrap API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the web API.
    #[serde(default = "default_api_base")]
    pub base_url: String,

    /// Bot or user token.
    #[serde(default = "default_token")]
    pub token: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Realtime stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// WebSocket connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Keepalive ping interval in milliseconds (0 disables).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ms: u64,

    /// Unacknowledged commands tracked before the oldest are dropped.
    #[serde(default = "default_max_pending_commands")]
    pub max_pending_commands: usize,

    /// Decode failure handling (`"report"` or `"close"`).
    #[serde(default)]
    pub decode_failure: DecodeFailurePolicy,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_api_base() -> String {
    std::env::var("SLACKLINE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
}

fn default_token() -> Option<String> {
    std::env::var("SLACKLINE_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_connect_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_ping_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_max_pending_commands() -> usize {
    DEFAULT_MAX_PENDING_COMMANDS
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            token: default_token(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            connect_timeout_ms: default_connect_timeout(),
            ping_interval_ms: default_ping_interval(),
            max_pending_commands: default_max_pending_commands(),
            decode_failure: DecodeFailurePolicy::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "slackline.toml",
            "/etc/slackline/slackline.toml",
            "~/.config/slackline/slackline.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        // The environment wins over a token left in a shared file.
        if let Some(token) = default_token() {
            config.api.token = Some(token);
        }
        Ok(config)
    }

    /// The API token.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured.
    pub fn token(&self) -> Result<&str> {
        match self.api.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!("No API token configured; set SLACKLINE_TOKEN or api.token"),
        }
    }

    /// Session settings.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            decode_failure: self.stream.decode_failure,
            ping_interval: Duration::from_millis(self.stream.ping_interval_ms),
            max_pending_commands: self.stream.max_pending_commands,
        }
    }

    /// WebSocket transport settings.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: self.stream.max_message_size,
            connect_timeout: Duration::from_millis(self.stream.connect_timeout_ms),
        }
    }
}
