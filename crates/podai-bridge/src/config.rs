//! Daemon configuration loading from file and environment variables.

use podai_types::PlatformConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Delivery and monitoring settings.
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Platforms registered at startup.
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "podai_bridge=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Runtime settings of the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeSettings {
    /// Period of the background drain tick, in addition to enqueue wake-ups.
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,

    /// Period of the adapter health monitor.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    /// Deadline for one adapter send when the platform sets no `timeout_ms`.
    #[serde(default = "default_send_timeout_ms")]
    pub default_send_timeout_ms: u64,

    /// Completed envelopes kept for status queries; oldest evicted first.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_drain_interval_ms() -> u64 {
    1000
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

fn default_history_limit() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            drain_interval_ms: default_drain_interval_ms(),
            health_interval_secs: default_health_interval_secs(),
            default_send_timeout_ms: default_send_timeout_ms(),
            history_limit: default_history_limit(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PODAI_HOST` overrides `server.host`
/// - `PODAI_PORT` overrides `server.port`
/// - `PODAI_LOG_LEVEL` overrides `logging.level`
/// - `PODAI_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PODAI_DRAIN_INTERVAL_MS` overrides `bridge.drain_interval_ms`
/// - `PODAI_HEALTH_INTERVAL_SECS` overrides `bridge.health_interval_secs`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `PODAI_*` overrides using `lookup` as the variable source.
/// Unparseable values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(parsed) = lookup("PODAI_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = lookup("PODAI_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(level) = lookup("PODAI_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("PODAI_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(parsed) = lookup("PODAI_DRAIN_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.bridge.drain_interval_ms = parsed;
    }
    if let Some(parsed) = lookup("PODAI_HEALTH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.bridge.health_interval_secs = parsed;
    }
}
