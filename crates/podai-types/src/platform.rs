//! Platform configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Adapter implementation selected for a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    /// Full-duplex WebSocket connection.
    #[serde(rename = "websocket")]
    WebSocket,
    /// One-shot HTTP POST per message.
    Webhook,
    /// In-process loopback sink.
    #[default]
    Generic,
}

impl PlatformKind {
    /// Returns the string label for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Webhook => "webhook",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "webhook" | "http" => Ok(Self::Webhook),
            "generic" => Ok(Self::Generic),
            _ => Err(format!("unknown platform kind: {}", s)),
        }
    }
}

/// Authentication scheme used against a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    ApiKey,
    Basic,
    Oauth2,
}

/// Authentication descriptor.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,
    /// Credential map (e.g. `token`, `api_key`, `username`, `password`).
    #[serde(default)]
    pub credentials: HashMap<String, String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry of the credentials in milliseconds since Unix epoch.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&String> = self.credentials.keys().collect();
        f.debug_struct("AuthConfig")
            .field("auth_type", &self.auth_type)
            .field("credentials", &keys)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Retry policy for establishing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay added per attempt (linear backoff).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Connection descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub endpoint: String,
    /// Deadline applied to every adapter call on the delivery path.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Rate-limit budget for outbound traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_limit: 10,
        }
    }
}

/// A conditional transform rule.
///
/// `condition` is written in the bridge's condition language, e.g.
/// `messageType === "urgent" && sender !== "system"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTransformRule {
    pub condition: String,
    /// Name of a function registered in the transform registry.
    pub transform: String,
}

/// Field-mapping tables and conditional rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMappings {
    /// Platform field → canonical field.
    #[serde(default)]
    pub inbound: HashMap<String, String>,
    /// Canonical field → platform field.
    #[serde(default)]
    pub outbound: HashMap<String, String>,
    #[serde(default)]
    pub custom_rules: Vec<CustomTransformRule>,
}

/// Capability flags advertised by a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// Maximum message size in bytes.
    pub max_message_size: usize,
    #[serde(default)]
    pub supports_attachments: bool,
    #[serde(default)]
    pub supports_encryption: bool,
    #[serde(default)]
    pub supports_presence: bool,
    #[serde(default)]
    pub supports_threads: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024,
            supports_attachments: false,
            supports_encryption: false,
            supports_presence: false,
            supports_threads: false,
        }
    }
}

/// Error classification policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHandlingPolicy {
    #[serde(default)]
    pub retryable_errors: Vec<String>,
    #[serde(default)]
    pub fatal_errors: Vec<String>,
    #[serde(default)]
    pub fallback_platform: Option<String>,
}

impl ErrorHandlingPolicy {
    /// Returns `true` if `code` is listed as retryable and not as fatal.
    pub fn is_retryable(&self, code: &str) -> bool {
        !self.fatal_errors.iter().any(|c| c == code)
            && self.retryable_errors.iter().any(|c| c == code)
    }
}

/// Static per-platform settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform_id: String,
    #[serde(default)]
    pub kind: PlatformKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub auth: AuthConfig,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub mappings: MessageMappings,
    #[serde(default)]
    pub capabilities: PlatformCapabilities,
    #[serde(default)]
    pub error_handling: ErrorHandlingPolicy,
}

fn default_enabled() -> bool {
    true
}

/// Reasons a [`PlatformConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigValidationError {
    #[error("platform id must not be empty")]
    EmptyPlatformId,
    #[error("connection endpoint must not be empty for platform {0}")]
    EmptyEndpoint(String),
    #[error("rate limits must be positive for platform {0}")]
    NonPositiveRateLimit(String),
    #[error("platform {0} is disabled")]
    Disabled(String),
    #[error("platform {0} cannot fall back to itself")]
    SelfFallback(String),
}

impl PlatformConfig {
    /// Creates a config with defaults for everything but id, kind and endpoint.
    pub fn new(platform_id: impl Into<String>, kind: PlatformKind, endpoint: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
            kind,
            enabled: true,
            auth: AuthConfig::default(),
            connection: ConnectionConfig {
                endpoint: endpoint.into(),
                timeout_ms: None,
                retry: RetryPolicy::default(),
            },
            rate_limit: RateLimitConfig::default(),
            mappings: MessageMappings::default(),
            capabilities: PlatformCapabilities::default(),
            error_handling: ErrorHandlingPolicy::default(),
        }
    }

    /// Checks the fields required before an adapter may be built.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.platform_id.trim().is_empty() {
            return Err(ConfigValidationError::EmptyPlatformId);
        }
        if self.connection.endpoint.trim().is_empty() {
            return Err(ConfigValidationError::EmptyEndpoint(self.platform_id.clone()));
        }
        if self.rate_limit.requests_per_minute == 0 || self.rate_limit.burst_limit == 0 {
            return Err(ConfigValidationError::NonPositiveRateLimit(
                self.platform_id.clone(),
            ));
        }
        if !self.enabled {
            return Err(ConfigValidationError::Disabled(self.platform_id.clone()));
        }
        if self.error_handling.fallback_platform.as_deref() == Some(self.platform_id.as_str()) {
            return Err(ConfigValidationError::SelfFallback(self.platform_id.clone()));
        }
        Ok(())
    }
}
