//! Error types for the bridge service.

use podai_adapters::AdapterError;
use podai_directory::DirectoryError;
use podai_transform::TransformError;
use podai_types::ConfigValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Platform configuration rejected at registration.
    #[error("invalid configuration for platform {platform}: {source}")]
    Configuration {
        platform: String,
        #[source]
        source: ConfigValidationError,
    },

    /// The adapter connected but reported itself unhealthy.
    #[error("platform {platform} is unhealthy after connect: {reason}")]
    PlatformUnhealthy { platform: String, reason: String },

    #[error("no adapter registered for platform {0}")]
    AdapterNotFound(String),

    #[error("failed to connect platform {platform} after {attempts} attempt(s): {source}")]
    ConnectionFailed {
        platform: String,
        attempts: u32,
        #[source]
        source: AdapterError,
    },

    /// Building the adapter failed before any connection attempt.
    #[error("failed to build adapter for platform {platform}: {source}")]
    Adapter {
        platform: String,
        #[source]
        source: AdapterError,
    },

    /// The adapter reported a failed send.
    #[error("delivery to {platform} failed: {reason}")]
    DeliveryFailed { platform: String, reason: String },

    #[error("platform {platform} did not answer within {timeout_ms} ms")]
    Timeout { platform: String, timeout_ms: u64 },

    #[error("rate limit exceeded for platform {platform} ({limit} requests per minute)")]
    RateLimited { platform: String, limit: u32 },

    #[error("message of {size} bytes exceeds the {limit} byte limit of platform {platform}")]
    MessageTooLarge {
        platform: String,
        size: usize,
        limit: usize,
    },

    #[error("envelope not found: {0}")]
    EnvelopeNotFound(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
