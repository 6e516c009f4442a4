//! Shared types for the podAI cross-platform bridge.
//!
//! This crate provides the data model used across all bridge crates: platform
//! configuration, the canonical message and its routing statuses, and the
//! cross-platform agent profile.
//!
//! No crate in the workspace depends on anything *except* `podai-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod agent;
mod message;
mod platform;

pub use agent::{
    CommunicationRule, CrossPlatformAgentProfile, PlatformPresence, PlatformReputation,
    NEUTRAL_REPUTATION,
};
pub use message::{
    CanonicalMessage, DeliveryGuarantee, DeliveryStatus, OutboundMessage, RouteStatus,
    Transformation, DEFAULT_ACK_TIMEOUT_MS, DEFAULT_MAX_RETRIES,
};
pub use platform::{
    AuthConfig, AuthType, ConfigValidationError, ConnectionConfig, CustomTransformRule,
    ErrorHandlingPolicy, MessageMappings, PlatformCapabilities, PlatformConfig, PlatformKind,
    RateLimitConfig, RetryPolicy,
};
