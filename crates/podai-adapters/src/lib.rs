//! Platform adapters for the podAI cross-platform bridge.
//!
//! An adapter connects the bridge to one external platform and exposes the
//! same capability set regardless of transport: connect/disconnect, a
//! connection predicate, send, pull-based receive, health reporting, and
//! optional presence and custom-request hooks.
//!
//! # Variants
//!
//! | Kind | Adapter | Transport |
//! |------|---------|-----------|
//! | `websocket` | [`WebSocketAdapter`] | full-duplex socket, send gated on connection state |
//! | `webhook` | [`WebhookAdapter`] | one JSON `POST` per message, always connected |
//! | `generic` | [`GenericAdapter`] | in-process loopback, safe default |
//!
//! Adapters are selected through an [`AdapterFactory`], which maps a
//! [`podai_types::PlatformKind`] to a builder closure.

mod adapter;
mod error;
mod factory;
mod generic;
mod stats;
mod webhook;
mod websocket;

pub use adapter::{HealthStatus, InboundMessage, PlatformAdapter, PresenceInfo, SendOutcome};
pub use error::AdapterError;
pub use factory::{AdapterBuilder, AdapterFactory};
pub use generic::{GenericAdapter, MAX_BUFFERED_MESSAGES};
pub use stats::UNHEALTHY_ERROR_RATE;
pub use webhook::WebhookAdapter;
pub use websocket::WebSocketAdapter;
