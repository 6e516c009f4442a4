//! podAI cross-platform message bridge.
//!
//! Routes one canonical message to many external platforms through
//! pluggable adapters, tracks per-target delivery, and keeps a directory of
//! agents reachable across platforms.

pub mod api;
pub mod background;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod registry;
pub mod service;
pub mod tracker;

pub use background::BackgroundTasks;
pub use error::BridgeError;
pub use registry::RegisteredPlatform;
pub use service::{BridgeService, SendOptions, SendReceipt, QUEUED};
pub use tracker::{CrossPlatformEnvelope, DeliveryTracking, EnvelopeReport, RoutingEntry};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum accepted request body size in bytes.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub bridge: BridgeService,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/platforms", get(api::list_platforms_handler))
        .route("/api/platforms/health", get(api::platform_health_handler))
        .route("/api/messages", post(api::send_message_handler))
        .route(
            "/api/envelopes/{envelopeId}",
            get(api::get_envelope_handler),
        )
        .route("/api/agents", post(api::register_agent_handler))
        .route("/api/agents/discover", post(api::discover_agents_handler))
        .route("/api/agents/{identity}", get(api::get_agent_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
