//! HTTP handlers.

use crate::error::BridgeError;
use crate::service::SendOptions;
use crate::tracker::CrossPlatformEnvelope;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use podai_adapters::HealthStatus;
use podai_directory::{AgentRegistration, DirectoryError, DiscoveryFilters, DiscoveryResult};
use podai_types::CrossPlatformAgentProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Default number of agents returned by discovery.
pub const DEFAULT_DISCOVERY_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::EnvelopeNotFound(_)
            | BridgeError::AdapterNotFound(_)
            | BridgeError::Directory(DirectoryError::AgentNotFound(_))
            | BridgeError::Directory(DirectoryError::PresenceNotFound { .. }) => {
                ApiError::NotFound(e.to_string())
            }
            BridgeError::Configuration { .. }
            | BridgeError::Directory(DirectoryError::InvalidRegistration(_)) => {
                ApiError::BadRequest(e.to_string())
            }
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlatformsResponse {
    pub platforms: Vec<String>,
}

/// Handler for `GET /api/platforms`.
pub async fn list_platforms_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<PlatformsResponse> {
    Json(PlatformsResponse {
        platforms: state.bridge.platforms().await,
    })
}

/// Handler for `GET /api/platforms/health`.
pub async fn platform_health_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<BTreeMap<String, HealthStatus>> {
    Json(state.bridge.get_platform_health().await)
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender: String,
    pub payload: String,
    pub target_platforms: Vec<String>,
    #[serde(default)]
    pub options: SendOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub envelope_id: String,
    pub message_id: String,
    pub statuses: BTreeMap<String, String>,
}

/// Handler for `POST /api/messages`.
pub async fn send_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    if payload.sender.trim().is_empty() {
        return Err(ApiError::BadRequest("sender must not be empty".to_string()));
    }

    let receipt = state
        .bridge
        .send_cross_platform_message(
            &payload.sender,
            &payload.payload,
            &payload.target_platforms,
            payload.options,
        )
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(SendMessageResponse {
            envelope_id: receipt.envelope_id,
            message_id: receipt.message_id,
            statuses: receipt.statuses,
        }),
    ))
}

/// Handler for `GET /api/envelopes/{envelopeId}`.
pub async fn get_envelope_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(envelope_id): Path<String>,
) -> Result<Json<CrossPlatformEnvelope>, ApiError> {
    Ok(Json(state.bridge.envelope(&envelope_id).await?))
}

/// Handler for `POST /api/agents`.
pub async fn register_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(registration): Json<AgentRegistration>,
) -> Result<(StatusCode, Json<CrossPlatformAgentProfile>), ApiError> {
    let profile = state.bridge.register_cross_platform_agent(registration)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Handler for `GET /api/agents/{identity}`.
pub async fn get_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(identity): Path<String>,
) -> Result<Json<CrossPlatformAgentProfile>, ApiError> {
    Ok(Json(state.bridge.agent_profile(&identity)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub filters: DiscoveryFilters,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Handler for `POST /api/agents/discover`.
pub async fn discover_agents_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<DiscoverRequest>,
) -> Json<DiscoveryResult> {
    let limit = request.limit.unwrap_or(DEFAULT_DISCOVERY_LIMIT);
    Json(
        state
            .bridge
            .discover_cross_platform_agents(&request.filters, limit),
    )
}
