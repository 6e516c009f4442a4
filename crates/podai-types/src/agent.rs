//! Cross-platform agent profile types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reputation score assigned to an agent with no interactions on a platform.
pub const NEUTRAL_REPUTATION: f64 = 0.5;

/// Presence snapshot of one agent on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformPresence {
    pub platform_id: String,
    /// Identifier of the agent on the external platform.
    pub external_id: String,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Conditional routing preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationRule {
    /// Condition in the bridge's condition language, evaluated against a message.
    pub condition: String,
    pub preferred_platform: String,
    pub priority: u32,
}

/// Reputation of an agent on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformReputation {
    pub score: f64,
    pub interaction_count: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}

impl Default for PlatformReputation {
    fn default() -> Self {
        Self {
            score: NEUTRAL_REPUTATION,
            interaction_count: 0,
            success_rate: 0.0,
            average_response_time_ms: 0.0,
        }
    }
}

/// One chain identity mapped onto every platform it is present on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPlatformAgentProfile {
    pub chain_identity: String,
    /// Presence keyed by platform id.
    pub presence: HashMap<String, PlatformPresence>,
    #[serde(default)]
    pub preferred_platforms: Vec<String>,
    #[serde(default)]
    pub fallback_platforms: Vec<String>,
    #[serde(default)]
    pub communication_rules: Vec<CommunicationRule>,
    /// Reputation keyed by platform id.
    #[serde(default)]
    pub reputation: HashMap<String, PlatformReputation>,
    pub registered_at: DateTime<Utc>,
}

impl CrossPlatformAgentProfile {
    /// Returns `true` if the agent is online on at least one platform.
    pub fn is_online_anywhere(&self) -> bool {
        self.presence.values().any(|p| p.online)
    }

    /// Returns `true` if the agent is online on `platform_id`.
    pub fn is_online_on(&self, platform_id: &str) -> bool {
        self.presence
            .get(platform_id)
            .map(|p| p.online)
            .unwrap_or(false)
    }

    /// Returns `true` if any platform presence lists `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.presence
            .values()
            .any(|p| p.capabilities.iter().any(|c| c == capability))
    }

    /// Mean reputation score across platforms, or the neutral score when none exist.
    pub fn average_reputation(&self) -> f64 {
        if self.reputation.is_empty() {
            return NEUTRAL_REPUTATION;
        }
        self.reputation.values().map(|r| r.score).sum::<f64>() / self.reputation.len() as f64
    }

    /// Mean of per-platform average response times, or `0.0` when none exist.
    pub fn average_response_time_ms(&self) -> f64 {
        if self.reputation.is_empty() {
            return 0.0;
        }
        self.reputation
            .values()
            .map(|r| r.average_response_time_ms)
            .sum::<f64>()
            / self.reputation.len() as f64
    }
}
