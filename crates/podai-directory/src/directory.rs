//! Directory of agents reachable across platforms: presence, per-platform
//! reputation, routing preference and discovery.

use crate::error::DirectoryError;
use chrono::Utc;
use podai_transform::Condition;
use podai_types::{
    CanonicalMessage, CommunicationRule, CrossPlatformAgentProfile, PlatformPresence,
    PlatformReputation,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Presence of an agent on one platform, as supplied at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRegistration {
    pub platform_id: String,
    pub external_id: String,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

fn default_online() -> bool {
    true
}

/// Request to register (or re-register) a chain identity across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub chain_identity: String,
    pub platforms: Vec<PresenceRegistration>,
    #[serde(default)]
    pub preferred_platforms: Vec<String>,
    #[serde(default)]
    pub fallback_platforms: Vec<String>,
    #[serde(default)]
    pub communication_rules: Vec<CommunicationRule>,
}

/// Discovery filters. Empty lists and `None` values do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryFilters {
    /// The agent must be online on at least one of these platforms.
    pub platforms: Vec<String>,
    /// The agent must advertise every one of these, on any platform.
    pub capabilities: Vec<String>,
    /// Match agents online (or offline) on any platform.
    pub online: Option<bool>,
    /// Minimum mean reputation score across platforms.
    pub min_reputation: Option<f64>,
    /// Maximum mean response time across platforms.
    pub max_response_time_ms: Option<f64>,
}

impl DiscoveryFilters {
    pub fn matches(&self, profile: &CrossPlatformAgentProfile) -> bool {
        if !self.platforms.is_empty() && !self.platforms.iter().any(|p| profile.is_online_on(p)) {
            return false;
        }
        if !self.capabilities.iter().all(|c| profile.has_capability(c)) {
            return false;
        }
        if let Some(online) = self.online {
            if profile.is_online_anywhere() != online {
                return false;
            }
        }
        if let Some(min) = self.min_reputation {
            if profile.average_reputation() < min {
                return false;
            }
        }
        if let Some(max) = self.max_response_time_ms {
            if profile.average_response_time_ms() > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub agents: Vec<CrossPlatformAgentProfile>,
    /// Matches before the limit was applied.
    pub total_found: usize,
    /// Online agent count per platform among `agents`.
    pub platform_distribution: BTreeMap<String, usize>,
}

/// In-memory map from chain identity to cross-platform profile.
#[derive(Debug, Default)]
pub struct AgentDirectory {
    profiles: RwLock<HashMap<String, CrossPlatformAgentProfile>>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CrossPlatformAgentProfile>> {
        match self.profiles.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("agent directory lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CrossPlatformAgentProfile>> {
        match self.profiles.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("agent directory lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registers an agent, or refreshes an existing one.
    ///
    /// Presence is replaced for every listed platform; presence on other
    /// platforms and all accumulated reputation are kept. Platforms seen for
    /// the first time start at neutral reputation.
    pub fn register(
        &self,
        registration: AgentRegistration,
    ) -> Result<CrossPlatformAgentProfile, DirectoryError> {
        if registration.chain_identity.trim().is_empty() {
            return Err(DirectoryError::InvalidRegistration(
                "chain identity must not be empty".to_string(),
            ));
        }
        if registration.platforms.is_empty() {
            return Err(DirectoryError::InvalidRegistration(
                "at least one platform presence is required".to_string(),
            ));
        }
        if let Some(p) = registration
            .platforms
            .iter()
            .find(|p| p.platform_id.trim().is_empty())
        {
            return Err(DirectoryError::InvalidRegistration(format!(
                "empty platform id for external id {}",
                p.external_id
            )));
        }

        let now = Utc::now();
        let mut profiles = self.write();
        let profile = profiles
            .entry(registration.chain_identity.clone())
            .or_insert_with(|| CrossPlatformAgentProfile {
                chain_identity: registration.chain_identity.clone(),
                presence: HashMap::new(),
                preferred_platforms: Vec::new(),
                fallback_platforms: Vec::new(),
                communication_rules: Vec::new(),
                reputation: HashMap::new(),
                registered_at: now,
            });

        for p in registration.platforms {
            profile.reputation.entry(p.platform_id.clone()).or_default();
            profile.presence.insert(
                p.platform_id.clone(),
                PlatformPresence {
                    platform_id: p.platform_id,
                    external_id: p.external_id,
                    online: p.online,
                    last_seen: now,
                    capabilities: p.capabilities,
                },
            );
        }
        profile.preferred_platforms = registration.preferred_platforms;
        profile.fallback_platforms = registration.fallback_platforms;
        profile.communication_rules = registration.communication_rules;

        tracing::info!(
            identity = %profile.chain_identity,
            platforms = profile.presence.len(),
            "registered cross-platform agent"
        );
        Ok(profile.clone())
    }

    pub fn get_profile(&self, identity: &str) -> Option<CrossPlatformAgentProfile> {
        self.read().get(identity).cloned()
    }

    pub fn remove_agent(&self, identity: &str) -> Option<CrossPlatformAgentProfile> {
        self.write().remove(identity)
    }

    /// Updates the online flag (and optionally the capability list) of one presence.
    pub fn update_presence(
        &self,
        identity: &str,
        platform_id: &str,
        online: bool,
        capabilities: Option<Vec<String>>,
    ) -> Result<(), DirectoryError> {
        let mut profiles = self.write();
        let profile = profiles
            .get_mut(identity)
            .ok_or_else(|| DirectoryError::AgentNotFound(identity.to_string()))?;
        let presence =
            profile
                .presence
                .get_mut(platform_id)
                .ok_or_else(|| DirectoryError::PresenceNotFound {
                    identity: identity.to_string(),
                    platform: platform_id.to_string(),
                })?;
        presence.online = online;
        presence.last_seen = Utc::now();
        if let Some(capabilities) = capabilities {
            presence.capabilities = capabilities;
        }
        Ok(())
    }

    /// Folds one interaction outcome into the agent's reputation on `platform_id`.
    ///
    /// Success moves the score 10% of the remaining distance toward 1.0;
    /// failure cuts it by 20%.
    pub fn record_interaction(
        &self,
        identity: &str,
        platform_id: &str,
        success: bool,
        response_time_ms: f64,
    ) -> Result<PlatformReputation, DirectoryError> {
        let mut profiles = self.write();
        let profile = profiles
            .get_mut(identity)
            .ok_or_else(|| DirectoryError::AgentNotFound(identity.to_string()))?;
        let rep = profile
            .reputation
            .entry(platform_id.to_string())
            .or_default();

        if success {
            rep.score += 0.1 * (1.0 - rep.score);
        } else {
            rep.score -= 0.2 * rep.score;
        }
        rep.interaction_count += 1;
        let n = rep.interaction_count as f64;
        let outcome = if success { 1.0 } else { 0.0 };
        rep.success_rate += (outcome - rep.success_rate) / n;
        rep.average_response_time_ms += (response_time_ms - rep.average_response_time_ms) / n;

        Ok(rep.clone())
    }

    /// Picks the platform to reach `identity` on for `message`.
    ///
    /// The highest-priority communication rule whose condition matches and
    /// whose platform has the agent online wins. Otherwise the first online
    /// preferred platform, then the first online fallback platform.
    pub fn preferred_platform_for(
        &self,
        identity: &str,
        message: &CanonicalMessage,
    ) -> Result<Option<String>, DirectoryError> {
        let profiles = self.read();
        let profile = profiles
            .get(identity)
            .ok_or_else(|| DirectoryError::AgentNotFound(identity.to_string()))?;

        let mut rules: Vec<&CommunicationRule> = profile.communication_rules.iter().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        if !rules.is_empty() {
            match message.to_object() {
                Ok(fields) => {
                    for rule in rules {
                        let matched = match Condition::parse(&rule.condition) {
                            Ok(condition) => condition.evaluate(&fields),
                            Err(e) => {
                                tracing::warn!(
                                    identity = %identity,
                                    condition = %rule.condition,
                                    error = %e,
                                    "ignoring communication rule"
                                );
                                false
                            }
                        };
                        if matched && profile.is_online_on(&rule.preferred_platform) {
                            return Ok(Some(rule.preferred_platform.clone()));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not serialize message for rule evaluation")
                }
            }
        }

        Ok(profile
            .preferred_platforms
            .iter()
            .chain(profile.fallback_platforms.iter())
            .find(|p| profile.is_online_on(p))
            .cloned())
    }

    /// Linear scan over all profiles.
    ///
    /// Results are ordered by chain identity. `total_found` counts every
    /// match; `agents` holds at most `limit` of them.
    pub fn discover(&self, filters: &DiscoveryFilters, limit: usize) -> DiscoveryResult {
        let profiles = self.read();
        let mut matched: Vec<&CrossPlatformAgentProfile> =
            profiles.values().filter(|p| filters.matches(p)).collect();
        matched.sort_by(|a, b| a.chain_identity.cmp(&b.chain_identity));
        let total_found = matched.len();

        let agents: Vec<CrossPlatformAgentProfile> =
            matched.into_iter().take(limit).cloned().collect();

        let mut platform_distribution = BTreeMap::new();
        for agent in &agents {
            for presence in agent.presence.values().filter(|p| p.online) {
                *platform_distribution
                    .entry(presence.platform_id.clone())
                    .or_insert(0) += 1;
            }
        }

        DiscoveryResult {
            agents,
            total_found,
            platform_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(platform: &str, online: bool, caps: &[&str]) -> PresenceRegistration {
        PresenceRegistration {
            platform_id: platform.to_string(),
            external_id: format!("{}-user", platform),
            online,
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn registration(identity: &str, platforms: Vec<PresenceRegistration>) -> AgentRegistration {
        AgentRegistration {
            chain_identity: identity.to_string(),
            platforms,
            preferred_platforms: Vec::new(),
            fallback_platforms: Vec::new(),
            communication_rules: Vec::new(),
        }
    }

    #[test]
    fn registration_starts_neutral() {
        let dir = AgentDirectory::new();
        let profile = dir
            .register(registration("agent1", vec![presence("discord", true, &["chat"])]))
            .unwrap();
        assert_eq!(profile.reputation["discord"].score, 0.5);
        assert_eq!(profile.reputation["discord"].interaction_count, 0);
        assert_eq!(profile.average_reputation(), 0.5);
    }

    #[test]
    fn invalid_registrations_are_rejected() {
        let dir = AgentDirectory::new();
        assert!(matches!(
            dir.register(registration(" ", vec![presence("discord", true, &[])])),
            Err(DirectoryError::InvalidRegistration(_))
        ));
        assert!(matches!(
            dir.register(registration("agent1", vec![])),
            Err(DirectoryError::InvalidRegistration(_))
        ));
        assert!(dir.is_empty());
    }

    #[test]
    fn reregistration_keeps_reputation() {
        let dir = AgentDirectory::new();
        dir.register(registration("agent1", vec![presence("discord", true, &[])]))
            .unwrap();
        dir.record_interaction("agent1", "discord", true, 100.0)
            .unwrap();
        let profile = dir
            .register(registration("agent1", vec![presence("slack", false, &[])]))
            .unwrap();
        assert_eq!(profile.presence.len(), 2);
        assert_eq!(profile.reputation["discord"].interaction_count, 1);
        assert_eq!(profile.reputation["slack"].score, 0.5);
    }

    #[test]
    fn reputation_moves_like_handshake_scoring() {
        let dir = AgentDirectory::new();
        dir.register(registration("agent1", vec![presence("discord", true, &[])]))
            .unwrap();

        let rep = dir
            .record_interaction("agent1", "discord", true, 100.0)
            .unwrap();
        assert!((rep.score - 0.55).abs() < 1e-9);

        let rep = dir
            .record_interaction("agent1", "discord", false, 300.0)
            .unwrap();
        assert!((rep.score - 0.44).abs() < 1e-9);
        assert_eq!(rep.interaction_count, 2);
        assert!((rep.success_rate - 0.5).abs() < 1e-9);
        assert!((rep.average_response_time_ms - 200.0).abs() < 1e-9);

        assert_eq!(
            dir.record_interaction("ghost", "discord", true, 1.0),
            Err(DirectoryError::AgentNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn presence_updates() {
        let dir = AgentDirectory::new();
        dir.register(registration("agent1", vec![presence("discord", true, &["chat"])]))
            .unwrap();
        dir.update_presence("agent1", "discord", false, Some(vec!["voice".to_string()]))
            .unwrap();
        let profile = dir.get_profile("agent1").unwrap();
        assert!(!profile.is_online_anywhere());
        assert!(profile.has_capability("voice"));
        assert!(!profile.has_capability("chat"));

        assert!(matches!(
            dir.update_presence("agent1", "telegram", true, None),
            Err(DirectoryError::PresenceNotFound { .. })
        ));
    }

    #[test]
    fn preferred_platform_resolution() {
        let dir = AgentDirectory::new();
        let mut reg = registration(
            "agent1",
            vec![
                presence("discord", false, &[]),
                presence("slack", true, &[]),
                presence("telegram", true, &[]),
            ],
        );
        reg.preferred_platforms = vec!["discord".to_string(), "slack".to_string()];
        reg.fallback_platforms = vec!["telegram".to_string()];
        reg.communication_rules = vec![
            CommunicationRule {
                condition: r#"messageType === "urgent""#.to_string(),
                preferred_platform: "telegram".to_string(),
                priority: 10,
            },
            CommunicationRule {
                condition: r#"messageType === "urgent""#.to_string(),
                preferred_platform: "discord".to_string(),
                priority: 20,
            },
        ];
        dir.register(reg).unwrap();

        let urgent = CanonicalMessage::new("m", "s", "p", "urgent");
        // discord has higher priority but is offline
        assert_eq!(
            dir.preferred_platform_for("agent1", &urgent).unwrap(),
            Some("telegram".to_string())
        );

        let text = CanonicalMessage::new("m", "s", "p", "text");
        assert_eq!(
            dir.preferred_platform_for("agent1", &text).unwrap(),
            Some("slack".to_string())
        );

        dir.update_presence("agent1", "slack", false, None).unwrap();
        assert_eq!(
            dir.preferred_platform_for("agent1", &text).unwrap(),
            Some("telegram".to_string())
        );
    }
}
