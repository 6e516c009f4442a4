use podai_directory::{AgentDirectory, AgentRegistration, DiscoveryFilters, PresenceRegistration};

fn presence(platform: &str, online: bool, caps: &[&str]) -> PresenceRegistration {
    PresenceRegistration {
        platform_id: platform.to_string(),
        external_id: format!("ext-{}", platform),
        online,
        capabilities: caps.iter().map(|c| c.to_string()).collect(),
    }
}

fn register(dir: &AgentDirectory, identity: &str, platforms: Vec<PresenceRegistration>) {
    dir.register(AgentRegistration {
        chain_identity: identity.to_string(),
        platforms,
        preferred_platforms: Vec::new(),
        fallback_platforms: Vec::new(),
        communication_rules: Vec::new(),
    })
    .unwrap();
}

/// Three agents:
/// - alice: online on discord + slack, capabilities trade/chat
/// - bob: online on discord only, capability chat
/// - carol: offline everywhere, capability trade
fn seeded() -> AgentDirectory {
    let dir = AgentDirectory::new();
    register(
        &dir,
        "alice",
        vec![
            presence("discord", true, &["chat"]),
            presence("slack", true, &["trade"]),
        ],
    );
    register(&dir, "bob", vec![presence("discord", true, &["chat"])]);
    register(&dir, "carol", vec![presence("telegram", false, &["trade"])]);
    dir
}

fn identities(result: &podai_directory::DiscoveryResult) -> Vec<&str> {
    result
        .agents
        .iter()
        .map(|a| a.chain_identity.as_str())
        .collect()
}

#[test]
fn test_discover_without_filters_returns_everyone_sorted() {
    let dir = seeded();
    let result = dir.discover(&DiscoveryFilters::default(), 10);
    assert_eq!(identities(&result), vec!["alice", "bob", "carol"]);
    assert_eq!(result.total_found, 3);
    assert_eq!(result.platform_distribution.get("discord"), Some(&2));
    assert_eq!(result.platform_distribution.get("slack"), Some(&1));
    assert_eq!(result.platform_distribution.get("telegram"), None);
}

#[test]
fn test_limit_zero_reports_total() {
    let dir = seeded();
    let result = dir.discover(&DiscoveryFilters::default(), 0);
    assert!(result.agents.is_empty());
    assert_eq!(result.total_found, 3);
    assert!(result.platform_distribution.is_empty());
}

#[test]
fn test_histogram_counts_only_returned_agents() {
    let dir = seeded();
    let result = dir.discover(&DiscoveryFilters::default(), 1);
    assert_eq!(identities(&result), vec!["alice"]);
    assert_eq!(result.total_found, 3);
    assert_eq!(result.platform_distribution.get("discord"), Some(&1));
    assert_eq!(result.platform_distribution.get("slack"), Some(&1));
}

#[test]
fn test_platform_and_capability_filters() {
    let dir = seeded();

    let filters = DiscoveryFilters {
        platforms: vec!["slack".to_string(), "telegram".to_string()],
        ..Default::default()
    };
    assert_eq!(identities(&dir.discover(&filters, 10)), vec!["alice"]);

    // Capabilities may be spread across platforms.
    let filters = DiscoveryFilters {
        capabilities: vec!["chat".to_string(), "trade".to_string()],
        ..Default::default()
    };
    assert_eq!(identities(&dir.discover(&filters, 10)), vec!["alice"]);

    let filters = DiscoveryFilters {
        capabilities: vec!["trade".to_string()],
        ..Default::default()
    };
    assert_eq!(identities(&dir.discover(&filters, 10)), vec!["alice", "carol"]);
}

#[test]
fn test_online_and_reputation_filters() {
    let dir = seeded();

    let offline = DiscoveryFilters {
        online: Some(false),
        ..Default::default()
    };
    assert_eq!(identities(&dir.discover(&offline, 10)), vec!["carol"]);

    dir.record_interaction("bob", "discord", true, 50.0).unwrap();
    dir.record_interaction("carol", "telegram", false, 900.0)
        .unwrap();

    let reputable = DiscoveryFilters {
        min_reputation: Some(0.5),
        ..Default::default()
    };
    assert_eq!(identities(&dir.discover(&reputable, 10)), vec!["alice", "bob"]);

    let fast = DiscoveryFilters {
        max_response_time_ms: Some(100.0),
        ..Default::default()
    };
    // alice has no interactions, so her mean response time is zero.
    assert_eq!(identities(&dir.discover(&fast, 10)), vec!["alice", "bob"]);
}

#[test]
fn test_removed_agents_are_not_discovered() {
    let dir = seeded();
    assert!(dir.remove_agent("bob").is_some());
    assert!(dir.remove_agent("bob").is_none());
    let result = dir.discover(&DiscoveryFilters::default(), 10);
    assert_eq!(identities(&result), vec!["alice", "carol"]);
}
