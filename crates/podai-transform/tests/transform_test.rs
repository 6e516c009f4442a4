use podai_transform::{MessageTransformer, TransformRegistry};
use podai_types::{CanonicalMessage, CustomTransformRule, PlatformConfig, PlatformKind};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn escalation_config() -> PlatformConfig {
    let mut config = PlatformConfig::new("pager", PlatformKind::Webhook, "https://pager.example");
    config.mappings.custom_rules.push(CustomTransformRule {
        condition: r#"messageType === "urgent""#.to_string(),
        transform: "escalate".to_string(),
    });
    config
}

fn counting_transformer(calls: Arc<AtomicUsize>) -> MessageTransformer {
    let mut registry = TransformRegistry::new();
    registry.register("escalate", move |mut body, _ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        body.insert("priority".to_string(), Value::String("high".to_string()));
        Ok(body)
    });
    MessageTransformer::new(registry)
}

#[test]
fn test_matching_rule_applies_its_function_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transformer = counting_transformer(calls.clone());
    let config = escalation_config();

    let urgent = CanonicalMessage::new("m-1", "sender", "disk full", "urgent");
    let out = transformer
        .transform_for_platform(&urgent, "pager", Some(&config))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(out.message.body["priority"], "high");
    assert_eq!(out.transformations.len(), 1);
    assert_eq!(out.transformations[0].to_format, "pager:escalate");
    assert_eq!(
        out.transformations[0].diff,
        Some(vec!["priority".to_string()])
    );
}

#[test]
fn test_non_matching_rule_is_not_applied() {
    let calls = Arc::new(AtomicUsize::new(0));
    let transformer = counting_transformer(calls.clone());
    let config = escalation_config();

    let chat = CanonicalMessage::new("m-2", "sender", "hello", "text");
    let out = transformer
        .transform_for_platform(&chat, "pager", Some(&config))
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!out.message.body.contains_key("priority"));
    assert!(out.transformations.is_empty());
}

#[test]
fn test_metadata_and_compound_conditions() {
    let mut config = PlatformConfig::new("chat", PlatformKind::Generic, "memory://");
    config.mappings.custom_rules.push(CustomTransformRule {
        condition: r#"messageType === "alert" || messageType === "text" && sender !== "system""#
            .to_string(),
        transform: "tag_platform".to_string(),
    });
    let transformer = MessageTransformer::default();

    let from_user = CanonicalMessage::new("m-3", "user", "hi", "text");
    let out = transformer
        .transform_for_platform(&from_user, "chat", Some(&config))
        .unwrap();
    assert_eq!(out.message.body["platform"], "chat");

    let from_system = CanonicalMessage::new("m-4", "system", "hi", "text");
    let out = transformer
        .transform_for_platform(&from_system, "chat", Some(&config))
        .unwrap();
    assert!(!out.message.body.contains_key("platform"));

    let alert = CanonicalMessage::new("m-5", "system", "hi", "alert");
    let out = transformer
        .transform_for_platform(&alert, "chat", Some(&config))
        .unwrap();
    assert_eq!(out.message.body["platform"], "chat");
}
