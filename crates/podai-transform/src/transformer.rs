//! Canonical-to-platform message shaping: outbound field mapping, conditional
//! custom rules, and inbound field renaming.

use crate::condition::Condition;
use crate::error::TransformError;
use crate::functions::{TransformContext, TransformRegistry};
use chrono::Utc;
use podai_types::{CanonicalMessage, OutboundMessage, PlatformConfig, Transformation};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Format name used for the canonical side of a transformation record.
pub const CANONICAL_FORMAT: &str = "canonical";

/// A transformed message together with the transformations applied to it.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub message: OutboundMessage,
    pub transformations: Vec<Transformation>,
}

/// Converts canonical messages to and from platform-specific shapes.
#[derive(Debug, Clone, Default)]
pub struct MessageTransformer {
    registry: TransformRegistry,
}

impl MessageTransformer {
    pub fn new(registry: TransformRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TransformRegistry {
        &mut self.registry
    }

    /// Shapes `message` for `platform_id`.
    ///
    /// Without a config the canonical object passes through unchanged. With
    /// one, outbound mappings are copied first and custom rules then run in
    /// order against the mapped body. Rules with a malformed condition or an
    /// unknown function are skipped. Only serializing the canonical message
    /// can fail.
    pub fn transform_for_platform(
        &self,
        message: &CanonicalMessage,
        platform_id: &str,
        config: Option<&PlatformConfig>,
    ) -> Result<TransformOutput, TransformError> {
        let canonical = message.to_object()?;
        let config = match config {
            Some(config) => config,
            None => {
                debug!(platform = %platform_id, "no platform config, passing message through");
                return Ok(TransformOutput {
                    message: OutboundMessage {
                        platform_id: platform_id.to_string(),
                        canonical_id: message.id.clone(),
                        body: canonical,
                    },
                    transformations: Vec::new(),
                });
            }
        };

        let mut transformations = Vec::new();
        let mut body = canonical.clone();

        let mut outbound: Vec<(&String, &String)> = config.mappings.outbound.iter().collect();
        outbound.sort();
        let mut mapped = Vec::new();
        for (canonical_field, platform_field) in outbound {
            if let Some(value) = canonical.get(canonical_field) {
                body.insert(platform_field.clone(), value.clone());
                mapped.push(platform_field.clone());
            }
        }
        if !mapped.is_empty() {
            transformations.push(Transformation {
                from_format: CANONICAL_FORMAT.to_string(),
                to_format: platform_id.to_string(),
                timestamp: Utc::now(),
                success: true,
                diff: Some(mapped),
            });
        }

        let ctx = context_for(platform_id, config);
        for rule in &config.mappings.custom_rules {
            let condition = match Condition::parse(&rule.condition) {
                Ok(condition) => condition,
                Err(source) => {
                    let err = TransformError::Condition {
                        expr: rule.condition.clone(),
                        source,
                    };
                    warn!(platform = %platform_id, error = %err, "skipping custom rule");
                    continue;
                }
            };
            if !condition.evaluate(&body) {
                continue;
            }
            if !self.registry.contains(&rule.transform) {
                warn!(
                    platform = %platform_id,
                    transform = %rule.transform,
                    "skipping custom rule with unknown transform"
                );
                continue;
            }

            let to_format = format!("{}:{}", platform_id, rule.transform);
            match self.registry.apply(&rule.transform, body.clone(), &ctx) {
                Ok(next) => {
                    let diff = changed_fields(&body, &next);
                    body = next;
                    transformations.push(Transformation {
                        from_format: platform_id.to_string(),
                        to_format,
                        timestamp: Utc::now(),
                        success: true,
                        diff: Some(diff),
                    });
                }
                Err(err) => {
                    warn!(
                        platform = %platform_id,
                        transform = %rule.transform,
                        error = %err,
                        "transform function failed"
                    );
                    transformations.push(Transformation {
                        from_format: platform_id.to_string(),
                        to_format,
                        timestamp: Utc::now(),
                        success: false,
                        diff: None,
                    });
                }
            }
        }

        Ok(TransformOutput {
            message: OutboundMessage {
                platform_id: platform_id.to_string(),
                canonical_id: message.id.clone(),
                body,
            },
            transformations,
        })
    }

    /// Renames platform fields to their canonical names using the inbound
    /// mapping. Non-object payloads and unknown platforms pass through.
    pub fn transform_inbound(&self, config: Option<&PlatformConfig>, raw: Value) -> Value {
        let (config, mut object) = match (config, raw) {
            (Some(config), Value::Object(object)) => (config, object),
            (_, raw) => return raw,
        };
        let mut inbound: Vec<(&String, &String)> = config.mappings.inbound.iter().collect();
        inbound.sort();
        for (platform_field, canonical_field) in inbound {
            if let Some(value) = object.get(platform_field).cloned() {
                object.insert(canonical_field.clone(), value);
            }
        }
        Value::Object(object)
    }
}

fn context_for(platform_id: &str, config: &PlatformConfig) -> TransformContext {
    let mut ctx = TransformContext::new(platform_id, config.capabilities);
    if let Some(field) = config.mappings.outbound.get("payload") {
        if field != "payload" {
            ctx.content_fields.push(field.clone());
        }
    }
    ctx
}

/// Keys whose value differs between `before` and `after`, sorted.
fn changed_fields(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = before
        .keys()
        .chain(after.keys())
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use podai_types::{CustomTransformRule, PlatformKind};
    use serde_json::json;

    fn message() -> CanonicalMessage {
        CanonicalMessage::new("m-1", "So1ana1dentity", "hello **world**", "text")
    }

    fn config() -> PlatformConfig {
        PlatformConfig::new("slack", PlatformKind::Webhook, "https://hooks.example")
    }

    fn rule(condition: &str, transform: &str) -> CustomTransformRule {
        CustomTransformRule {
            condition: condition.to_string(),
            transform: transform.to_string(),
        }
    }

    #[test]
    fn unknown_platform_passes_through() {
        let transformer = MessageTransformer::default();
        let msg = message();
        let out = transformer
            .transform_for_platform(&msg, "nowhere", None)
            .unwrap();
        assert_eq!(out.message.body, msg.to_object().unwrap());
        assert_eq!(out.message.canonical_id, "m-1");
        assert!(out.transformations.is_empty());
    }

    #[test]
    fn outbound_mapping_copies_fields() {
        let mut cfg = config();
        cfg.mappings
            .outbound
            .insert("payload".to_string(), "text".to_string());
        cfg.mappings
            .outbound
            .insert("missing".to_string(), "never".to_string());

        let out = MessageTransformer::default()
            .transform_for_platform(&message(), "slack", Some(&cfg))
            .unwrap();
        assert_eq!(out.message.body["text"], "hello **world**");
        assert_eq!(out.message.body["payload"], "hello **world**");
        assert!(!out.message.body.contains_key("never"));
        assert_eq!(out.transformations.len(), 1);
        assert_eq!(out.transformations[0].diff, Some(vec!["text".to_string()]));
    }

    #[test]
    fn rules_apply_in_order_to_mapped_content() {
        let mut cfg = config();
        cfg.mappings
            .outbound
            .insert("payload".to_string(), "text".to_string());
        cfg.mappings.custom_rules = vec![
            rule(r#"messageType === "text""#, "markdown_to_plain"),
            rule(r#"messageType === "text""#, "uppercase_content"),
            rule(r#"messageType === "urgent""#, "tag_platform"),
        ];

        let out = MessageTransformer::default()
            .transform_for_platform(&message(), "slack", Some(&cfg))
            .unwrap();
        assert_eq!(out.message.body["text"], "HELLO WORLD");
        assert_eq!(out.message.body["payload"], "HELLO WORLD");
        assert!(!out.message.body.contains_key("platform"));
        let formats: Vec<&str> = out
            .transformations
            .iter()
            .map(|t| t.to_format.as_str())
            .collect();
        assert_eq!(
            formats,
            vec!["slack", "slack:markdown_to_plain", "slack:uppercase_content"]
        );
        assert_eq!(
            out.transformations[2].diff,
            Some(vec!["payload".to_string(), "text".to_string()])
        );
    }

    #[test]
    fn bad_rules_are_skipped() {
        let mut cfg = config();
        cfg.mappings.custom_rules = vec![
            rule("messageType = 'text'", "uppercase_content"),
            rule("messageType === 'text'", "does_not_exist"),
            rule("messageType === 'text'", "tag_platform"),
        ];

        let out = MessageTransformer::default()
            .transform_for_platform(&message(), "slack", Some(&cfg))
            .unwrap();
        assert_eq!(out.message.body["payload"], "hello **world**");
        assert_eq!(out.message.body["platform"], "slack");
        assert_eq!(out.transformations.len(), 1);
    }

    #[test]
    fn failing_function_is_recorded() {
        let mut registry = TransformRegistry::new();
        registry.register("explode", |_, _| {
            Err(TransformError::Function {
                name: "explode".to_string(),
                reason: "boom".to_string(),
            })
        });
        let mut cfg = config();
        cfg.mappings.custom_rules = vec![rule("sender !== ''", "explode")];

        let out = MessageTransformer::new(registry)
            .transform_for_platform(&message(), "slack", Some(&cfg))
            .unwrap();
        assert_eq!(out.message.body["payload"], "hello **world**");
        assert_eq!(out.transformations.len(), 1);
        assert!(!out.transformations[0].success);
    }

    #[test]
    fn inbound_mapping_renames_to_canonical() {
        let mut cfg = config();
        cfg.mappings
            .inbound
            .insert("text".to_string(), "payload".to_string());
        cfg.mappings
            .inbound
            .insert("user".to_string(), "sender".to_string());

        let transformer = MessageTransformer::default();
        let out = transformer.transform_inbound(Some(&cfg), json!({"text": "hi", "user": "u1"}));
        assert_eq!(out["payload"], "hi");
        assert_eq!(out["sender"], "u1");
        assert_eq!(out["text"], "hi");

        assert_eq!(
            transformer.transform_inbound(Some(&cfg), json!("raw frame")),
            json!("raw frame")
        );
        assert_eq!(
            transformer.transform_inbound(None, json!({"text": "hi"})),
            json!({"text": "hi"})
        );
    }
}
