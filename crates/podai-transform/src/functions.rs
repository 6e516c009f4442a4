//! Named transform functions referenced by custom rules.

use crate::error::TransformError;
use podai_types::PlatformCapabilities;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What a transform function knows about its target platform.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub platform_id: String,
    pub capabilities: PlatformCapabilities,
    /// Body fields that carry the message text: `payload` plus any field the
    /// outbound mapping copied it to.
    pub content_fields: Vec<String>,
}

impl TransformContext {
    pub fn new(platform_id: impl Into<String>, capabilities: PlatformCapabilities) -> Self {
        Self {
            platform_id: platform_id.into(),
            capabilities,
            content_fields: vec!["payload".to_string()],
        }
    }

    /// Applies `f` to every string-valued content field in `body`.
    pub fn map_content<F>(&self, body: &mut Map<String, Value>, f: F)
    where
        F: Fn(&str) -> String,
    {
        for field in &self.content_fields {
            if let Some(Value::String(text)) = body.get_mut(field) {
                *text = f(text.as_str());
            }
        }
    }
}

pub type TransformFn = Arc<
    dyn Fn(Map<String, Value>, &TransformContext) -> Result<Map<String, Value>, TransformError>
        + Send
        + Sync,
>;

/// Name → function table consulted by custom rules.
#[derive(Clone)]
pub struct TransformRegistry {
    functions: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    /// Registry preloaded with the built-in functions.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("uppercase_content", uppercase_content);
        registry.register("truncate_content", truncate_content);
        registry.register("strip_attachments", strip_attachments);
        registry.register("tag_platform", tag_platform);
        registry.register("markdown_to_plain", markdown_to_plain);
        registry
    }

    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Map<String, Value>, &TransformContext) -> Result<Map<String, Value>, TransformError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the function called `name` on `body`.
    pub fn apply(
        &self,
        name: &str,
        body: Map<String, Value>,
        ctx: &TransformContext,
    ) -> Result<Map<String, Value>, TransformError> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| TransformError::UnknownFunction(name.to_string()))?;
        f(body, ctx)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

fn uppercase_content(
    mut body: Map<String, Value>,
    ctx: &TransformContext,
) -> Result<Map<String, Value>, TransformError> {
    ctx.map_content(&mut body, str::to_uppercase);
    Ok(body)
}

/// Cuts `text` to at most `max` bytes without splitting a character.
fn truncate_to_boundary(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn truncate_content(
    mut body: Map<String, Value>,
    ctx: &TransformContext,
) -> Result<Map<String, Value>, TransformError> {
    let max = ctx.capabilities.max_message_size;
    ctx.map_content(&mut body, |text| truncate_to_boundary(text, max));
    Ok(body)
}

fn strip_attachments(
    mut body: Map<String, Value>,
    _ctx: &TransformContext,
) -> Result<Map<String, Value>, TransformError> {
    body.remove("attachments");
    if let Some(Value::Object(metadata)) = body.get_mut("metadata") {
        metadata.remove("attachments");
    }
    Ok(body)
}

fn tag_platform(
    mut body: Map<String, Value>,
    ctx: &TransformContext,
) -> Result<Map<String, Value>, TransformError> {
    body.insert(
        "platform".to_string(),
        Value::String(ctx.platform_id.clone()),
    );
    Ok(body)
}

/// Drops emphasis, code and heading markers and rewrites `[text](url)` links
/// to `text (url)`.
fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !out.is_empty() {
            out.push('\n');
        }
        let line = line.trim_start_matches('#').trim_start_matches(' ');
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' | '_' | '`' | '~' => i += 1,
                '[' => {
                    let rest: String = chars[i + 1..].iter().collect();
                    match parse_link(&rest) {
                        Some((label, url, consumed)) => {
                            out.push_str(&label);
                            out.push_str(" (");
                            out.push_str(&url);
                            out.push(')');
                            i += 1 + consumed;
                        }
                        None => {
                            out.push('[');
                            i += 1;
                        }
                    }
                }
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }
    }
    out
}

/// Parses `label](url)` and returns label, url and the number of chars consumed.
fn parse_link(rest: &str) -> Option<(String, String, usize)> {
    let close = rest.find("](")?;
    let label = &rest[..close];
    let after = &rest[close + 2..];
    let end = after.find(')')?;
    let url = &after[..end];
    let consumed = label.chars().count() + 2 + url.chars().count() + 1;
    Some((label.to_string(), url.to_string(), consumed))
}

fn markdown_to_plain(
    mut body: Map<String, Value>,
    ctx: &TransformContext,
) -> Result<Map<String, Value>, TransformError> {
    ctx.map_content(&mut body, strip_markdown);
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn ctx() -> TransformContext {
        TransformContext::new("slack", PlatformCapabilities::default())
    }

    #[test]
    fn builtins_are_registered() {
        let registry = TransformRegistry::new();
        assert_eq!(
            registry.names(),
            vec![
                "markdown_to_plain",
                "strip_attachments",
                "tag_platform",
                "truncate_content",
                "uppercase_content"
            ]
        );
    }

    #[test]
    fn uppercase_touches_every_content_field() {
        let mut ctx = ctx();
        ctx.content_fields.push("text".to_string());
        let out = TransformRegistry::new()
            .apply(
                "uppercase_content",
                body(json!({"payload": "hi", "text": "hi", "sender": "abc"})),
                &ctx,
            )
            .unwrap();
        assert_eq!(out["payload"], "HI");
        assert_eq!(out["text"], "HI");
        assert_eq!(out["sender"], "abc");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut ctx = ctx();
        ctx.capabilities.max_message_size = 4;
        let out = TransformRegistry::new()
            .apply("truncate_content", body(json!({"payload": "héllo"})), &ctx)
            .unwrap();
        assert_eq!(out["payload"], "hél");
        assert!(out["payload"].as_str().unwrap().len() <= 4);
    }

    #[test]
    fn strip_attachments_and_tag_platform() {
        let registry = TransformRegistry::new();
        let out = registry
            .apply(
                "strip_attachments",
                body(json!({"attachments": [1], "metadata": {"attachments": [2], "k": "v"}})),
                &ctx(),
            )
            .unwrap();
        assert!(!out.contains_key("attachments"));
        assert_eq!(out["metadata"], json!({"k": "v"}));

        let out = registry.apply("tag_platform", out, &ctx()).unwrap();
        assert_eq!(out["platform"], "slack");
    }

    #[test]
    fn markdown_is_flattened() {
        assert_eq!(
            strip_markdown("# Title\n**bold** and `code` see [docs](https://x.io)"),
            "Title\nbold and code see docs (https://x.io)"
        );
        assert_eq!(strip_markdown("a [dangling bracket"), "a [dangling bracket");
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = TransformRegistry::new()
            .apply("nope", Map::new(), &ctx())
            .unwrap_err();
        assert!(matches!(err, TransformError::UnknownFunction(name) if name == "nope"));
    }
}
