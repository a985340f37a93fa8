//! HTML text extraction and entity escaping.

use async_trait::async_trait;
use serde_json::json;
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// HTML utility operations: `extractText`, `escape`, `unescape`.
///
/// Text extraction strips tags and collapses whitespace; it is a
/// lightweight scrape helper, not a DOM parser.
pub struct Html {
    meta: HandlerMetadata,
}

impl Html {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["extractText", "escape", "unescape"],
                    "default": "extractText",
                },
                "field": {"type": "string", "description": "Source path; defaults to input.html"},
            },
        });
        Self {
            meta: HandlerMetadata::new("html", "HTML", "Extract text and escape entities")
                .with_category("transform")
                .with_icon("code")
                .with_config_schema(schema),
        }
    }

    fn strip_tags(source: &str) -> String {
        let mut text = String::with_capacity(source.len());
        let mut in_tag = false;
        for ch in source.chars() {
            match ch {
                '<' => in_tag = true,
                '>' => {
                    in_tag = false;
                    text.push(' ');
                }
                _ if !in_tag => text.push(ch),
                _ => {}
            }
        }
        let collapsed: Vec<&str> = text.split_whitespace().collect();
        collapsed.join(" ")
    }

    fn escape(source: &str) -> String {
        source
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }

    fn unescape(source: &str) -> String {
        source
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }
}

impl Default for Html {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Html {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let path = ctx.config_str("field").unwrap_or("html");
        let source = get_path(ctx.input(), path)
            .map(coerce_string)
            .unwrap_or_default();

        let output = match ctx.config_str("operation").unwrap_or("extractText") {
            "escape" => json!({"result": Self::escape(&source)}),
            "unescape" => json!({"result": Self::unescape(&source)}),
            _ => json!({"text": Self::strip_tags(&source)}),
        };
        Ok(NodeExecutionResult::success(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ctx;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    async fn run(config: Value, input: Value) -> Value {
        let c = ctx("html", config, input);
        Html::new()
            .execute(&c)
            .await
            .unwrap()
            .output()
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn extract_text_strips_tags() {
        let output = run(
            json!({}),
            json!({"html": "<div><h1>Title</h1><p>Body  text</p></div>"}),
        )
        .await;
        assert_eq!(output["text"], "Title Body text");
    }

    #[tokio::test]
    async fn escape_entities() {
        let output = run(
            json!({"operation": "escape"}),
            json!({"html": r#"<a href="x">&'"#}),
        )
        .await;
        assert_eq!(output["result"], "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[tokio::test]
    async fn unescape_inverts_escape() {
        let original = r#"<tag attr="v">&'</tag>"#;
        let escaped = run(json!({"operation": "escape"}), json!({"html": original})).await;
        let unescaped = run(
            json!({"operation": "unescape"}),
            json!({"html": escaped["result"]}),
        )
        .await;
        assert_eq!(unescaped["result"], original);
    }
}
