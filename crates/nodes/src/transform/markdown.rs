//! Markdown rendering.

use async_trait::async_trait;
use pulldown_cmark::{html, Options, Parser};
use serde_json::json;
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Renders Markdown to HTML.
///
/// Tables and strikethrough are enabled; raw HTML in the source passes
/// through the renderer untouched, as commonmark specifies.
pub struct Markdown {
    meta: HandlerMetadata,
}

impl Markdown {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "field": {"type": "string", "description": "Source path; defaults to input.markdown"},
            },
        });
        Self {
            meta: HandlerMetadata::new("markdown", "Markdown", "Render Markdown to HTML")
                .with_category("transform")
                .with_icon("file-text")
                .with_config_schema(schema),
        }
    }
}

impl Default for Markdown {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Markdown {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let path = ctx.config_str("field").unwrap_or("markdown");
        let source = get_path(ctx.input(), path)
            .map(coerce_string)
            .unwrap_or_default();

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let parser = Parser::new_ext(&source, options);

        let mut rendered = String::with_capacity(source.len() * 2);
        html::push_html(&mut rendered, parser);

        Ok(NodeExecutionResult::success(json!({"html": rendered})))
    }
}
