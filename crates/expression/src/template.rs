//! Template parsing and rendering over `{{ }}` markers.

use std::collections::HashMap;

use serde_json::{Map, Value};
use weft_core::value::{coerce_string, get_path};
use weft_core::NodeId;

/// What an expression resolves against.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionContext<'a> {
    /// The node's merged input payload.
    pub input: Option<&'a Value>,
    /// Predecessor outputs, for `$node.<id>.path` lookups.
    pub node_outputs: Option<&'a HashMap<NodeId, Value>>,
}

impl<'a> ExpressionContext<'a> {
    /// A context resolving against the given input only.
    #[must_use]
    pub fn for_input(input: &'a Value) -> Self {
        Self {
            input: Some(input),
            node_outputs: None,
        }
    }

    /// Attach predecessor outputs.
    #[must_use]
    pub fn with_node_outputs(mut self, outputs: &'a HashMap<NodeId, Value>) -> Self {
        self.node_outputs = Some(outputs);
        self
    }

    fn resolve(&self, expression: &str) -> Value {
        let expr = expression.trim();
        if expr.is_empty() {
            return Value::Null;
        }

        // `$node.<id>.rest` digs into a named predecessor's output.
        if let Some(rest) = expr.strip_prefix("$node.") {
            let (id_part, path) = match rest.split_once('.') {
                Some((id, path)) => (id, path),
                None => (rest, ""),
            };
            let Ok(node_id) = NodeId::parse(id_part) else {
                return Value::Null;
            };
            return self
                .node_outputs
                .and_then(|outputs| outputs.get(&node_id))
                .and_then(|output| get_path(output, path))
                .cloned()
                .unwrap_or(Value::Null);
        }

        let path = expr
            .strip_prefix("$input")
            .or_else(|| expr.strip_prefix("$json"))
            .map_or_else(
                || expr.strip_prefix("input.").unwrap_or(expr),
                |rest| rest.strip_prefix('.').unwrap_or(rest),
            );

        self.input
            .and_then(|input| get_path(input, path))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// One parsed chunk of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text, copied through.
    Static(String),
    /// An expression between `{{` and `}}` (markers stripped).
    Expression(String),
}

/// A parsed template.
///
/// Parsing never fails: an unclosed `{{` is literal text, because config
/// strings are user data and resolution must not throw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parse a template string into parts.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut parts = Vec::new();
        let mut rest = source;

        while let Some(open) = rest.find("{{") {
            match rest[open + 2..].find("}}") {
                Some(close) => {
                    if open > 0 {
                        parts.push(TemplatePart::Static(rest[..open].to_owned()));
                    }
                    let expr = &rest[open + 2..open + 2 + close];
                    parts.push(TemplatePart::Expression(expr.trim().to_owned()));
                    rest = &rest[open + 2 + close + 2..];
                }
                None => break,
            }
        }
        if !rest.is_empty() {
            parts.push(TemplatePart::Static(rest.to_owned()));
        }

        Self { parts }
    }

    /// The parsed parts.
    #[must_use]
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Returns `true` if the template contains any expression.
    #[must_use]
    pub fn has_expressions(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, TemplatePart::Expression(_)))
    }

    /// Render the template against a context.
    ///
    /// A template that is exactly one expression yields the resolved value
    /// with its type intact; anything else concatenates to a string.
    #[must_use]
    pub fn render(&self, ctx: &ExpressionContext<'_>) -> Value {
        if let [TemplatePart::Expression(expr)] = self.parts.as_slice() {
            return ctx.resolve(expr);
        }

        let mut rendered = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Static(text) => rendered.push_str(text),
                TemplatePart::Expression(expr) => {
                    rendered.push_str(&coerce_string(&ctx.resolve(expr)));
                }
            }
        }
        Value::String(rendered)
    }
}

/// Resolve one string, substituting `{{expr}}` occurrences.
///
/// Strings without markers come back unchanged (as strings).
#[must_use]
pub fn resolve_str(source: &str, ctx: &ExpressionContext<'_>) -> Value {
    let template = Template::parse(source);
    if template.has_expressions() {
        template.render(ctx)
    } else {
        Value::String(source.to_owned())
    }
}

/// Deep-walk a config value, resolving every string in place.
///
/// Objects and arrays recurse; non-string scalars pass through untouched.
#[must_use]
pub fn resolve_config(config: &Value, ctx: &ExpressionContext<'_>) -> Value {
    match config {
        Value::String(s) => resolve_str(s, ctx),
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve_config(value, ctx));
            }
            Value::Object(resolved)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| resolve_config(item, ctx)).collect())
        }
        other => other.clone(),
    }
}
