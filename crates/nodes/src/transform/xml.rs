//! Minimal XML element mapping.
//!
//! The handler implements the element/`#text` mapping by hand rather than
//! pulling in a full XML stack: no DTDs, no external entities, no
//! namespaces. A document carrying `<!DOCTYPE` is rejected outright,
//! which closes the XXE surface at the door.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use weft_core::value::{coerce_string, get_path};
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// XML operations: `parse` and `stringify`.
///
/// Parsing maps each element to an object; leaf text lands under `#text`
/// and repeated sibling names collect into arrays. Attributes are
/// ignored. Stringify inverts the mapping under a configurable root.
pub struct Xml {
    meta: HandlerMetadata,
}

impl Xml {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["parse", "stringify"], "default": "parse"},
                "field": {"type": "string", "description": "Source path; defaults to input.xml for parse, the whole input for stringify"},
                "rootName": {"type": "string", "default": "root"},
            },
        });
        Self {
            meta: HandlerMetadata::new("xml", "XML", "Parse and stringify XML")
                .with_category("transform")
                .with_icon("file-code")
                .with_config_schema(schema),
        }
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    fn unescape(text: &str) -> String {
        text.replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }

    fn stringify_value(name: &str, value: &Value, out: &mut String) {
        match value {
            Value::Array(items) => {
                for item in items {
                    Self::stringify_value(name, item, out);
                }
            }
            Value::Object(map) => {
                out.push('<');
                out.push_str(name);
                out.push('>');
                for (key, child) in map {
                    if key == "#text" {
                        out.push_str(&Self::escape(&coerce_string(child)));
                    } else {
                        Self::stringify_value(key, child, out);
                    }
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            other => {
                out.push('<');
                out.push_str(name);
                out.push('>');
                out.push_str(&Self::escape(&coerce_string(other)));
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    fn stringify(root_name: &str, value: &Value) -> String {
        let mut out = String::new();
        Self::stringify_value(root_name, value, &mut out);
        out
    }

    fn parse(source: &str) -> Result<Value, HandlerError> {
        if source.contains("<!DOCTYPE") || source.contains("<!ENTITY") {
            return Err(HandlerError::security(
                "document type declarations are not allowed",
            ));
        }
        let mut parser = XmlParser {
            chars: source.chars().collect(),
            pos: 0,
        };
        parser.skip_prolog();
        let (_, value) = parser.parse_element()?;
        Ok(value)
    }
}

struct XmlParser {
    chars: Vec<char>,
    pos: usize,
}

impl XmlParser {
    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_prolog(&mut self) {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") || self.starts_with("<!--") {
                let close = if self.starts_with("<?") { "?>" } else { "-->" };
                if !self.advance_past(close) {
                    self.pos = self.chars.len();
                }
            } else {
                return;
            }
        }
    }

    fn starts_with(&self, needle: &str) -> bool {
        let mut i = self.pos;
        for ch in needle.chars() {
            if i >= self.chars.len() || self.chars[i] != ch {
                return false;
            }
            i += 1;
        }
        true
    }

    fn advance_past(&mut self, needle: &str) -> bool {
        let needle_chars: Vec<char> = needle.chars().collect();
        let mut i = self.pos;
        while i + needle_chars.len() <= self.chars.len() {
            if self.chars[i..i + needle_chars.len()] == needle_chars[..] {
                self.pos = i + needle_chars.len();
                return true;
            }
            i += 1;
        }
        false
    }

    fn parse_element(&mut self) -> Result<(String, Value), HandlerError> {
        self.skip_whitespace();
        if self.pos >= self.chars.len() || self.chars[self.pos] != '<' {
            return Err(HandlerError::validation("expected element"));
        }
        self.pos += 1;

        let mut name = String::new();
        while self.pos < self.chars.len()
            && !self.chars[self.pos].is_whitespace()
            && self.chars[self.pos] != '>'
            && self.chars[self.pos] != '/'
        {
            name.push(self.chars[self.pos]);
            self.pos += 1;
        }
        if name.is_empty() {
            return Err(HandlerError::validation("empty element name"));
        }

        // Attributes are skipped.
        while self.pos < self.chars.len()
            && self.chars[self.pos] != '>'
            && !self.starts_with("/>")
        {
            self.pos += 1;
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return Ok((name, Value::Object(Map::new())));
        }
        self.pos += 1; // consume '>'

        let mut children: Map<String, Value> = Map::new();
        let mut text = String::new();
        loop {
            if self.pos >= self.chars.len() {
                return Err(HandlerError::validation(format!(
                    "unclosed element `{name}`"
                )));
            }
            if self.starts_with("</") {
                self.pos += 2;
                let close_ok = self.advance_past(">");
                if !close_ok {
                    return Err(HandlerError::validation("malformed closing tag"));
                }
                break;
            }
            if self.starts_with("<!--") {
                if !self.advance_past("-->") {
                    return Err(HandlerError::validation("unclosed comment"));
                }
                continue;
            }
            if self.chars[self.pos] == '<' {
                let (child_name, child_value) = self.parse_element()?;
                match children.get_mut(&child_name) {
                    Some(Value::Array(existing)) => existing.push(child_value),
                    Some(existing) => {
                        let first = existing.take();
                        children.insert(child_name, Value::Array(vec![first, child_value]));
                    }
                    None => {
                        children.insert(child_name, child_value);
                    }
                }
            } else {
                text.push(self.chars[self.pos]);
                self.pos += 1;
            }
        }

        let trimmed = Xml::unescape(text.trim());
        if !trimmed.is_empty() {
            children.insert("#text".to_owned(), Value::String(trimmed));
        }
        Ok((name, Value::Object(children)))
    }
}

impl Default for Xml {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for Xml {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        let output = match ctx.config_str("operation").unwrap_or("parse") {
            "stringify" => {
                let source = match ctx.config_str("field") {
                    Some(path) if !path.is_empty() => {
                        get_path(ctx.input(), path).cloned().unwrap_or(Value::Null)
                    }
                    _ => ctx.input().clone(),
                };
                let root_name = ctx.config_str("rootName").unwrap_or("root");
                json!({"xml": Self::stringify(root_name, &source)})
            }
            _ => {
                let path = ctx.config_str("field").unwrap_or("xml");
                let source = get_path(ctx.input(), path)
                    .map(coerce_string)
                    .unwrap_or_default();
                json!({"parsed": Self::parse(&source)?})
            }
        };
        Ok(NodeExecutionResult::success(output))
    }
}
