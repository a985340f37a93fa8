//! Outbound HTTP requests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use url::Url;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Timeout ceiling for a single request.
const MAX_TIMEOUT: Duration = Duration::from_secs(300);

const ALLOWED_METHODS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Performs one HTTP request.
///
/// Only `http`/`https` URLs are accepted. Headers may arrive as a map or
/// as a list of `{name, value}` pairs. A map or list body is sent as
/// JSON, anything else as raw text. Non-2xx responses are **successes**
/// carrying the status — unless `successOnly` is set, which turns them
/// into failures.
pub struct HttpRequest {
    meta: HandlerMetadata,
    client: reqwest::Client,
}

impl HttpRequest {
    /// Create the handler with a shared client.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string"},
                "method": {"type": "string", "enum": ALLOWED_METHODS, "default": "GET"},
                "headers": {"description": "Map or list of {name, value}"},
                "body": {"description": "JSON body for maps/lists, raw text otherwise"},
                "timeoutSec": {"type": "integer", "default": 30},
                "successOnly": {"type": "boolean", "default": false},
                "includeRawBody": {"type": "boolean", "default": false},
            },
            "required": ["url"],
        });
        Self {
            meta: HandlerMetadata::new("httpRequest", "HTTP Request", "Call an HTTP endpoint")
                .with_category("io")
                .with_icon("globe")
                .with_config_schema(schema)
                .asynchronous(),
            client: reqwest::Client::new(),
        }
    }

    fn parse_url(raw: &str) -> Result<Url, HandlerError> {
        let url = Url::parse(raw)
            .map_err(|err| HandlerError::validation(format!("invalid URL `{raw}`: {err}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(HandlerError::validation(format!(
                "unsupported URL scheme `{scheme}`"
            ))),
        }
    }

    fn header_pairs(headers: Option<&Value>) -> Vec<(String, String)> {
        match headers {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| (name.clone(), weft_core::value::coerce_string(value)))
                .collect(),
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| {
                    let name = entry.get("name").and_then(Value::as_str)?;
                    let value = entry.get("value").map(weft_core::value::coerce_string)?;
                    Some((name.to_owned(), value))
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for HttpRequest {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        ctx.check_cancelled()?;

        let url = Self::parse_url(
            ctx.config_str("url")
                .ok_or_else(|| HandlerError::validation("missing required field `url`"))?,
        )?;

        let method = ctx.config_str("method").unwrap_or("GET").to_uppercase();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(HandlerError::validation(format!(
                "unsupported method `{method}`"
            )));
        }

        let timeout = Duration::from_secs(ctx.config_u64("timeoutSec", 30)).min(MAX_TIMEOUT);
        let mut request = self
            .client
            .request(
                method.parse().unwrap_or(reqwest::Method::GET),
                url.clone(),
            )
            .timeout(timeout);

        for (name, value) in Self::header_pairs(ctx.config_value("headers")) {
            request = request.header(name, value);
        }

        match ctx.config_value("body") {
            Some(body @ (Value::Object(_) | Value::Array(_))) => {
                request = request.json(body);
            }
            Some(Value::Null) | None => {}
            Some(other) => {
                request = request.body(weft_core::value::coerce_string(other));
            }
        }

        let response = tokio::select! {
            () = ctx.cancellation().cancelled() => return Err(HandlerError::cancelled()),
            outcome = request.send() => outcome.map_err(|err| {
                if err.is_timeout() {
                    HandlerError::timeout(format!("request to {url} timed out"))
                } else {
                    HandlerError::dependency(format!("request to {url} failed: {err}"))
                }
            })?,
        };

        let status = response.status();
        if ctx.config_bool("successOnly", false) && !status.is_success() {
            return Err(HandlerError::dependency(format!(
                "request failed with status {}",
                status.as_u16()
            )));
        }

        let mut headers = Map::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str().to_owned(),
                Value::String(value.to_str().unwrap_or_default().to_owned()),
            );
        }

        let raw_body = response
            .text()
            .await
            .map_err(|err| HandlerError::dependency(format!("failed to read body: {err}")))?;
        let data = serde_json::from_str::<Value>(&raw_body)
            .unwrap_or_else(|_| Value::String(raw_body.clone()));

        let mut output = json!({
            "status": status.as_u16(),
            "statusText": status.canonical_reason().unwrap_or_default(),
            "headers": headers,
            "data": data,
        });
        if ctx.config_bool("includeRawBody", false) {
            output["body"] = Value::String(raw_body);
        }

        Ok(NodeExecutionResult::success(output))
    }
}
