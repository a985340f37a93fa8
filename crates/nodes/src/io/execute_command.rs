//! Gated shell command execution.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;
use weft_handler::{
    HandlerError, HandlerMetadata, NodeExecutionContext, NodeExecutionResult, NodeHandler,
};

/// Patterns that are refused unless explicitly allowed.
static BLOCKED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"rm\s+-rf\s+/",
        r"rm\s+-r\s+-f\s+",
        r"\bshutdown\b",
        r"\breboot\b",
        r"\bmkfs",
        r"\bdd\s+if=",
        r"curl[^|]*\|\s*(sh|bash)",
        r"wget[^|]*\|\s*(sh|bash)",
        r"\$\(",
        r"`",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap_or_else(|_| unreachable!("static pattern")))
    .collect()
});

/// Runs a shell command, behind an explicit enabling flag.
///
/// Destructive patterns (recursive root deletion, shutdown, mkfs, raw
/// `dd`, pipe-to-shell, command substitution) are refused unless
/// `allowDangerous` is set. Returns `{stdout, stderr, exitCode}`;
/// `failOnError` turns a non-zero exit into a failure.
pub struct ExecuteCommand {
    meta: HandlerMetadata,
}

impl ExecuteCommand {
    /// Create the handler singleton.
    #[must_use]
    pub fn new() -> Self {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "enabled": {"type": "boolean", "default": false},
                "command": {"type": "string"},
                "env": {"type": "object", "description": "Environment overlay"},
                "timeoutSec": {"type": "integer", "default": 60},
                "failOnError": {"type": "boolean", "default": false},
                "allowDangerous": {"type": "boolean", "default": false},
            },
            "required": ["command"],
        });
        Self {
            meta: HandlerMetadata::new("executeCommand", "Execute Command", "Run a shell command")
                .with_category("io")
                .with_icon("terminal")
                .with_config_schema(schema)
                .asynchronous(),
        }
    }

    fn blocked_reason(command: &str) -> Option<&'static str> {
        BLOCKED_PATTERNS
            .iter()
            .any(|pattern| pattern.is_match(command))
            .then_some("command matches a blocked pattern")
    }
}

impl Default for ExecuteCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeHandler for ExecuteCommand {
    fn metadata(&self) -> &HandlerMetadata {
        &self.meta
    }

    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError> {
        if !ctx.config_bool("enabled", false) {
            return Err(HandlerError::security(
                "command execution is disabled for this node",
            ));
        }

        let command = ctx
            .config_str("command")
            .ok_or_else(|| HandlerError::validation("missing required field `command`"))?;

        if !ctx.config_bool("allowDangerous", false) {
            if let Some(reason) = Self::blocked_reason(command) {
                warn!(node_id = %ctx.node_id, "blocked command");
                return Err(HandlerError::security(format!("blocked: {reason}")));
            }
        }

        let mut child_command = tokio::process::Command::new("sh");
        child_command
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        if let Some(env) = ctx.config_value("env").and_then(Value::as_object) {
            for (name, value) in env {
                child_command.env(name, weft_core::value::coerce_string(value));
            }
        }

        let timeout = Duration::from_secs(ctx.config_u64("timeoutSec", 60));
        let output = tokio::select! {
            () = ctx.cancellation().cancelled() => return Err(HandlerError::cancelled()),
            outcome = tokio::time::timeout(timeout, child_command.output()) => match outcome {
                Ok(result) => result
                    .map_err(|err| HandlerError::internal(format!("failed to spawn: {err}")))?,
                Err(_) => {
                    return Err(HandlerError::timeout(format!(
                        "command timed out after {}s",
                        timeout.as_secs()
                    )))
                }
            },
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if ctx.config_bool("failOnError", false) && exit_code != 0 {
            return Err(HandlerError::internal(format!(
                "command exited with code {exit_code}: {}",
                stderr.lines().next().unwrap_or_default()
            ))
            .with_partial_output(json!({
                "stdout": stdout,
                "stderr": stderr,
                "exitCode": exit_code,
            })));
        }

        Ok(NodeExecutionResult::success(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exitCode": exit_code,
        })))
    }
}
