//! The failure taxonomy shared between handlers and the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enumerated failure kinds.
///
/// The engine records the kind on the node's execution record and uses it
/// to decide what the failure means operationally (a `RateLimited` node is
/// not broken; a `Security` rejection must never be retried).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad config, missing required field, invalid enum, malformed UUID,
    /// invalid URL scheme, invalid cron expression.
    Validation,
    /// Required predecessor missing or an external service unreachable.
    Dependency,
    /// Blocked command, untrusted image, missing credential.
    Security,
    /// Rate-limit overflow in `error` mode.
    RateLimited,
    /// Deadline exceeded.
    Timeout,
    /// Cooperative cancellation.
    Cancelled,
    /// Uncaught handler failure — always captured, never a panic.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Dependency => "dependency",
            Self::Security => "security",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Cap applied to the user-visible first line of a failure message.
pub const MESSAGE_SUMMARY_CAP: usize = 200;

/// Error type returned by node handlers.
///
/// A handler failure is data, not a crash: the engine records it on the
/// node record and either feeds a retry successor, routes it to an error
/// trigger, or terminates the execution as failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    /// Which class of failure this is.
    pub kind: ErrorKind,
    /// Full human-readable message; may span multiple lines.
    pub message: String,
    /// Output produced before the failure, if any.
    pub partial_output: Option<Value>,
}

impl HandlerError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            partial_output: None,
        }
    }

    /// Attach output produced before the failure.
    #[must_use]
    pub fn with_partial_output(mut self, output: Value) -> Self {
        self.partial_output = Some(output);
        self
    }

    /// Bad config or input.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Missing predecessor or unreachable collaborator.
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dependency, message)
    }

    /// Blocked command, untrusted image, missing credential.
    pub fn security(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Security, message)
    }

    /// Rate-limit overflow in `error` mode.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    /// Deadline exceeded.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Cooperative cancellation.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "execution cancelled")
    }

    /// Captured unexpected failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns `true` for cancellation errors.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// The user-visible summary: first line, truncated to
    /// [`MESSAGE_SUMMARY_CAP`] characters. Full detail stays in the log.
    #[must_use]
    pub fn summary(&self) -> String {
        let first_line = self.message.lines().next().unwrap_or_default();
        let mut summary: String = first_line.chars().take(MESSAGE_SUMMARY_CAP).collect();
        if first_line.chars().count() > MESSAGE_SUMMARY_CAP {
            summary.push('…');
        }
        summary
    }
}
