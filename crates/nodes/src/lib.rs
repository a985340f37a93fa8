//! # Weft Nodes
//!
//! The built-in handler set: triggers, flow control, data transforms, and
//! I/O. Every handler implements
//! [`NodeHandler`](weft_handler::NodeHandler) and is registered under its
//! stable type key by [`register_builtins`].
//!
//! Handlers are stateless; anything long-lived (the HTTP client, the
//! rate-limit store) is injected at construction and shared across
//! concurrent executions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use weft_handler::HandlerRegistry;
use weft_resilience::RateLimiterStore;

/// Flow-control handlers: branching, merging, batching, gating.
pub mod flow;
/// I/O handlers: HTTP, shell commands, webhook responses.
pub mod io;
/// Shared comparison operators used by condition, filter, and switch.
pub mod operators;
/// Data transform handlers.
pub mod transform;
/// Trigger handlers seeding executions from external events.
pub mod trigger;

#[cfg(test)]
pub(crate) mod testkit;
mod util;

/// Register every built-in handler into `registry`.
///
/// The rate-limit store is shared: the engine owns one instance per
/// process and passes it both here and to its own admission checks.
pub fn register_builtins(registry: &mut HandlerRegistry, rate_limits: Arc<RateLimiterStore>) {
    // Triggers
    registry.register(Arc::new(trigger::ManualTrigger::new()));
    registry.register(Arc::new(trigger::ScheduleTrigger::new()));
    registry.register(Arc::new(trigger::WebhookTrigger::new()));
    registry.register(Arc::new(trigger::FormTrigger::new()));
    registry.register(Arc::new(trigger::EmailTrigger::new()));
    registry.register(Arc::new(trigger::ErrorTrigger::new()));

    // Flow control
    registry.register(Arc::new(flow::Condition::new()));
    registry.register(Arc::new(flow::Switch::new()));
    registry.register(Arc::new(flow::Filter::new()));
    registry.register(Arc::new(flow::Merge::new()));
    registry.register(Arc::new(flow::Loop::new()));
    registry.register(Arc::new(flow::SplitOut::new()));
    registry.register(Arc::new(flow::Retry::new()));
    registry.register(Arc::new(flow::RateLimiter::new(rate_limits)));
    registry.register(Arc::new(flow::Wait::new()));
    registry.register(Arc::new(flow::Approval::new()));
    registry.register(Arc::new(flow::Form::new()));
    registry.register(Arc::new(flow::NoOp::new()));

    // Transforms
    registry.register(Arc::new(transform::SetFields::new()));
    registry.register(Arc::new(transform::Sort::new()));
    registry.register(Arc::new(transform::RemoveDuplicates::new()));
    registry.register(Arc::new(transform::ItemLists::new()));
    registry.register(Arc::new(transform::CompareDatasets::new()));
    registry.register(Arc::new(transform::Markdown::new()));
    registry.register(Arc::new(transform::Html::new()));
    registry.register(Arc::new(transform::Xml::new()));
    registry.register(Arc::new(transform::Json::new()));
    registry.register(Arc::new(transform::RegexNode::new()));
    registry.register(Arc::new(transform::Spreadsheet::new()));
    registry.register(Arc::new(transform::Crypto::new()));
    registry.register(Arc::new(transform::DateTime::new()));

    // I/O
    registry.register(Arc::new(io::HttpRequest::new()));
    registry.register(Arc::new(io::ExecuteCommand::new()));
    registry.register(Arc::new(io::RespondWebhook::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_builtin() {
        let mut registry = HandlerRegistry::new();
        register_builtins(&mut registry, Arc::new(RateLimiterStore::new()));

        for key in [
            "manualTrigger",
            "scheduleTrigger",
            "webhookTrigger",
            "formTrigger",
            "emailTrigger",
            "errorTrigger",
            "condition",
            "switch",
            "filter",
            "merge",
            "loop",
            "splitOut",
            "retry",
            "rateLimiter",
            "wait",
            "approval",
            "form",
            "noOp",
            "setFields",
            "sort",
            "removeDuplicates",
            "itemLists",
            "compareDatasets",
            "markdown",
            "html",
            "xml",
            "json",
            "regex",
            "spreadsheet",
            "crypto",
            "dateTime",
            "httpRequest",
            "executeCommand",
            "respondWebhook",
        ] {
            assert!(registry.contains(key), "missing handler `{key}`");
        }
        assert_eq!(registry.len(), 34);
    }

    #[test]
    fn triggers_are_marked() {
        let mut registry = HandlerRegistry::new();
        register_builtins(&mut registry, Arc::new(RateLimiterStore::new()));

        assert!(registry.get("manualTrigger").unwrap().is_trigger());
        assert!(registry.get("webhookTrigger").unwrap().is_trigger());
        assert!(!registry.get("condition").unwrap().is_trigger());
    }
}
