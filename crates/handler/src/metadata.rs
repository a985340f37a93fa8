//! Static metadata describing a handler type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named connection point on a handler.
///
/// Output port keys double as branch labels: a condition handler declares
/// outputs `"true"` and `"false"`, and its result names which of them the
/// engine follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    /// Unique key within this handler's inputs or outputs.
    pub key: String,
    /// Short description of what flows through this port.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PortSpec {
    /// Create a port with an empty description.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
        }
    }

    /// Create a port with a description.
    pub fn described(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

/// Port names and shapes, for the UI and for graph validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    /// Input ports. Empty for triggers.
    pub inputs: Vec<PortSpec>,
    /// Output ports; keys double as branch labels.
    pub outputs: Vec<PortSpec>,
}

impl InterfaceDefinition {
    /// The common shape: one `in` port, one `out` port.
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            inputs: vec![PortSpec::new("in")],
            outputs: vec![PortSpec::new("out")],
        }
    }

    /// A trigger shape: no inputs, one `out` port.
    #[must_use]
    pub fn source() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: vec![PortSpec::new("out")],
        }
    }

    /// One `in` port and the given output branch labels.
    #[must_use]
    pub fn branching(outputs: &[&str]) -> Self {
        Self {
            inputs: vec![PortSpec::new("in")],
            outputs: outputs.iter().map(|key| PortSpec::new(*key)).collect(),
        }
    }
}

impl Default for InterfaceDefinition {
    fn default() -> Self {
        Self::passthrough()
    }
}

/// Outcome of validating a node config against a handler's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    /// `true` when no errors were found.
    pub valid: bool,
    /// Human-readable problems, one per offending key.
    pub errors: Vec<String>,
}

impl ConfigValidation {
    /// A validation that found no problems.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A validation carrying the given problems.
    #[must_use]
    pub fn with_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Static metadata describing a handler type.
///
/// The `key` is the stable external identifier stored in flow definitions;
/// renaming one requires a migration map. Everything else is free to
/// evolve.
#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    /// Stable type discriminator (e.g. `"httpRequest"`).
    pub key: String,
    /// Human-readable display name (e.g. `"HTTP Request"`).
    pub display_name: String,
    /// Short description of what this handler does.
    pub description: String,
    /// Icon identifier for the editor UI.
    pub icon: String,
    /// Category for UI grouping (`"trigger"`, `"flow"`, `"transform"`, `"io"`).
    pub category: String,
    /// JSON-schema-shaped description of accepted configuration keys.
    pub config_schema: Value,
    /// Port names and shapes.
    pub ports: InterfaceDefinition,
    /// Triggers have no inbound data ports and are seeded by external events.
    pub trigger: bool,
    /// The engine may run this handler on the I/O pool and cancel it.
    pub supports_async: bool,
    /// The handler emits progressive output.
    pub supports_streaming: bool,
    /// The handler wants predecessor outputs keyed by inbound branch
    /// instead of merged into one mapping.
    pub multi_port_input: bool,
}

impl HandlerMetadata {
    /// Create metadata with the minimum required fields.
    pub fn new(
        key: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            description: description.into(),
            icon: String::new(),
            category: String::new(),
            config_schema: serde_json::json!({"type": "object", "properties": {}}),
            ports: InterfaceDefinition::default(),
            trigger: false,
            supports_async: false,
            supports_streaming: false,
            multi_port_input: false,
        }
    }

    /// Set the editor icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Set the UI category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the config schema.
    #[must_use]
    pub fn with_config_schema(mut self, schema: Value) -> Self {
        self.config_schema = schema;
        self
    }

    /// Set the port interface.
    #[must_use]
    pub fn with_ports(mut self, ports: InterfaceDefinition) -> Self {
        self.ports = ports;
        self
    }

    /// Mark this handler as a trigger (no inbound data ports).
    #[must_use]
    pub fn trigger(mut self) -> Self {
        self.trigger = true;
        self.ports = InterfaceDefinition::source();
        self
    }

    /// Mark this handler as I/O-bound and cancellable.
    #[must_use]
    pub fn asynchronous(mut self) -> Self {
        self.supports_async = true;
        self
    }

    /// Mark this handler as a progressive-output producer.
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }

    /// Ask the engine for branch-keyed predecessor outputs.
    #[must_use]
    pub fn multi_port(mut self) -> Self {
        self.multi_port_input = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn metadata_builder() {
        let meta = HandlerMetadata::new("httpRequest", "HTTP Request", "Make HTTP calls")
            .with_category("io")
            .with_icon("globe")
            .asynchronous();

        assert_eq!(meta.key, "httpRequest");
        assert_eq!(meta.display_name, "HTTP Request");
        assert_eq!(meta.category, "io");
        assert_eq!(meta.icon, "globe");
        assert!(meta.supports_async);
        assert!(!meta.trigger);
        assert!(!meta.supports_streaming);
    }

    #[test]
    fn trigger_builder_drops_inputs() {
        let meta = HandlerMetadata::new("webhookTrigger", "Webhook", "Starts on HTTP").trigger();
        assert!(meta.trigger);
        assert!(meta.ports.inputs.is_empty());
        assert_eq!(meta.ports.outputs.len(), 1);
        assert_eq!(meta.ports.outputs[0].key, "out");
    }

    #[test]
    fn default_interface_is_passthrough() {
        let iface = InterfaceDefinition::default();
        assert_eq!(iface.inputs.len(), 1);
        assert_eq!(iface.inputs[0].key, "in");
        assert_eq!(iface.outputs[0].key, "out");
    }

    #[test]
    fn branching_interface() {
        let iface = InterfaceDefinition::branching(&["true", "false"]);
        let keys: Vec<&str> = iface.outputs.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["true", "false"]);
    }

    #[test]
    fn config_validation_states() {
        assert!(ConfigValidation::ok().valid);
        assert!(ConfigValidation::with_errors(Vec::new()).valid);

        let failed = ConfigValidation::with_errors(vec!["missing `url`".into()]);
        assert!(!failed.valid);
        assert_eq!(failed.errors.len(), 1);
    }

    #[test]
    fn port_spec_serde_skips_empty_description() {
        let port = PortSpec::new("out");
        let value = serde_json::to_value(&port).unwrap();
        assert_eq!(value, json!({"key": "out"}));

        let port = PortSpec::described("out", "main data");
        let value = serde_json::to_value(&port).unwrap();
        assert_eq!(value["description"], "main data");
    }

    #[test]
    fn default_schema_is_empty_object_schema() {
        let meta = HandlerMetadata::new("noOp", "No Op", "Does nothing");
        assert_eq!(meta.config_schema["type"], "object");
    }
}
