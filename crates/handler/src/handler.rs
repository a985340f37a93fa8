//! The node handler trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::NodeExecutionContext;
use crate::error::HandlerError;
use crate::metadata::{ConfigValidation, HandlerMetadata};
use crate::result::NodeExecutionResult;
use crate::schema;

/// The contract every node type satisfies.
///
/// Handlers are stateless singletons: any long-lived resources (HTTP
/// clients, pools) are injected at construction and must be safe for
/// concurrent use. The engine stores handlers as `Arc<dyn NodeHandler>` in
/// the registry, so this trait is object-safe.
#[async_trait]
pub trait NodeHandler: Send + Sync + 'static {
    /// Static metadata describing this handler type.
    fn metadata(&self) -> &HandlerMetadata;

    /// Execute the handler — the only mandatory behaviour.
    ///
    /// The context arrives with config already expression-resolved and
    /// input already assembled. Long-running implementations should call
    /// `ctx.check_cancelled()` periodically.
    async fn execute(
        &self,
        ctx: &NodeExecutionContext,
    ) -> Result<NodeExecutionResult, HandlerError>;

    /// Validate a node config before the flow runs.
    ///
    /// The default checks the config against
    /// [`config_schema`](HandlerMetadata::config_schema); handlers with
    /// cross-field rules override and extend this.
    fn validate_config(&self, config: &Value) -> ConfigValidation {
        ConfigValidation::with_errors(schema::validate_config(
            config,
            &self.metadata().config_schema,
        ))
    }

    /// The stable type discriminator.
    fn key(&self) -> &str {
        &self.metadata().key
    }

    /// Whether this handler is a trigger.
    fn is_trigger(&self) -> bool {
        self.metadata().trigger
    }

    /// Whether the engine may schedule this handler on the I/O pool.
    fn supports_async(&self) -> bool {
        self.metadata().supports_async
    }

    /// Whether this handler emits progressive output.
    fn supports_streaming(&self) -> bool {
        self.metadata().supports_streaming
    }
}
