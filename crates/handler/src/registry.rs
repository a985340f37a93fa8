//! Type-erased registry for discovering and retrieving handlers by key.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::NodeHandler;
use crate::metadata::HandlerMetadata;

/// Process-wide mapping from type string to handler singleton.
///
/// Populated at startup, then wrapped in an `Arc` and treated as
/// read-only: lookup after init is O(1) and lock-free. Handlers are
/// `Arc<dyn NodeHandler>` so concurrent executions share one instance.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Overwrites any existing handler with the same key.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) {
        let key = handler.metadata().key.clone();
        self.handlers.insert(key, handler);
    }

    /// Look up a handler by its type key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn NodeHandler>> {
        self.handlers.get(key)
    }

    /// Check whether a handler with the given key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    /// Return metadata for all registered handlers.
    #[must_use]
    pub fn list(&self) -> Vec<&HandlerMetadata> {
        self.handlers.values().map(|h| h.metadata()).collect()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove a handler by key. Returns the removed handler, if any.
    pub fn unregister(&mut self, key: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.remove(key)
    }

    /// Iterate over all registered `(key, handler)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn NodeHandler>)> {
        self.handlers.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("count", &self.handlers.len())
            .field("keys", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
