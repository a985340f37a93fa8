//! # Weft Handler
//!
//! The node handler contract for the Weft workflow engine.
//!
//! This crate defines **what** a node handler is and **how it communicates**
//! with the engine, but not how the engine orchestrates handlers. Core
//! types live here; the scheduler lives in `weft-engine` and the built-in
//! handler set in `weft-nodes`.
//!
//! ## Core Types
//!
//! - [`NodeHandler`] — the trait every node type implements
//! - [`HandlerMetadata`] — static descriptor (key, category, schema, ports)
//! - [`NodeExecutionContext`] — per-invocation input envelope
//! - [`NodeExecutionResult`] — output / branch choice / fan-out / pause
//! - [`HandlerError`] + [`ErrorKind`] — the failure taxonomy
//! - [`HandlerRegistry`] — type-string → handler lookup, read-only after init
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weft_handler::*;
//! use async_trait::async_trait;
//!
//! struct Passthrough { meta: HandlerMetadata }
//!
//! #[async_trait]
//! impl NodeHandler for Passthrough {
//!     fn metadata(&self) -> &HandlerMetadata { &self.meta }
//!
//!     async fn execute(
//!         &self,
//!         ctx: &NodeExecutionContext,
//!     ) -> Result<NodeExecutionResult, HandlerError> {
//!         ctx.check_cancelled()?;
//!         Ok(NodeExecutionResult::success(ctx.input().clone()))
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Per-invocation input envelope handed to handlers.
pub mod context;
/// Failure taxonomy shared between handlers and the engine.
pub mod error;
/// The node handler trait.
pub mod handler;
/// Static handler descriptors: key, category, schema, ports.
pub mod metadata;
/// Handler registry for type-erased discovery and lookup.
pub mod registry;
/// Execution results: success, branch choice, fan-out, pause.
pub mod result;
/// JSON-schema-subset validation for node configs.
pub mod schema;

// ── Public re-exports ───────────────────────────────────────────────────────

pub use context::{NodeExecutionContext, RESUME_DATA_KEY};
pub use error::{ErrorKind, HandlerError};
pub use handler::NodeHandler;
pub use metadata::{ConfigValidation, HandlerMetadata, InterfaceDefinition, PortSpec};
pub use registry::HandlerRegistry;
pub use result::{BranchKey, NodeExecutionResult, PauseRequest, ResumeKind, DEFAULT_BRANCH};
