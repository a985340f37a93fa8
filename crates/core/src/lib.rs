//! # Weft Core
//!
//! Core types shared by every Weft crate.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`ExecutionId`], [`FlowId`], [`NodeId`], [`UserId`],
//!   [`TaskId`] — strongly-typed UUID wrappers that cannot be mixed up at
//!   compile time.
//! - **Value helpers**: dotted-path access and loose coercion over
//!   [`serde_json::Value`], the universal payload type of the engine.
//!
//! Payloads are intrinsically schema-less JSON trees; nothing here attempts
//! to type node inputs statically. Validation happens at the boundaries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod id;
pub mod value;

pub use id::{ExecutionId, FlowId, IdParseError, NodeId, TaskId, UserId};
