//! # Weft Expression
//!
//! The `{{path}}` substitutor applied to node configurations before
//! dispatch.
//!
//! This is deliberately **not** an expression language: expressions are
//! dotted paths into the node's input (or a named predecessor's output),
//! nothing more. No operators, no function calls, no script injection
//! surface. Scripting nodes that need real evaluation embed a sandboxed
//! evaluator as an external collaborator.
//!
//! ## Resolution rules
//!
//! - `$input.a.b`, `input.a.b`, `$json.a.b`, and bare `a.b` all resolve
//!   against the input payload.
//! - `$node.<node-id>.a.b` resolves against that predecessor's output.
//! - A string that is exactly one `{{expr}}` resolves to the **value**
//!   (type-preserving); mixed text stringifies each resolution.
//! - A missing path yields `null` (or the empty string in mixed text).
//!   Resolution never fails.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod template;

pub use template::{resolve_config, resolve_str, ExpressionContext, Template, TemplatePart};
