//! Unique identifiers for Weft entities.
//!
//! Each identifier wraps a [`uuid::Uuid`] behind a distinct newtype so the
//! compiler rejects passing a [`FlowId`] where an [`ExecutionId`] is
//! expected. All ID types are `Copy` (16 bytes, stack-allocated) and
//! support:
//!
//! - `new()` for random v4 generation
//! - `nil()` for the zero-valued default
//! - `parse(&str)` for string parsing
//! - Full serde support (serializes as the UUID string)
//! - `Display`, `FromStr`, `Eq`, `Ord`, `Hash`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when an identifier string fails to parse as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier `{input}`: {reason}")]
pub struct IdParseError {
    /// The string that failed to parse.
    pub input: String,
    /// Why it failed.
    pub reason: String,
}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random (v4) identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// The zero-valued identifier.
            #[must_use]
            pub fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Returns `true` if this is the zero-valued identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Parse an identifier from its string form.
            pub fn parse(input: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(input).map(Self).map_err(|e| IdParseError {
                    input: input.to_owned(),
                    reason: e.to_string(),
                })
            }

            /// Access the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identifies one runtime instance of a flow.
    ExecutionId
);
define_id!(
    /// Identifies a persisted workflow graph definition.
    FlowId
);
define_id!(
    /// Identifies one node within a flow.
    NodeId
);
define_id!(
    /// Identifies the user owning a flow, execution, or install task.
    UserId
);
define_id!(
    /// Identifies an asynchronous plugin install task.
    TaskId
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_is_not_nil() {
        assert!(!ExecutionId::new().is_nil());
        assert!(!FlowId::new().is_nil());
        assert!(!NodeId::new().is_nil());
        assert!(!UserId::new().is_nil());
        assert!(!TaskId::new().is_nil());
    }

    #[test]
    fn nil_is_zero_valued() {
        let id = NodeId::nil();
        assert!(id.is_nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn parse_valid_uuid() {
        let id = ExecutionId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn parse_invalid_string_errors() {
        let err = ExecutionId::parse("not-a-uuid").unwrap_err();
        assert_eq!(err.input, "not-a-uuid");
        assert!(err.to_string().contains("invalid identifier"));
    }

    #[test]
    fn from_str_roundtrip() {
        let id = FlowId::new();
        let parsed: FlowId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_serializes_as_string() {
        let id = NodeId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440000\"");

        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_are_distinct_types() {
        // Compile-time property: the following would not compile.
        // let _: ExecutionId = FlowId::new();
        let a = ExecutionId::new();
        let b = ExecutionId::new();
        assert_ne!(a, b);
    }
}
