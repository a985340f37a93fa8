//! # Weft Execution
//!
//! Runtime execution state and the durable pause journal.
//!
//! This crate models execution-time concepts — it does NOT contain the
//! scheduler (that is `weft-engine`). It defines:
//!
//! - [`ExecutionStatus`] and [`NodeState`] — the two state machines
//! - [`ExecutionState`] and [`NodeRecord`] — persistent state tracking
//! - State transitions validated by the [`transition`] module
//! - [`PauseRecord`] — the stable suspension record
//! - [`PauseJournal`] — the durable store trait, with in-memory and
//!   file-backed implementations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod journal;
pub mod pause;
pub mod state;
pub mod status;
pub mod transition;

pub use error::ExecutionError;
pub use journal::{FileJournal, MemoryJournal, PauseJournal};
pub use pause::PauseRecord;
pub use state::{ExecutionState, NodeFailure, NodeRecord};
pub use status::{ExecutionStatus, NodeState};
