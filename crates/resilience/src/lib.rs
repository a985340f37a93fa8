//! # Weft Resilience
//!
//! The two shared resilience primitives of the execution core:
//!
//! - [`RateLimiterStore`] — windowed per-key admission counters. The only
//!   mutable state shared between concurrently running nodes, isolated
//!   here behind a narrow API.
//! - [`Backoff`] — retry delay strategies (fixed, linear, exponential,
//!   jitter).
//!
//! Window semantics are **fixed-window**: a bucket's counter resets when
//! `now - window_start >= window`. The burst allowance at window edges is
//! an accepted trade-off for workflow admission control.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod rate_limiter;

pub use backoff::Backoff;
pub use rate_limiter::{Admission, RateLimiterStore};
