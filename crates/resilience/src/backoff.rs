//! Retry delay strategies.

use std::time::Duration;

use rand::Rng;

/// Default multiplier applied by the exponential strategy.
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// How long to wait before retry attempt `n`.
///
/// Attempts are 1-based: the first retry is attempt 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Every attempt waits the initial delay.
    Fixed {
        /// The constant delay.
        initial: Duration,
    },
    /// Attempt `n` waits `initial × n`.
    Linear {
        /// The base delay.
        initial: Duration,
    },
    /// Attempt `n` waits `initial × multiplierⁿ⁻¹`.
    Exponential {
        /// The base delay.
        initial: Duration,
        /// The growth factor.
        multiplier: f64,
    },
    /// Every attempt waits `initial` plus a uniform random extra in
    /// `[0, initial)`.
    Jitter {
        /// The base delay; also bounds the random extra.
        initial: Duration,
    },
}

impl Backoff {
    /// Parse a strategy name from a node config.
    ///
    /// Unknown names fall back to `fixed`, matching how handlers treat
    /// unrecognised enum values elsewhere.
    #[must_use]
    pub fn from_config(strategy: &str, initial: Duration, multiplier: f64) -> Self {
        match strategy {
            "linear" => Self::Linear { initial },
            "exponential" => Self::Exponential {
                initial,
                multiplier,
            },
            "jitter" => Self::Jitter { initial },
            _ => Self::Fixed { initial },
        }
    }

    /// The delay before retry attempt `attempt` (1-based).
    ///
    /// Attempt 0 is clamped to 1. Results saturate rather than overflow.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Self::Fixed { initial } => *initial,
            Self::Linear { initial } => initial.saturating_mul(attempt),
            Self::Exponential {
                initial,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt as i32 - 1);
                Duration::from_secs_f64((initial.as_secs_f64() * factor).min(f64::from(u32::MAX)))
            }
            Self::Jitter { initial } => {
                let extra_ms = if initial.as_millis() == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..initial.as_millis() as u64)
                };
                initial.saturating_add(Duration::from_millis(extra_ms))
            }
        }
    }
}
