//! Windowed per-key admission counters.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Outcome of asking the store to admit one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fits inside the current window.
    Allowed {
        /// Admissions left in the window after this one.
        remaining: u64,
    },
    /// The window is full.
    Limited {
        /// Time until the window resets.
        retry_after: Duration,
    },
}

impl Admission {
    /// Returns `true` when the request was admitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u64,
}

/// Fixed-window rate-limit buckets keyed by arbitrary strings.
///
/// Keys are handler-configurable (default: the node id), so one store
/// serves every rate-limited node in the process. Entries are mutated
/// under the map's per-shard locks; there is no global lock.
#[derive(Debug, Default)]
pub struct RateLimiterStore {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to admit one request for `key` under the given window policy.
    pub fn try_acquire(&self, key: &str, window: Duration, max_requests: u64) -> Admission {
        self.try_acquire_at(key, window, max_requests, Instant::now())
    }

    /// Admission check against an explicit clock, for tests and replays.
    pub fn try_acquire_at(
        &self,
        key: &str,
        window: Duration,
        max_requests: u64,
        now: Instant,
    ) -> Admission {
        let mut bucket = self.buckets.entry(key.to_owned()).or_insert_with(|| Bucket {
            window_start: now,
            count: 0,
        });

        if now.duration_since(bucket.window_start) >= window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        if bucket.count >= max_requests {
            let elapsed = now.duration_since(bucket.window_start);
            return Admission::Limited {
                retry_after: window.saturating_sub(elapsed),
            };
        }

        bucket.count += 1;
        Admission::Allowed {
            remaining: max_requests - bucket.count,
        }
    }

    /// Drop the bucket for `key`, resetting its window.
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    /// Number of live buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` when no buckets exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
