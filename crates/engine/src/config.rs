//! Engine tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`FlowEngine`](crate::FlowEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many nodes of one execution may run concurrently.
    pub max_parallelism: usize,
    /// Wall-clock budget for a whole execution.
    #[serde(with = "duration_secs")]
    pub execution_deadline: Duration,
    /// Default per-node budget for handlers that do not manage their own.
    #[serde(with = "duration_secs")]
    pub node_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 4,
            execution_deadline: Duration::from_secs(3600),
            node_timeout: Duration::from_secs(300),
        }
    }
}

mod duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
