//! The abstract container/pod lifecycle contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::cluster::ClusterOrchestrator;
use crate::docker::DockerOrchestrator;
use crate::error::OrchestratorError;

/// Progress callback for image pulls: fraction in `0.0..=1.0` plus a
/// short status line.
pub type ProgressFn = Arc<dyn Fn(f32, &str) + Send + Sync>;

/// Which concrete runtime an orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorKind {
    /// A local container runtime on this host.
    LocalContainer,
    /// A cluster runtime reached through its API.
    Cluster,
}

impl std::fmt::Display for OrchestratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalContainer => write!(f, "local-container"),
            Self::Cluster => write!(f, "cluster"),
        }
    }
}

/// A started plugin workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    /// Runtime-assigned container/pod id.
    pub id: String,
    /// The host-reachable port.
    pub port: u16,
    /// The name the workload was started under.
    pub name: String,
}

/// Abstract container/pod lifecycle.
///
/// Two concrete variants exist — [`DockerOrchestrator`] and
/// [`ClusterOrchestrator`] — selected once at startup by
/// [`select_orchestrator`] and immutable thereafter.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Probe whether this runtime answers.
    async fn is_available(&self) -> bool;

    /// Which runtime this is.
    fn kind(&self) -> OrchestratorKind;

    /// Whether the image's registry is on the allow-list.
    fn is_from_trusted_registry(&self, image: &str) -> bool;

    /// Pull an image, reporting progress along the way.
    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        progress: ProgressFn,
    ) -> Result<(), OrchestratorError>;

    /// Create and start a plugin workload.
    async fn create_and_start(
        &self,
        image: &str,
        name: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunningContainer, OrchestratorError>;

    /// Wait until the workload reports healthy, up to `timeout_sec`.
    async fn wait_for_healthy(&self, id: &str, timeout_sec: u64) -> Result<bool, OrchestratorError>;

    /// Stop a workload, leaving its resources in place.
    async fn stop(&self, id: &str) -> Result<(), OrchestratorError>;

    /// Stop a workload and remove its resources.
    async fn stop_and_remove(&self, id: &str) -> Result<(), OrchestratorError>;

    /// The last `tail_lines` of the workload's logs.
    async fn get_logs(&self, id: &str, tail_lines: u32) -> Result<String, OrchestratorError>;

    /// All plugin workloads this orchestrator started.
    async fn list_plugin_containers(&self) -> Result<Vec<RunningContainer>, OrchestratorError>;

    /// The base URL handlers use to invoke the plugin.
    async fn service_endpoint(&self, id: &str) -> Result<Url, OrchestratorError>;
}

/// Pick the runtime at startup: local container runtime first, cluster
/// as the fallback.
pub async fn select_orchestrator(
    trusted: TrustedRegistries,
) -> Result<Arc<dyn Orchestrator>, OrchestratorError> {
    let docker = DockerOrchestrator::new(trusted.clone());
    if docker.is_available().await {
        return Ok(Arc::new(docker));
    }
    let cluster = ClusterOrchestrator::new(trusted);
    if cluster.is_available().await {
        return Ok(Arc::new(cluster));
    }
    Err(OrchestratorError::NoRuntime)
}

/// The configured allow-list of image sources.
///
/// Images whose registry is not listed are rejected before any pull is
/// attempted. An image without an explicit registry (no dot or port in
/// its first path segment) is treated as `docker.io`.
#[derive(Debug, Clone)]
pub struct TrustedRegistries {
    registries: Vec<String>,
}

impl TrustedRegistries {
    /// An allow-list over the given registry hosts.
    #[must_use]
    pub fn new(registries: Vec<String>) -> Self {
        Self { registries }
    }

    /// The registry host an image reference names.
    #[must_use]
    pub fn registry_of(image: &str) -> &str {
        match image.split_once('/') {
            Some((first, _)) if first.contains('.') || first.contains(':') => first,
            _ => "docker.io",
        }
    }

    /// Whether the image may be pulled.
    #[must_use]
    pub fn is_trusted(&self, image: &str) -> bool {
        let registry = Self::registry_of(image);
        self.registries.iter().any(|allowed| allowed == registry)
    }

    /// The configured hosts.
    #[must_use]
    pub fn registries(&self) -> &[String] {
        &self.registries
    }
}

impl Default for TrustedRegistries {
    fn default() -> Self {
        Self::new(vec![
            "docker.io".to_owned(),
            "ghcr.io".to_owned(),
            "quay.io".to_owned(),
        ])
    }
}
