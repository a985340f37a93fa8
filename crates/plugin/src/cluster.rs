//! Cluster runtime driven through kubectl.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::error::OrchestratorError;
use crate::orchestrator::{
    Orchestrator, OrchestratorKind, ProgressFn, RunningContainer, TrustedRegistries,
};

const PLUGIN_LABEL: &str = "weft-plugin=true";
const PLUGIN_PORT: u16 = 8080;

/// Drives a cluster through kubectl: one pod plus one service per
/// plugin workload. Endpoints use in-cluster DNS
/// (`http://<service>.<namespace>.svc.cluster.local:<port>`).
pub struct ClusterOrchestrator {
    binary: String,
    namespace: String,
    trusted: TrustedRegistries,
}

impl ClusterOrchestrator {
    /// An orchestrator over `kubectl` in the `weft-plugins` namespace.
    #[must_use]
    pub fn new(trusted: TrustedRegistries) -> Self {
        Self {
            binary: "kubectl".to_owned(),
            namespace: "weft-plugins".to_owned(),
            trusted,
        }
    }

    /// Target a different namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The in-cluster endpoint for a named service.
    #[must_use]
    pub fn endpoint_for(&self, service: &str, port: u16) -> String {
        format!(
            "http://{service}.{namespace}.svc.cluster.local:{port}",
            namespace = self.namespace
        )
    }

    async fn capture(&self, args: &[&str]) -> Result<String, OrchestratorError> {
        let output = Command::new(&self.binary)
            .args(args)
            .args(["-n", &self.namespace])
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::CommandFailed {
                command: format!("{} {}", self.binary, args.first().copied().unwrap_or_default()),
                detail: stderr.lines().next().unwrap_or("unknown error").to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Orchestrator for ClusterOrchestrator {
    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .args(["version", "--request-timeout=2s"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn kind(&self) -> OrchestratorKind {
        OrchestratorKind::Cluster
    }

    fn is_from_trusted_registry(&self, image: &str) -> bool {
        self.trusted.is_trusted(image)
    }

    async fn pull_image(
        &self,
        image: &str,
        _tag: &str,
        progress: ProgressFn,
    ) -> Result<(), OrchestratorError> {
        if !self.is_from_trusted_registry(image) {
            return Err(OrchestratorError::UntrustedImage(image.to_owned()));
        }
        // The kubelet pulls on scheduling; nothing to do ahead of time.
        progress(1.0, "pull delegated to the cluster");
        Ok(())
    }

    async fn create_and_start(
        &self,
        image: &str,
        name: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunningContainer, OrchestratorError> {
        let mut args: Vec<String> = vec![
            "run".into(),
            name.into(),
            format!("--image={image}"),
            format!("--labels={PLUGIN_LABEL}"),
            format!("--port={PLUGIN_PORT}"),
            "--restart=Never".into(),
        ];
        for (key, value) in env {
            args.push(format!("--env={key}={value}"));
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.capture(&arg_refs).await?;

        self.capture(&[
            "expose",
            "pod",
            name,
            &format!("--port={PLUGIN_PORT}"),
            &format!("--name={name}"),
        ])
        .await?;
        debug!(pod = name, "pod started and exposed");

        Ok(RunningContainer {
            id: name.to_owned(),
            port: PLUGIN_PORT,
            name: name.to_owned(),
        })
    }

    async fn wait_for_healthy(&self, id: &str, timeout_sec: u64) -> Result<bool, OrchestratorError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_sec);
        loop {
            let phase = self
                .capture(&["get", "pod", id, "-o", "jsonpath={.status.phase}"])
                .await?;
            match phase.trim() {
                "Running" => return Ok(true),
                "Failed" | "Unknown" => return Ok(false),
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn stop(&self, id: &str) -> Result<(), OrchestratorError> {
        self.capture(&["delete", "pod", id, "--wait=false"])
            .await
            .map(|_| ())
    }

    async fn stop_and_remove(&self, id: &str) -> Result<(), OrchestratorError> {
        self.capture(&["delete", "pod", id, "--wait=false"]).await?;
        self.capture(&["delete", "service", id, "--ignore-not-found"])
            .await
            .map(|_| ())
    }

    async fn get_logs(&self, id: &str, tail_lines: u32) -> Result<String, OrchestratorError> {
        self.capture(&["logs", &format!("--tail={tail_lines}"), id])
            .await
    }

    async fn list_plugin_containers(&self) -> Result<Vec<RunningContainer>, OrchestratorError> {
        let listing = self
            .capture(&[
                "get",
                "pods",
                "-l",
                PLUGIN_LABEL,
                "-o",
                "jsonpath={range .items[*]}{.metadata.name}{\"\\n\"}{end}",
            ])
            .await?;
        Ok(listing
            .lines()
            .filter(|line| !line.is_empty())
            .map(|name| RunningContainer {
                id: name.to_owned(),
                port: PLUGIN_PORT,
                name: name.to_owned(),
            })
            .collect())
    }

    async fn service_endpoint(&self, id: &str) -> Result<Url, OrchestratorError> {
        Url::parse(&self.endpoint_for(id, PLUGIN_PORT))
            .map_err(|err| OrchestratorError::UnexpectedOutput(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoint_uses_cluster_dns() {
        let orchestrator = ClusterOrchestrator::new(TrustedRegistries::default());
        assert_eq!(
            orchestrator.endpoint_for("slack-plugin", 8080),
            "http://slack-plugin.weft-plugins.svc.cluster.local:8080"
        );
    }

    #[test]
    fn namespace_override() {
        let orchestrator = ClusterOrchestrator::new(TrustedRegistries::default())
            .with_namespace("automation");
        assert_eq!(
            orchestrator.endpoint_for("x", 9000),
            "http://x.automation.svc.cluster.local:9000"
        );
    }

    #[test]
    fn kind_is_cluster() {
        let orchestrator = ClusterOrchestrator::new(TrustedRegistries::default());
        assert_eq!(orchestrator.kind(), OrchestratorKind::Cluster);
    }

    #[tokio::test]
    async fn untrusted_pull_rejected() {
        let orchestrator = ClusterOrchestrator::new(TrustedRegistries::default());
        let err = orchestrator
            .pull_image("evil.example/x", "1", std::sync::Arc::new(|_, _| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::UntrustedImage(_)));
    }
}
