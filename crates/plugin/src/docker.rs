//! Local container runtime driven through the docker CLI.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::error::OrchestratorError;
use crate::orchestrator::{
    Orchestrator, OrchestratorKind, ProgressFn, RunningContainer, TrustedRegistries,
};

/// Label attached to every workload this orchestrator starts.
const PLUGIN_LABEL: &str = "weft-plugin=true";
/// The port plugins expose inside their container.
const PLUGIN_PORT: u16 = 8080;

/// Drives a local docker-compatible runtime through its CLI.
pub struct DockerOrchestrator {
    binary: String,
    trusted: TrustedRegistries,
}

impl DockerOrchestrator {
    /// An orchestrator over the `docker` binary on `PATH`.
    #[must_use]
    pub fn new(trusted: TrustedRegistries) -> Self {
        Self {
            binary: "docker".to_owned(),
            trusted,
        }
    }

    /// Override the runtime binary (`podman` is CLI-compatible).
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn capture(&self, args: &[&str]) -> Result<String, OrchestratorError> {
        let output = Command::new(&self.binary)
            .args(args)
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

    /// Parse `docker port` output (`0.0.0.0:49153`) into the host port.
    fn parse_host_port(output: &str) -> Result<u16, OrchestratorError> {
        output
            .lines()
            .next()
            .and_then(|line| line.rsplit(':').next())
            .and_then(|port| port.trim().parse().ok())
            .ok_or_else(|| OrchestratorError::UnexpectedOutput(output.to_owned()))
    }
}

#[async_trait]
impl Orchestrator for DockerOrchestrator {
    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("info")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn kind(&self) -> OrchestratorKind {
        OrchestratorKind::LocalContainer
    }

    fn is_from_trusted_registry(&self, image: &str) -> bool {
        self.trusted.is_trusted(image)
    }

    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        progress: ProgressFn,
    ) -> Result<(), OrchestratorError> {
        if !self.is_from_trusted_registry(image) {
            return Err(OrchestratorError::UntrustedImage(image.to_owned()));
        }
        let reference = format!("{image}:{tag}");
        progress(0.0, "starting pull");

        let mut child = Command::new(&self.binary)
            .args(["pull", &reference])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            let mut seen = 0u32;
            while let Ok(Some(line)) = lines.next_line().await {
                seen += 1;
                // Layer progress lines arrive continuously; map them onto
                // an asymptotic fraction below 1.0.
                let fraction = 0.9f32.min(seen as f32 / 20.0);
                progress(fraction, line.trim());
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(OrchestratorError::CommandFailed {
                command: format!("{} pull", self.binary),
                detail: format!("pull of {reference} failed"),
            });
        }
        progress(1.0, "pull complete");
        Ok(())
    }

    async fn create_and_start(
        &self,
        image: &str,
        name: &str,
        env: &HashMap<String, String>,
    ) -> Result<RunningContainer, OrchestratorError> {
        let port_mapping = format!("0:{PLUGIN_PORT}");
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--label".into(),
            PLUGIN_LABEL.into(),
            "--name".into(),
            name.into(),
            "-p".into(),
            port_mapping,
        ];
        for (key, value) in env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        args.push(image.to_owned());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.capture(&arg_refs).await?.trim().to_owned();
        debug!(container_id = %id, name, "container started");

        let port_output = self
            .capture(&["port", &id, &format!("{PLUGIN_PORT}/tcp")])
            .await?;
        let port = Self::parse_host_port(&port_output)?;

        Ok(RunningContainer {
            id,
            port,
            name: name.to_owned(),
        })
    }

    async fn wait_for_healthy(&self, id: &str, timeout_sec: u64) -> Result<bool, OrchestratorError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_sec);
        loop {
            let health = self
                .capture(&[
                    "inspect",
                    "--format",
                    "{{if .State.Health}}{{.State.Health.Status}}{{else}}{{.State.Status}}{{end}}",
                    id,
                ])
                .await?;
            match health.trim() {
                "healthy" | "running" => return Ok(true),
                "unhealthy" | "exited" | "dead" => return Ok(false),
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    async fn stop(&self, id: &str) -> Result<(), OrchestratorError> {
        self.capture(&["stop", id]).await.map(|_| ())
    }

    async fn stop_and_remove(&self, id: &str) -> Result<(), OrchestratorError> {
        self.capture(&["rm", "-f", id]).await.map(|_| ())
    }

    async fn get_logs(&self, id: &str, tail_lines: u32) -> Result<String, OrchestratorError> {
        self.capture(&["logs", "--tail", &tail_lines.to_string(), id])
            .await
    }

    async fn list_plugin_containers(&self) -> Result<Vec<RunningContainer>, OrchestratorError> {
        let listing = self
            .capture(&[
                "ps",
                "--filter",
                &format!("label={PLUGIN_LABEL}"),
                "--format",
                "{{.ID}}\t{{.Names}}",
            ])
            .await?;

        let mut containers = Vec::new();
        for line in listing.lines() {
            let mut parts = line.split('\t');
            let (Some(id), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            let port = self
                .capture(&["port", id, &format!("{PLUGIN_PORT}/tcp")])
                .await
                .ok()
                .and_then(|output| Self::parse_host_port(&output).ok())
                .unwrap_or(0);
            containers.push(RunningContainer {
                id: id.to_owned(),
                port,
                name: name.to_owned(),
            });
        }
        Ok(containers)
    }

    async fn service_endpoint(&self, id: &str) -> Result<Url, OrchestratorError> {
        let port_output = self
            .capture(&["port", id, &format!("{PLUGIN_PORT}/tcp")])
            .await?;
        let port = Self::parse_host_port(&port_output)?;
        Url::parse(&format!("http://localhost:{port}"))
            .map_err(|err| OrchestratorError::UnexpectedOutput(err.to_string()))
    }
}
