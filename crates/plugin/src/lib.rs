//! # Weft Plugin
//!
//! Dynamic extension of the handler set: node implementations
//! materialised as external processes behind container or pod endpoints.
//!
//! ## Core Types
//!
//! - [`Orchestrator`] — the abstract container/pod lifecycle contract
//! - [`DockerOrchestrator`] — local container runtime via the docker CLI
//! - [`ClusterOrchestrator`] — cluster runtime via kubectl
//! - [`select_orchestrator`] — availability probe at startup
//! - [`TrustedRegistries`] — the image-source allow-list
//! - [`InstallTask`] / [`InstallTaskManager`] — the async install job
//!   state machine with progress, authorization, and cooperative cancel

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Cluster (kubectl-backed) orchestrator.
pub mod cluster;
/// Local (docker-CLI-backed) orchestrator.
pub mod docker;
/// Orchestrator errors.
pub mod error;
/// Install task state machine and manager.
pub mod install;
/// The abstract orchestration contract and registry trust.
pub mod orchestrator;

pub use cluster::ClusterOrchestrator;
pub use docker::DockerOrchestrator;
pub use error::OrchestratorError;
pub use install::{InstallSource, InstallStatus, InstallTask, InstallTaskManager};
pub use orchestrator::{
    select_orchestrator, Orchestrator, OrchestratorKind, ProgressFn, RunningContainer,
    TrustedRegistries,
};
