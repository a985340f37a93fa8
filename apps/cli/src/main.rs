//! Command-line runner for Weft flows.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use weft_core::{FlowId, UserId};
use weft_engine::{EngineConfig, FlowDefinition, FlowEngine, FlowGraph, RunRequest};
use weft_execution::{FileJournal, PauseJournal};
use weft_handler::HandlerRegistry;
use weft_nodes::register_builtins;
use weft_resilience::RateLimiterStore;

#[derive(Parser)]
#[command(name = "weft", about = "Run and inspect Weft workflow flows", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for durable pause records.
    #[arg(long, env = "WEFT_JOURNAL_DIR", default_value = ".weft/journal")]
    journal_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a flow definition against a trigger payload.
    Run {
        /// Path to the flow JSON file.
        flow: PathBuf,
        /// Trigger payload as inline JSON.
        #[arg(long, default_value = "{}")]
        input: String,
        /// Parallel node cap within the run.
        #[arg(long, default_value_t = 4)]
        parallelism: usize,
    },
    /// Validate a flow definition without running it.
    Validate {
        /// Path to the flow JSON file.
        flow: PathBuf,
    },
    /// List the registered node handlers.
    Nodes,
}

fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry, Arc::new(RateLimiterStore::new()));
    registry
}

fn load_graph(path: &PathBuf) -> anyhow::Result<FlowGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading flow file {}", path.display()))?;
    let definition: FlowDefinition =
        serde_json::from_str(&raw).context("parsing flow definition")?;
    FlowGraph::new(definition).context("validating flow graph")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            flow,
            input,
            parallelism,
        } => {
            let graph = load_graph(&flow)?;
            let payload = serde_json::from_str(&input).context("parsing --input payload")?;

            let journal = FileJournal::open(&cli.journal_dir)
                .await
                .context("opening pause journal")?;
            let config = EngineConfig {
                max_parallelism: parallelism,
                ..EngineConfig::default()
            };
            let engine = FlowEngine::new(
                Arc::new(build_registry()),
                Arc::new(journal) as Arc<dyn PauseJournal>,
                config,
            );

            let request = RunRequest::new(FlowId::new(), UserId::new()).with_payload(payload);
            let outcome = engine.run(graph, request).await?;

            let rendered = serde_json::json!({
                "executionId": outcome.execution_id,
                "status": outcome.status.to_string(),
                "pausedNodes": outcome.paused_nodes,
                "error": outcome.error,
                "outputs": outcome
                    .outputs
                    .iter()
                    .map(|(id, output)| (id.to_string(), output.clone()))
                    .collect::<serde_json::Map<_, _>>(),
            });
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Command::Validate { flow } => {
            let graph = load_graph(&flow)?;
            let registry = build_registry();

            let mut problems = Vec::new();
            for node in graph.nodes() {
                match registry.get(&node.key) {
                    Some(handler) => {
                        let validation = handler.validate_config(&node.config);
                        for error in validation.errors {
                            problems.push(format!("node {} ({}): {error}", node.id, node.key));
                        }
                    }
                    None => problems.push(format!("node {}: unknown type `{}`", node.id, node.key)),
                }
            }

            if problems.is_empty() {
                println!(
                    "ok: {} nodes, {} edges",
                    graph.nodes().len(),
                    graph.edges().len()
                );
            } else {
                for problem in &problems {
                    eprintln!("{problem}");
                }
                anyhow::bail!("{} validation problem(s)", problems.len());
            }
        }
        Command::Nodes => {
            let registry = build_registry();
            let mut entries = registry.list();
            entries.sort_by(|a, b| a.key.cmp(&b.key));
            for meta in entries {
                println!("{:24} {:12} {}", meta.key, meta.category, meta.description);
            }
        }
    }
    Ok(())
}
