//! # Command Line
//!
//! Flags of the `node-perf-evaluator` binary.
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate every node with the current kube context and default settings
//! node-perf-evaluator
//!
//! # Use a config file, only worker nodes, JSON output
//! node-perf-evaluator --config evaluator.yaml --output json
//!
//! # Load test all nodes at once and expose metrics while running
//! node-perf-evaluator --config evaluator.yaml --parallel-nodes --metrics-port 9090
//! ```

use crate::config::{ConfigError, EvaluatorConfig};
use crate::reports::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Measure relative performance of Kubernetes nodes
#[derive(Debug, Parser)]
#[command(name = "node-perf-evaluator", version)]
#[command(
    about = "Measure relative CPU and network performance of Kubernetes nodes",
    long_about = None,
    after_help = "\
Every run deletes and recreates the target namespace. Do not point two runs, or anything
else, at the same namespace.

Examples:
  node-perf-evaluator --config evaluator.yaml
  node-perf-evaluator --namespace perf-check --output json --fail-fast
"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Namespace holding the probes (overrides the config file)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Kubernetes context to use (overrides the config file)
    #[arg(long)]
    pub context: Option<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Load test all nodes of a suite at the same time
    #[arg(long)]
    pub parallel_nodes: bool,

    /// Abort the run when any node cannot be provisioned
    #[arg(long)]
    pub fail_fast: bool,

    /// Serve /metrics, /healthz and /readyz on this port while running
    /// (defaults to METRICS_PORT when set)
    #[arg(long, value_name = "PORT")]
    pub metrics_port: Option<u16>,
}

impl Cli {
    /// Load the config file (or defaults) and apply the flags on top
    pub fn load_config(&self) -> Result<EvaluatorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EvaluatorConfig::read(path)?,
            None => EvaluatorConfig::from_env(),
        };

        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(context) = &self.context {
            config.kube_context = Some(context.clone());
        }
        config.execution.parallel_nodes |= self.parallel_nodes;
        config.execution.fail_fast |= self.fail_fast;

        config.validate()?;
        Ok(config)
    }

    /// Metrics port from the flag, then from `METRICS_PORT`
    pub fn metrics_port(&self) -> Option<u16> {
        self.metrics_port.or_else(crate::config::metrics_port_from_env)
    }
}
