//! # Node Performance Evaluator
//!
//! Measures the relative CPU and network performance of the nodes of a Kubernetes
//! cluster.
//!
//! ## Overview
//!
//! 1. **Discover nodes** - Lists nodes matching the configured label/field selectors
//! 2. **Provision probes** - Recreates the run namespace and deploys one probe per node,
//!    pinned to it, exposed through its own ingress host
//! 3. **Load test** - Runs the ping and CPU intensive suites against every probe
//! 4. **Report** - Prints average latency and failure rate per node and suite
//! 5. **Clean up** - Deletes the run namespace, whatever happened before
//!
//! Ctrl-C or SIGTERM stops the load early; the partial results are still reported and the
//! namespace is still deleted.

use anyhow::{Context, Result};
use clap::Parser;
use node_perf_evaluator::cli::Cli;
use node_perf_evaluator::cluster::kubernetes::WaitSettings;
use node_perf_evaluator::cluster::KubeClusterAdapter;
use node_perf_evaluator::evaluator::{LoadGenerator, TestRunner};
use node_perf_evaluator::observability::{metrics, Telemetry};
use node_perf_evaluator::reports::{resolve_writer, RunReport};
use node_perf_evaluator::server::{start_server, ServerState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // kube and reqwest both go through rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    let config = cli.load_config().context("Failed to load configuration")?;
    let telemetry = Telemetry::init(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build_datetime = env!("BUILD_DATETIME"),
        git_hash = env!("BUILD_GIT_HASH"),
        "Starting Node Performance Evaluator"
    );

    metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    if let Some(port) = cli.metrics_port() {
        let server_state_clone = Arc::clone(&server_state);
        tokio::spawn(async move {
            if let Err(e) = start_server(port, server_state_clone).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    let cluster = KubeClusterAdapter::connect(
        config.kube_config.as_deref(),
        config.kube_context.as_deref(),
        WaitSettings::from(&config.timeouts),
    )
    .await
    .context("Failed to create Kubernetes client")?;
    let load = LoadGenerator::new(config.timeouts.request_duration())
        .context("Failed to create HTTP client")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let runner = TestRunner::new(Arc::new(cluster), &config, load, cancel);
    server_state.set_ready(true);

    let output = runner.run().await.context("Evaluation run failed")?;
    server_state.set_ready(false);

    let report = RunReport::new(
        &config.namespace,
        output.suites,
        output.unprovisioned_nodes,
        output.cancelled,
    );
    resolve_writer(cli.output)
        .write(&report, &mut std::io::stdout().lock())
        .context("Failed to write report")?;

    telemetry.shutdown();
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received Ctrl-C, stopping run"),
        _ = terminate => warn!("received SIGTERM, stopping run"),
    }
}
