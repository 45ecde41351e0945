//! Probe workload deployed on every evaluated node.

use anyhow::{Context, Result};
use node_perf_evaluator::probe;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "node_perf_evaluator=info,tower_http=info".into()),
        )
        .init();

    let addr = format!("0.0.0.0:{}", probe::listen_port());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind probe service to {addr}"))?;

    probe::serve(listener)
        .await
        .context("Probe service terminated")
}
