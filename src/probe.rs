//! # Probe Service
//!
//! The HTTP workload deployed on every node. Serves:
//! - `/ping` - `{"status":"success"}`
//! - `/cpu-intensive-task` - a fixed floating point workload, `{"status":"success","result":"<sum>"}`
//!
//! The listen port is read from `SERVICE_PORT` (default 8080).

use crate::constants::{PROBE_CONTAINER_PORT, PROBE_PORT_ENV, PROBE_STATUS_SUCCESS};
use axum::{http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Iterations of the CPU intensive workload
const CPU_TASK_ITERATIONS: u32 = 100_000;

/// Response body of every probe endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ProbeResponse {
    fn success(result: Option<String>) -> Self {
        Self {
            status: PROBE_STATUS_SUCCESS.to_string(),
            result,
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/cpu-intensive-task", get(cpu_intensive_handler))
        .layer(TraceLayer::new_for_http())
}

/// Port from `SERVICE_PORT`, falling back to the container port
pub fn listen_port() -> u16 {
    crate::config::env_var_or_default(PROBE_PORT_ENV, PROBE_CONTAINER_PORT as u16)
}

pub async fn serve(listener: TcpListener) -> Result<(), anyhow::Error> {
    info!("Probe service listening on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Sum of `tan(i) * atan(i)` for `i` in `0..100000`
pub fn cpu_intensive_result() -> f64 {
    (0..CPU_TASK_ITERATIONS)
        .map(|i| {
            let x = f64::from(i);
            x.tan() * x.atan()
        })
        .sum()
}

async fn ping_handler() -> Json<ProbeResponse> {
    Json(ProbeResponse::success(None))
}

async fn cpu_intensive_handler() -> Result<Json<ProbeResponse>, StatusCode> {
    let result = tokio::task::spawn_blocking(cpu_intensive_result)
        .await
        .map_err(|e| {
            error!("CPU intensive task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(ProbeResponse::success(Some(format!("{result:.2}")))))
}
